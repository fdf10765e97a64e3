//! JobStore trait definition

use async_trait::async_trait;

use crate::error::JobError;
use crate::model::{ConnectionId, Job, JobId, JobStatus};
use crate::state_machine::Transition;

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Store temporarily unreachable (pool exhausted, connection reset)
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Concurrent writer won the serializable transaction
    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(String),
}

impl StoreError {
    /// Whether retrying the same operation may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::ConcurrencyConflict(_))
    }
}

/// Mutation applied to a job snapshot inside a store transaction
pub type JobMutation = Box<dyn FnOnce(&mut Job) -> Result<Transition, JobError> + Send>;

/// Committed state of a job after [`JobStore::update_job`]
#[derive(Debug, Clone)]
pub struct JobUpdate {
    pub job: Job,
    pub transition: Transition,
}

/// Filter for listing a connection's jobs
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    /// Restrict to these statuses (all when empty)
    pub statuses: Vec<JobStatus>,
}

impl JobFilter {
    /// Jobs that have not reached a terminal status
    pub fn non_terminal() -> Self {
        Self {
            statuses: vec![JobStatus::Pending, JobStatus::Running],
        }
    }

    pub fn matches(&self, status: JobStatus) -> bool {
        self.statuses.is_empty() || self.statuses.contains(&status)
    }
}

/// Durable store for jobs and their attempts
///
/// Each method is one serializable unit: `create_job` is scoped to the
/// connection, `update_job` to the job. Implementations must be thread-safe
/// and must not hold locks across calls.
#[async_trait]
pub trait JobStore: Send + Sync + 'static {
    /// Insert a PENDING job unless the connection already has a non-terminal one
    ///
    /// Fails with [`JobError::ConflictingJob`] in that case.
    async fn create_job(&self, connection_id: ConnectionId) -> Result<Job, JobError>;

    /// Load a job with its attempts
    async fn get_job(&self, job_id: JobId) -> Result<Job, JobError>;

    /// List a connection's jobs, oldest first
    async fn list_jobs(
        &self,
        connection_id: ConnectionId,
        filter: JobFilter,
    ) -> Result<Vec<Job>, JobError>;

    /// Reserve a surrogate id for a new attempt
    async fn allocate_attempt_id(&self) -> Result<i32, JobError>;

    /// Apply a mutation to the current snapshot of a job and commit it
    ///
    /// Nothing is written when the mutation fails or reports
    /// [`Transition::Unchanged`].
    async fn update_job(&self, job_id: JobId, mutation: JobMutation)
        -> Result<JobUpdate, JobError>;
}
