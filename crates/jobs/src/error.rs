//! Error types for job and attempt operations

use crate::model::{AttemptRef, JobId, JobStatus};
use crate::persistence::StoreError;

/// Result type alias for job operations
pub type Result<T> = std::result::Result<T, JobError>;

/// Errors that can occur while creating or transitioning jobs and attempts
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// Job does not exist in the store
    #[error("job not found: {0}")]
    JobNotFound(JobId),

    /// Addressed attempt does not exist on the job
    #[error("attempt {attempt} not found on job {job_id}")]
    AttemptNotFound { job_id: JobId, attempt: AttemptRef },

    /// A precondition for the requested transition does not hold
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// The connection already has a job in a non-terminal status
    #[error("connection {connection_id} already has non-terminal job {job_id}")]
    ConflictingJob {
        connection_id: uuid::Uuid,
        job_id: JobId,
    },

    /// The job is terminal with a different outcome than requested
    #[error("job {job_id} is already {current}, cannot become {requested}")]
    TerminalConflict {
        job_id: JobId,
        current: JobStatus,
        requested: JobStatus,
    },

    /// The persistence layer failed
    #[error("backing store unavailable: {0}")]
    BackingStoreUnavailable(#[from] StoreError),
}

impl JobError {
    /// Create an illegal state error
    pub fn illegal_state(msg: impl Into<String>) -> Self {
        JobError::IllegalState(msg.into())
    }

    /// Whether this error came from the persistence layer rather than from
    /// a violated precondition
    pub fn is_store_fault(&self) -> bool {
        matches!(self, JobError::BackingStoreUnavailable(_))
    }

    /// Whether the persistence fault is expected to clear on its own
    pub fn is_transient(&self) -> bool {
        match self {
            JobError::BackingStoreUnavailable(e) => e.is_transient(),
            _ => false,
        }
    }
}
