//! In-memory implementation of JobStore

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI32, AtomicI64, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use super::store::*;
use crate::error::JobError;
use crate::model::{ConnectionId, Job, JobId};

/// In-memory implementation of JobStore
///
/// Holds every job behind one lock, so each call is trivially serializable.
/// Used by tests and as the worker's default backend.
///
/// Faults can be injected to exercise the retry envelope:
/// [`fail_next_writes`](Self::fail_next_writes) rejects writes before they
/// commit, [`fail_next_acks`](Self::fail_next_acks) commits them and then
/// reports a failure, as a dropped response would.
///
/// # Example
///
/// ```
/// use syncflow_jobs::InMemoryJobStore;
///
/// let store = InMemoryJobStore::new();
/// assert_eq!(store.job_count(), 0);
/// ```
pub struct InMemoryJobStore {
    jobs: RwLock<BTreeMap<JobId, Job>>,
    next_job_id: AtomicI64,
    next_attempt_id: AtomicI32,
    failing_writes: AtomicUsize,
    failing_acks: AtomicUsize,
}

impl InMemoryJobStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(BTreeMap::new()),
            next_job_id: AtomicI64::new(1),
            next_attempt_id: AtomicI32::new(1),
            failing_writes: AtomicUsize::new(0),
            failing_acks: AtomicUsize::new(0),
        }
    }

    /// Get the number of jobs
    pub fn job_count(&self) -> usize {
        self.jobs.read().len()
    }

    /// Insert a job as-is, bypassing the state machine
    ///
    /// Stands in for state left behind by a crashed orchestrator.
    pub fn insert_job(&self, job: Job) {
        self.next_job_id.fetch_max(job.id + 1, Ordering::SeqCst);
        if let Some(max_id) = job.attempts.iter().map(|a| a.id).max() {
            self.next_attempt_id.fetch_max(max_id + 1, Ordering::SeqCst);
        }
        self.jobs.write().insert(job.id, job);
    }

    /// Reject the next `count` writes before they commit
    pub fn fail_next_writes(&self, count: usize) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    /// Commit the next `count` writes but report them as failed
    pub fn fail_next_acks(&self, count: usize) {
        self.failing_acks.store(count, Ordering::SeqCst);
    }

    fn take_fault(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn before_write(&self) -> Result<(), JobError> {
        if Self::take_fault(&self.failing_writes) {
            return Err(StoreError::Unavailable("injected write failure".into()).into());
        }
        Ok(())
    }

    fn after_write(&self) -> Result<(), JobError> {
        if Self::take_fault(&self.failing_acks) {
            return Err(StoreError::Unavailable("injected acknowledgement failure".into()).into());
        }
        Ok(())
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create_job(&self, connection_id: ConnectionId) -> Result<Job, JobError> {
        let job = {
            let mut jobs = self.jobs.write();

            if let Some(live) = jobs
                .values()
                .find(|j| j.connection_id == connection_id && !j.status.is_terminal())
            {
                return Err(JobError::ConflictingJob {
                    connection_id,
                    job_id: live.id,
                });
            }

            self.before_write()?;
            let job_id = self.next_job_id.fetch_add(1, Ordering::SeqCst);
            let job = Job::new(job_id, connection_id);
            jobs.insert(job_id, job.clone());
            job
        };

        debug!(job_id = job.id, %connection_id, "created job");
        self.after_write()?;
        Ok(job)
    }

    async fn get_job(&self, job_id: JobId) -> Result<Job, JobError> {
        self.jobs
            .read()
            .get(&job_id)
            .cloned()
            .ok_or(JobError::JobNotFound(job_id))
    }

    async fn list_jobs(
        &self,
        connection_id: ConnectionId,
        filter: JobFilter,
    ) -> Result<Vec<Job>, JobError> {
        Ok(self
            .jobs
            .read()
            .values()
            .filter(|j| j.connection_id == connection_id && filter.matches(j.status))
            .cloned()
            .collect())
    }

    async fn allocate_attempt_id(&self) -> Result<i32, JobError> {
        Ok(self.next_attempt_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn update_job(
        &self,
        job_id: JobId,
        mutation: JobMutation,
    ) -> Result<JobUpdate, JobError> {
        let update = {
            let mut jobs = self.jobs.write();
            let current = jobs.get(&job_id).ok_or(JobError::JobNotFound(job_id))?;

            let mut job = current.clone();
            let transition = mutation(&mut job)?;
            if transition.is_applied() {
                self.before_write()?;
                jobs.insert(job_id, job.clone());
            }
            JobUpdate { job, transition }
        };

        if update.transition.is_applied() {
            debug!(job_id, status = %update.job.status, "updated job");
            self.after_write()?;
        }
        Ok(update)
    }
}
