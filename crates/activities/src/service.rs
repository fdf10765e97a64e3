// Job activity service
//
// Implements the operations behind the named activities. Each operation
// is one JobStore call: the precondition check and the mutation run inside
// the store's serializable unit, never against a stale read.
// Decision: lifecycle events are emitted only for applied transitions, so a
// re-delivered terminal call does not duplicate a completion event.

use std::sync::Arc;

use chrono::Utc;
use syncflow_jobs::state_machine;
use syncflow_jobs::{
    Attempt, AttemptRef, ConnectionId, FailureSummary, Job, JobError, JobFilter, JobId, JobStore,
    Result, SyncOutput, Transition,
};

use crate::events::{JobEvent, JobEventSink};

/// Operations over the job store shared by all job activities
///
/// Holds no mutable state: everything lives in the store, so one instance
/// can serve any number of concurrent activity executions.
pub struct JobActivities {
    store: Arc<dyn JobStore>,
    events: Arc<dyn JobEventSink>,
}

impl JobActivities {
    pub fn new(store: Arc<dyn JobStore>, events: Arc<dyn JobEventSink>) -> Self {
        Self { store, events }
    }

    /// The backing job store
    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Insert a PENDING job for the connection
    ///
    /// Fails with [`JobError::ConflictingJob`] while the connection has a
    /// non-terminal job.
    pub async fn create_new_job(&self, connection_id: ConnectionId) -> Result<JobId> {
        let job = self.store.create_job(connection_id).await?;

        tracing::info!(job_id = job.id, %connection_id, "Created job");
        Ok(job.id)
    }

    /// Append a RUNNING attempt to the job
    ///
    /// `redelivery` marks a repeated delivery of the same request. If an
    /// earlier delivery already committed the attempt, that attempt is
    /// returned instead of a duplicate.
    pub async fn create_new_attempt(&self, job_id: JobId, redelivery: bool) -> Result<Attempt> {
        let attempt_id = self.store.allocate_attempt_id().await?;

        let update = self
            .store
            .update_job(
                job_id,
                Box::new(move |job: &mut Job| {
                    state_machine::start_attempt(job, attempt_id, redelivery)
                }),
            )
            .await?;

        let attempt = update.job.last_attempt().cloned().ok_or_else(|| {
            JobError::illegal_state(format!("job {job_id} has no attempt after creation"))
        })?;

        match update.transition {
            Transition::Applied => tracing::info!(
                job_id,
                attempt_id = attempt.id,
                attempt_number = attempt.number,
                "Created attempt"
            ),
            Transition::Unchanged => tracing::info!(
                job_id,
                attempt_id = attempt.id,
                attempt_number = attempt.number,
                "Attempt already created by an earlier delivery"
            ),
        }

        Ok(attempt)
    }

    /// Finish the addressed attempt and the job successfully
    pub async fn job_success(
        &self,
        job_id: JobId,
        connection_id: ConnectionId,
        attempt: AttemptRef,
        output: SyncOutput,
    ) -> Result<()> {
        let update = self
            .store
            .update_job(
                job_id,
                Box::new(move |job: &mut Job| {
                    state_machine::check_connection(job, connection_id)?;
                    state_machine::succeed_job(job, attempt, output)
                }),
            )
            .await?;

        if update.transition.is_applied() {
            let attempt_number = update
                .job
                .attempt(attempt)
                .map(|a| a.number)
                .unwrap_or_default();
            tracing::info!(job_id, %connection_id, attempt_number, "Job succeeded");

            self.emit(JobEvent::Succeeded {
                job_id,
                connection_id,
                attempt_number,
                timestamp: Utc::now(),
            })
            .await;
        }

        Ok(())
    }

    /// Finalize the job as FAILED
    ///
    /// The attempt named by `attempt_number` is not transitioned; the
    /// workflow fails it first through [`attempt_failure`](Self::attempt_failure).
    pub async fn job_failure(
        &self,
        job_id: JobId,
        connection_id: ConnectionId,
        attempt_number: i32,
        reason: String,
    ) -> Result<()> {
        let recorded = reason.clone();
        let update = self
            .store
            .update_job(
                job_id,
                Box::new(move |job: &mut Job| {
                    state_machine::check_connection(job, connection_id)?;
                    state_machine::fail_job(job, attempt_number, &recorded)
                }),
            )
            .await?;

        if update.transition.is_applied() {
            tracing::info!(job_id, %connection_id, attempt_number, reason = %reason, "Job failed");

            self.emit(JobEvent::Failed {
                job_id,
                connection_id,
                attempt_number,
                reason,
                timestamp: Utc::now(),
            })
            .await;
        }

        Ok(())
    }

    /// Fail the addressed attempt, leaving the job as it is
    pub async fn attempt_failure(
        &self,
        job_id: JobId,
        connection_id: ConnectionId,
        attempt: AttemptRef,
        output: Option<SyncOutput>,
        summary: Option<FailureSummary>,
    ) -> Result<()> {
        let update = self
            .store
            .update_job(
                job_id,
                Box::new(move |job: &mut Job| {
                    state_machine::check_connection(job, connection_id)?;
                    state_machine::fail_attempt(job, attempt, output, summary)
                }),
            )
            .await?;

        if update.transition.is_applied() {
            tracing::info!(job_id, %connection_id, attempt = %attempt, "Attempt failed");
        }

        Ok(())
    }

    /// Cancel the job, failing the addressed attempt if it is still running
    pub async fn job_cancelled(
        &self,
        job_id: JobId,
        connection_id: ConnectionId,
        attempt: AttemptRef,
        summary: Option<FailureSummary>,
    ) -> Result<()> {
        let update = self
            .store
            .update_job(
                job_id,
                Box::new(move |job: &mut Job| {
                    state_machine::check_connection(job, connection_id)?;
                    state_machine::cancel_job(job, attempt, summary)
                }),
            )
            .await?;

        if update.transition.is_applied() {
            tracing::info!(job_id, %connection_id, attempt = %attempt, "Job cancelled");

            self.emit(JobEvent::Cancelled {
                job_id,
                connection_id,
                timestamp: Utc::now(),
            })
            .await;
        }

        Ok(())
    }

    /// Record that a workflow started driving the job
    ///
    /// Sets the start timestamp on the first report and emits a start event
    /// on every report. Never changes the job's status.
    pub async fn report_job_start(&self, job_id: JobId, connection_id: ConnectionId) -> Result<()> {
        self.store
            .update_job(
                job_id,
                Box::new(move |job: &mut Job| {
                    state_machine::check_connection(job, connection_id)?;
                    Ok(state_machine::mark_started(job))
                }),
            )
            .await?;

        tracing::info!(job_id, %connection_id, "Job start reported");

        self.emit(JobEvent::Started {
            job_id,
            connection_id,
            timestamp: Utc::now(),
        })
        .await;

        Ok(())
    }

    /// Fail every non-terminal job of the connection
    ///
    /// Called when a fresh workflow starts for the connection, so any live
    /// job left behind has no workflow driving it. Returns the ids of the
    /// jobs this call recovered.
    pub async fn ensure_clean_job_state(&self, connection_id: ConnectionId) -> Result<Vec<JobId>> {
        let live = self
            .store
            .list_jobs(connection_id, JobFilter::non_terminal())
            .await?;

        let mut recovered = Vec::new();
        for job in live {
            let update = self
                .store
                .update_job(
                    job.id,
                    Box::new(|job: &mut Job| Ok(state_machine::recover_orphan(job))),
                )
                .await?;

            if !update.transition.is_applied() {
                continue;
            }

            tracing::warn!(
                job_id = job.id,
                %connection_id,
                previous_status = %job.status,
                "Failed orphaned job"
            );

            self.emit(JobEvent::Recovered {
                job_id: job.id,
                connection_id,
                timestamp: Utc::now(),
            })
            .await;
            recovered.push(job.id);
        }

        Ok(recovered)
    }

    async fn emit(&self, event: JobEvent) {
        let name = event.name();
        if let Err(e) = self.events.record(event).await {
            tracing::warn!(
                sink = self.events.name(),
                event = name,
                error = %e,
                "Failed to record job event"
            );
        }
    }
}

impl std::fmt::Debug for JobActivities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobActivities")
            .field("events", &self.events.name())
            .finish_non_exhaustive()
    }
}
