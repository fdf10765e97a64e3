//! Job and attempt state machine
//!
//! ```text
//!   PENDING ── start_attempt ──▶ RUNNING
//!   RUNNING ── succeed_job ──▶ SUCCEEDED
//!   {PENDING,RUNNING} ── fail_job ──▶ FAILED
//!   {PENDING,RUNNING} ── cancel_job ──▶ CANCELLED
//!   {PENDING,RUNNING} ── recover_orphan ──▶ FAILED
//! ```
//!
//! Attempts move `RUNNING → {SUCCEEDED, FAILED}`. Every function here is pure
//! over a [`Job`] snapshot: it either rejects the request, reports that the
//! job already has the requested outcome, or mutates the snapshot in place.
//! The store commits the snapshot only for [`Transition::Applied`].

use chrono::Utc;

use crate::error::{JobError, Result};
use crate::model::{
    Attempt, AttemptRef, AttemptStatus, ConnectionId, FailureSummary, Job, JobStatus, SyncOutput,
    RECOVERY_MESSAGE,
};

/// Result of evaluating a transition against a job snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The snapshot was changed and must be committed
    Applied,

    /// The job already had the requested outcome
    Unchanged,
}

impl Transition {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Reject inputs whose connection does not own the job
pub fn check_connection(job: &Job, connection_id: ConnectionId) -> Result<()> {
    if job.connection_id != connection_id {
        return Err(JobError::illegal_state(format!(
            "job {} belongs to connection {}, not {}",
            job.id, job.connection_id, connection_id
        )));
    }
    Ok(())
}

/// Append a new RUNNING attempt
///
/// With `redelivery` set, a RUNNING latest attempt is taken to be the one a
/// previous delivery of the same request committed, and is left in place.
pub fn start_attempt(job: &mut Job, attempt_id: i32, redelivery: bool) -> Result<Transition> {
    if job.status.is_terminal() {
        return Err(JobError::illegal_state(format!(
            "cannot create attempt for job {} in status {}",
            job.id, job.status
        )));
    }

    if let Some(running) = job.running_attempt() {
        let is_latest = job.last_attempt().map(|a| a.number) == Some(running.number);
        if redelivery && is_latest {
            return Ok(Transition::Unchanged);
        }
        return Err(JobError::illegal_state(format!(
            "job {} already has running attempt {}",
            job.id, running.number
        )));
    }

    if job.attempts.iter().any(|a| a.id == attempt_id) {
        return Err(JobError::illegal_state(format!(
            "attempt id {} already used on job {}",
            attempt_id, job.id
        )));
    }

    let number = job.next_attempt_number();
    job.attempts.push(Attempt::new(attempt_id, number));
    if job.status == JobStatus::Pending {
        job.status = JobStatus::Running;
    }
    job.updated_at = Utc::now();
    Ok(Transition::Applied)
}

/// Finish the addressed attempt and the job successfully
pub fn succeed_job(job: &mut Job, attempt: AttemptRef, output: SyncOutput) -> Result<Transition> {
    match job.status {
        JobStatus::Succeeded => {
            let same_attempt = job
                .last_attempt()
                .is_some_and(|a| a.matches(attempt) && a.status == AttemptStatus::Succeeded);
            return if same_attempt {
                Ok(Transition::Unchanged)
            } else {
                Err(JobError::illegal_state(format!(
                    "job {} already succeeded with a different attempt than {}",
                    job.id, attempt
                )))
            };
        }
        JobStatus::Failed | JobStatus::Cancelled => {
            return Err(terminal_conflict(job, JobStatus::Succeeded));
        }
        JobStatus::Pending => {
            return Err(JobError::illegal_state(format!(
                "job {} has no running attempt",
                job.id
            )));
        }
        JobStatus::Running => {}
    }

    let job_id = job.id;
    let target = job
        .attempt_mut(attempt)
        .ok_or(JobError::AttemptNotFound { job_id, attempt })?;
    if target.status != AttemptStatus::Running {
        return Err(JobError::illegal_state(format!(
            "attempt {} of job {} is {}",
            target.number, job_id, target.status
        )));
    }

    let now = Utc::now();
    target.status = AttemptStatus::Succeeded;
    target.sync_output = Some(output);
    target.updated_at = now;
    target.ended_at = Some(now);

    finish(job, JobStatus::Succeeded);
    Ok(Transition::Applied)
}

/// Fail the job, leaving its attempts untouched
///
/// Failing the attempt itself is a separate step ([`fail_attempt`]); the
/// workflow records the attempt failure first and then finalizes the job.
pub fn fail_job(job: &mut Job, attempt_number: i32, reason: &str) -> Result<Transition> {
    match job.status {
        JobStatus::Failed => return Ok(Transition::Unchanged),
        JobStatus::Succeeded | JobStatus::Cancelled => {
            return Err(terminal_conflict(job, JobStatus::Failed));
        }
        JobStatus::Pending | JobStatus::Running => {}
    }

    if job.attempt(AttemptRef::Number(attempt_number)).is_none() {
        tracing::warn!(
            job_id = job.id,
            attempt_number,
            "Failing job with an attempt number it never created"
        );
    }

    job.failure_reason = Some(reason.to_string());
    finish(job, JobStatus::Failed);
    Ok(Transition::Applied)
}

/// Fail a single attempt; the job stays as it is
pub fn fail_attempt(
    job: &mut Job,
    attempt: AttemptRef,
    output: Option<SyncOutput>,
    summary: Option<FailureSummary>,
) -> Result<Transition> {
    let job_id = job.id;
    let target = job
        .attempt_mut(attempt)
        .ok_or(JobError::AttemptNotFound { job_id, attempt })?;

    match target.status {
        AttemptStatus::Failed => return Ok(Transition::Unchanged),
        AttemptStatus::Succeeded => {
            return Err(JobError::illegal_state(format!(
                "attempt {} of job {} already succeeded",
                target.number, job_id
            )));
        }
        AttemptStatus::Running => {}
    }

    let now = Utc::now();
    target.status = AttemptStatus::Failed;
    target.sync_output = output;
    target.failure_summary = summary;
    target.updated_at = now;
    target.ended_at = Some(now);

    job.updated_at = now;
    Ok(Transition::Applied)
}

/// Cancel the job, failing the addressed attempt if it is still running
///
/// A job without attempts is cancelled regardless of the addressed attempt.
pub fn cancel_job(
    job: &mut Job,
    attempt: AttemptRef,
    summary: Option<FailureSummary>,
) -> Result<Transition> {
    match job.status {
        JobStatus::Cancelled => return Ok(Transition::Unchanged),
        JobStatus::Succeeded | JobStatus::Failed => {
            return Err(terminal_conflict(job, JobStatus::Cancelled));
        }
        JobStatus::Pending | JobStatus::Running => {}
    }

    if !job.attempts.is_empty() {
        let job_id = job.id;
        let target = job
            .attempt_mut(attempt)
            .ok_or(JobError::AttemptNotFound { job_id, attempt })?;
        if target.status == AttemptStatus::Running {
            let now = Utc::now();
            target.status = AttemptStatus::Failed;
            target.failure_summary = summary;
            target.updated_at = now;
            target.ended_at = Some(now);
        }
    }

    finish(job, JobStatus::Cancelled);
    Ok(Transition::Applied)
}

/// Fail a non-terminal job that no workflow is driving anymore
pub fn recover_orphan(job: &mut Job) -> Transition {
    if job.status.is_terminal() {
        return Transition::Unchanged;
    }

    let now = Utc::now();
    for attempt in job
        .attempts
        .iter_mut()
        .filter(|a| a.status == AttemptStatus::Running)
    {
        attempt.status = AttemptStatus::Failed;
        attempt.failure_summary = Some(FailureSummary::platform_recovery());
        attempt.updated_at = now;
        attempt.ended_at = Some(now);
    }

    job.failure_reason = Some(RECOVERY_MESSAGE.to_string());
    finish(job, JobStatus::Failed);
    Transition::Applied
}

/// Record the first reported start of the job
pub fn mark_started(job: &mut Job) -> Transition {
    if job.started_at.is_some() {
        return Transition::Unchanged;
    }
    job.started_at = Some(Utc::now());
    Transition::Applied
}

fn finish(job: &mut Job, status: JobStatus) {
    let now = Utc::now();
    job.status = status;
    job.updated_at = now;
    job.ended_at = Some(now);
}

fn terminal_conflict(job: &Job, requested: JobStatus) -> JobError {
    JobError::TerminalConflict {
        job_id: job.id,
        current: job.status,
        requested,
    }
}
