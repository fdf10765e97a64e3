//! Terminal and attempt status updates
//!
//! Each family comes in two forms that differ only in how the attempt is
//! addressed: by surrogate id or by attempt number. Both forms route to the
//! same [`JobActivities`] operation.

use std::sync::Arc;

use async_trait::async_trait;
use syncflow_jobs::AttemptRef;

use super::types::{
    AttemptFailureInput, AttemptNumberFailureInput, JobCancelledInput,
    JobCancelledInputWithAttemptNumber, JobFailureInput, JobSuccessInput,
    JobSuccessInputWithAttemptNumber,
};
use crate::activity::{Activity, ActivityContext, ActivityError};
use crate::service::JobActivities;

/// `jobSuccess`
pub struct JobSuccess {
    service: Arc<JobActivities>,
}

impl JobSuccess {
    pub fn new(service: Arc<JobActivities>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Activity for JobSuccess {
    const TYPE: &'static str = "jobSuccess";
    type Input = JobSuccessInput;
    type Output = ();

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        self.service
            .job_success(
                input.job_id,
                input.connection_id,
                AttemptRef::Id(input.attempt_id),
                input.standard_sync_output,
            )
            .await?;
        Ok(())
    }
}

/// `jobSuccessWithAttemptNumber`
pub struct JobSuccessWithAttemptNumber {
    service: Arc<JobActivities>,
}

impl JobSuccessWithAttemptNumber {
    pub fn new(service: Arc<JobActivities>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Activity for JobSuccessWithAttemptNumber {
    const TYPE: &'static str = "jobSuccessWithAttemptNumber";
    type Input = JobSuccessInputWithAttemptNumber;
    type Output = ();

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        self.service
            .job_success(
                input.job_id,
                input.connection_id,
                AttemptRef::Number(input.attempt_number),
                input.standard_sync_output,
            )
            .await?;
        Ok(())
    }
}

/// `jobFailure`: finalize the job as FAILED
///
/// Attempts are not touched; the workflow calls `attemptFailure` first.
pub struct JobFailure {
    service: Arc<JobActivities>,
}

impl JobFailure {
    pub fn new(service: Arc<JobActivities>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Activity for JobFailure {
    const TYPE: &'static str = "jobFailure";
    type Input = JobFailureInput;
    type Output = ();

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        self.service
            .job_failure(
                input.job_id,
                input.connection_id,
                input.attempt_number,
                input.reason,
            )
            .await?;
        Ok(())
    }
}

/// `attemptFailure`
pub struct AttemptFailure {
    service: Arc<JobActivities>,
}

impl AttemptFailure {
    pub fn new(service: Arc<JobActivities>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Activity for AttemptFailure {
    const TYPE: &'static str = "attemptFailure";
    type Input = AttemptFailureInput;
    type Output = ();

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        self.service
            .attempt_failure(
                input.job_id,
                input.connection_id,
                AttemptRef::Id(input.attempt_id),
                input.standard_sync_output,
                input.attempt_failure_summary,
            )
            .await?;
        Ok(())
    }
}

/// `attemptFailureWithAttemptNumber`
pub struct AttemptFailureWithAttemptNumber {
    service: Arc<JobActivities>,
}

impl AttemptFailureWithAttemptNumber {
    pub fn new(service: Arc<JobActivities>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Activity for AttemptFailureWithAttemptNumber {
    const TYPE: &'static str = "attemptFailureWithAttemptNumber";
    type Input = AttemptNumberFailureInput;
    type Output = ();

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        self.service
            .attempt_failure(
                input.job_id,
                input.connection_id,
                AttemptRef::Number(input.attempt_number),
                input.standard_sync_output,
                input.attempt_failure_summary,
            )
            .await?;
        Ok(())
    }
}

/// `jobCancelled`
pub struct JobCancelled {
    service: Arc<JobActivities>,
}

impl JobCancelled {
    pub fn new(service: Arc<JobActivities>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Activity for JobCancelled {
    const TYPE: &'static str = "jobCancelled";
    type Input = JobCancelledInput;
    type Output = ();

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        self.service
            .job_cancelled(
                input.job_id,
                input.connection_id,
                AttemptRef::Id(input.attempt_id),
                input.attempt_failure_summary,
            )
            .await?;
        Ok(())
    }
}

/// `jobCancelledWithAttemptNumber`
pub struct JobCancelledWithAttemptNumber {
    service: Arc<JobActivities>,
}

impl JobCancelledWithAttemptNumber {
    pub fn new(service: Arc<JobActivities>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Activity for JobCancelledWithAttemptNumber {
    const TYPE: &'static str = "jobCancelledWithAttemptNumber";
    type Input = JobCancelledInputWithAttemptNumber;
    type Output = ();

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        self.service
            .job_cancelled(
                input.job_id,
                input.connection_id,
                AttemptRef::Number(input.attempt_number),
                input.attempt_failure_summary,
            )
            .await?;
        Ok(())
    }
}
