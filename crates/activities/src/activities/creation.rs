//! Job and attempt creation

use std::sync::Arc;

use async_trait::async_trait;

use super::types::{
    AttemptCreationInput, AttemptCreationOutput, AttemptNumberCreationOutput, JobCreationInput,
    JobCreationOutput,
};
use crate::activity::{Activity, ActivityContext, ActivityError, StoreFaults};
use crate::service::JobActivities;

/// `createNewJob`: insert a PENDING job for a connection
pub struct CreateNewJob {
    service: Arc<JobActivities>,
}

impl CreateNewJob {
    pub fn new(service: Arc<JobActivities>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Activity for CreateNewJob {
    const TYPE: &'static str = "createNewJob";
    type Input = JobCreationInput;
    type Output = JobCreationOutput;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let job_id = self.service.create_new_job(input.connection_id).await?;
        Ok(JobCreationOutput { job_id })
    }
}

/// `createNewAttempt`: start an attempt, answering with its surrogate id
///
/// Transient store faults are reported retryable. A re-delivery after a
/// committed creation returns the committed attempt.
pub struct CreateNewAttempt {
    service: Arc<JobActivities>,
}

impl CreateNewAttempt {
    pub fn new(service: Arc<JobActivities>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Activity for CreateNewAttempt {
    const TYPE: &'static str = "createNewAttempt";
    type Input = AttemptCreationInput;
    type Output = AttemptCreationOutput;

    async fn execute(
        &self,
        ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let attempt = self
            .service
            .create_new_attempt(input.job_id, ctx.is_redelivery())
            .await
            .map_err(|e| ActivityError::from_job_error(e, StoreFaults::Retryable))?;

        Ok(AttemptCreationOutput {
            attempt_id: attempt.id,
        })
    }
}

/// `createNewAttemptNumber`: start an attempt, answering with its number
pub struct CreateNewAttemptNumber {
    service: Arc<JobActivities>,
}

impl CreateNewAttemptNumber {
    pub fn new(service: Arc<JobActivities>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Activity for CreateNewAttemptNumber {
    const TYPE: &'static str = "createNewAttemptNumber";
    type Input = AttemptCreationInput;
    type Output = AttemptNumberCreationOutput;

    async fn execute(
        &self,
        ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let attempt = self
            .service
            .create_new_attempt(input.job_id, ctx.is_redelivery())
            .await
            .map_err(|e| ActivityError::from_job_error(e, StoreFaults::Retryable))?;

        Ok(AttemptNumberCreationOutput {
            attempt_number: attempt.number,
        })
    }
}
