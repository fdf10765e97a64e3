//! Start reporting and orphan clean-up

use std::sync::Arc;

use async_trait::async_trait;

use super::types::{EnsureCleanJobStateInput, ReportJobStartInput};
use crate::activity::{Activity, ActivityContext, ActivityError};
use crate::service::JobActivities;

/// `reportJobStart`: observability hook, safe to invoke repeatedly
pub struct ReportJobStart {
    service: Arc<JobActivities>,
}

impl ReportJobStart {
    pub fn new(service: Arc<JobActivities>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Activity for ReportJobStart {
    const TYPE: &'static str = "reportJobStart";
    type Input = ReportJobStartInput;
    type Output = ();

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        self.service
            .report_job_start(input.job_id, input.connection_id)
            .await?;
        Ok(())
    }
}

/// `ensureCleanJobState`: fail jobs left live by a previous workflow
pub struct EnsureCleanJobState {
    service: Arc<JobActivities>,
}

impl EnsureCleanJobState {
    pub fn new(service: Arc<JobActivities>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Activity for EnsureCleanJobState {
    const TYPE: &'static str = "ensureCleanJobState";
    type Input = EnsureCleanJobStateInput;
    type Output = ();

    async fn execute(
        &self,
        ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let recovered = self
            .service
            .ensure_clean_job_state(input.connection_id)
            .await?;

        if !recovered.is_empty() {
            if let Err(e) = ctx
                .heartbeat(Some(serde_json::json!({ "recoveredJobs": recovered })))
                .await
            {
                tracing::warn!(error = %e, "Failed to send heartbeat");
            }
        }
        Ok(())
    }
}
