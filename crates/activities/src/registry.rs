//! Activity registry for type-erased activity execution
//!
//! Maps activity names to executors that take and return JSON, so a driver
//! can invoke activities without knowing their concrete types.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::activities::{
    AttemptFailure, AttemptFailureWithAttemptNumber, CreateNewAttempt, CreateNewAttemptNumber,
    CreateNewJob, EnsureCleanJobState, JobCancelled, JobCancelledWithAttemptNumber, JobFailure,
    JobSuccess, JobSuccessWithAttemptNumber, ReportJobStart,
};
use crate::activity::{error_types, Activity, ActivityContext, ActivityError};
use crate::reliability::RetryPolicy;
use crate::service::JobActivities;

/// Type-erased activity interface
#[async_trait]
pub trait AnyActivity: Send + Sync {
    /// Get the activity name
    fn activity_type(&self) -> &'static str;

    /// Execute with JSON input and output
    async fn execute(&self, ctx: &ActivityContext, input: Value) -> Result<Value, RegistryError>;
}

/// Wrapper to implement AnyActivity for any Activity
struct ActivityWrapper<A: Activity> {
    inner: A,
}

#[async_trait]
impl<A: Activity> AnyActivity for ActivityWrapper<A> {
    fn activity_type(&self) -> &'static str {
        A::TYPE
    }

    async fn execute(&self, ctx: &ActivityContext, input: Value) -> Result<Value, RegistryError> {
        let typed_input: A::Input =
            serde_json::from_value(input).map_err(RegistryError::Deserialization)?;
        let output = self
            .inner
            .execute(ctx, typed_input)
            .await
            .map_err(RegistryError::Activity)?;
        serde_json::to_value(output).map_err(RegistryError::Serialization)
    }
}

/// Registry of activities keyed by name
pub struct ActivityRegistry {
    activities: HashMap<String, Arc<dyn AnyActivity>>,
}

impl Default for ActivityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            activities: HashMap::new(),
        }
    }

    /// Registry with all twelve job activities bound to one service
    pub fn with_job_activities(service: Arc<JobActivities>) -> Self {
        let mut registry = Self::new();
        registry.register(CreateNewJob::new(service.clone()));
        registry.register(CreateNewAttempt::new(service.clone()));
        registry.register(CreateNewAttemptNumber::new(service.clone()));
        registry.register(JobSuccess::new(service.clone()));
        registry.register(JobSuccessWithAttemptNumber::new(service.clone()));
        registry.register(JobFailure::new(service.clone()));
        registry.register(AttemptFailure::new(service.clone()));
        registry.register(AttemptFailureWithAttemptNumber::new(service.clone()));
        registry.register(JobCancelled::new(service.clone()));
        registry.register(JobCancelledWithAttemptNumber::new(service.clone()));
        registry.register(ReportJobStart::new(service.clone()));
        registry.register(EnsureCleanJobState::new(service));
        registry
    }

    /// Register an activity under its `TYPE`
    ///
    /// # Example
    ///
    /// ```ignore
    /// let mut registry = ActivityRegistry::new();
    /// registry.register(ReportJobStart::new(service));
    /// ```
    pub fn register<A: Activity>(&mut self, activity: A) {
        self.activities.insert(
            A::TYPE.to_string(),
            Arc::new(ActivityWrapper { inner: activity }),
        );
    }

    /// Check if an activity is registered
    pub fn contains(&self, activity_type: &str) -> bool {
        self.activities.contains_key(activity_type)
    }

    /// Get the number of registered activities
    pub fn len(&self) -> usize {
        self.activities.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }

    /// Execute one delivery of an activity
    pub async fn execute(
        &self,
        ctx: &ActivityContext,
        activity_type: &str,
        input: Value,
    ) -> Result<Value, RegistryError> {
        let activity = self
            .activities
            .get(activity_type)
            .ok_or_else(|| RegistryError::UnknownActivityType(activity_type.to_string()))?;

        activity.execute(ctx, input).await
    }

    /// Execute an activity, re-delivering retryable failures
    ///
    /// Each delivery gets a context with an increasing `attempt`, as the
    /// workflow engine would provide. Stops at the first success, at the
    /// first failure the policy does not retry, or when the policy runs out
    /// of attempts.
    pub async fn execute_with_retry(
        &self,
        activity_type: &str,
        input: Value,
        policy: &RetryPolicy,
    ) -> Result<Value, ActivityError> {
        let workflow_id = Uuid::now_v7();
        let mut attempt = 1;

        loop {
            let ctx = ActivityContext::new(workflow_id, activity_type, attempt, policy.max_attempts);

            let error = match self.execute(&ctx, activity_type, input.clone()).await {
                Ok(output) => return Ok(output),
                Err(RegistryError::Activity(error)) => error,
                Err(other) => return Err(other.into()),
            };

            if !policy.should_retry(&error) || !policy.has_attempts_remaining(attempt) {
                return Err(error);
            }

            attempt += 1;
            let delay = policy.delay_for_attempt(attempt);
            tracing::warn!(
                activity = activity_type,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Re-delivering activity after retryable failure"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

impl fmt::Debug for ActivityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityRegistry")
            .field("activity_types", &self.activities.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Errors from registry operations
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Activity not registered
    #[error("unknown activity type: {0}")]
    UnknownActivityType(String),

    /// Failed to deserialize activity input
    #[error("failed to deserialize activity input: {0}")]
    Deserialization(#[source] serde_json::Error),

    /// Failed to serialize activity output
    #[error("failed to serialize activity output: {0}")]
    Serialization(#[source] serde_json::Error),

    /// The activity itself failed
    #[error("{0}")]
    Activity(ActivityError),
}

impl From<RegistryError> for ActivityError {
    fn from(err: RegistryError) -> Self {
        let error_type = match err {
            RegistryError::Activity(error) => return error,
            RegistryError::UnknownActivityType(_) => error_types::UNKNOWN_ACTIVITY,
            RegistryError::Deserialization(_) | RegistryError::Serialization(_) => {
                error_types::INVALID_INPUT
            }
        };
        ActivityError::non_retryable(err.to_string()).with_type(error_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemoryEventSink;
    use serde_json::json;
    use std::time::Duration;
    use syncflow_jobs::{InMemoryJobStore, JobStore};

    fn registry() -> (Arc<InMemoryJobStore>, ActivityRegistry) {
        let store = Arc::new(InMemoryJobStore::new());
        let service = Arc::new(JobActivities::new(
            store.clone(),
            Arc::new(MemoryEventSink::new()),
        ));
        (store, ActivityRegistry::with_job_activities(service))
    }

    #[test]
    fn test_all_job_activities_registered() {
        let (_, registry) = registry();
        assert_eq!(registry.len(), 12);

        for name in [
            "createNewJob",
            "createNewAttempt",
            "createNewAttemptNumber",
            "jobSuccess",
            "jobSuccessWithAttemptNumber",
            "jobFailure",
            "attemptFailure",
            "attemptFailureWithAttemptNumber",
            "jobCancelled",
            "jobCancelledWithAttemptNumber",
            "reportJobStart",
            "ensureCleanJobState",
        ] {
            assert!(registry.contains(name), "missing {name}");
        }
    }

    #[tokio::test]
    async fn test_execute_with_json() {
        let (_, registry) = registry();
        let ctx = ActivityContext::first_delivery("createNewJob");

        let output = registry
            .execute(
                &ctx,
                "createNewJob",
                json!({ "connectionId": uuid::Uuid::now_v7() }),
            )
            .await
            .unwrap();
        assert!(output["jobId"].as_i64().is_some());
    }

    #[tokio::test]
    async fn test_void_output_is_null() {
        let (store, registry) = registry();
        let connection_id = uuid::Uuid::now_v7();
        let job = store.create_job(connection_id).await.unwrap();
        let ctx = ActivityContext::first_delivery("reportJobStart");

        let output = registry
            .execute(
                &ctx,
                "reportJobStart",
                json!({ "jobId": job.id, "connectionId": connection_id }),
            )
            .await
            .unwrap();
        assert_eq!(output, Value::Null);
    }

    #[tokio::test]
    async fn test_unfamiliar_failure_summary_is_stored() {
        let (store, registry) = registry();
        let connection_id = uuid::Uuid::now_v7();
        let job = store.create_job(connection_id).await.unwrap();
        let ctx = ActivityContext::first_delivery("createNewAttemptNumber");
        registry
            .execute(&ctx, "createNewAttemptNumber", json!({ "jobId": job.id }))
            .await
            .unwrap();

        let summary = json!({
            "failures": [{
                "failureOrigin": "dbt",
                "failureType": "transient_error",
                "stacktrace": "dbt run exited 2",
                "timestamp": 1650000000000i64
            }],
            "partialSuccess": true
        });
        let ctx = ActivityContext::first_delivery("attemptFailureWithAttemptNumber");
        registry
            .execute(
                &ctx,
                "attemptFailureWithAttemptNumber",
                json!({
                    "jobId": job.id,
                    "attemptNumber": 0,
                    "connectionId": connection_id,
                    "attemptFailureSummary": summary,
                }),
            )
            .await
            .unwrap();

        let attempt = &store.get_job(job.id).await.unwrap().attempts[0];
        assert_eq!(attempt.status, syncflow_jobs::AttemptStatus::Failed);
        let stored = serde_json::to_value(attempt.failure_summary.as_ref().unwrap()).unwrap();
        assert_eq!(stored["failures"][0]["failureOrigin"], "dbt");
        assert_eq!(stored["failures"][0]["failureType"], "transient_error");
        assert_eq!(stored["failures"][0]["stacktrace"], "dbt run exited 2");
        assert_eq!(stored["partialSuccess"], true);
    }

    #[tokio::test]
    async fn test_unknown_activity_type() {
        let (_, registry) = registry();
        let ctx = ActivityContext::first_delivery("deleteJob");

        let result = registry.execute(&ctx, "deleteJob", json!({})).await;
        assert!(matches!(result, Err(RegistryError::UnknownActivityType(_))));

        let error: ActivityError = result.unwrap_err().into();
        assert!(error.is_type(error_types::UNKNOWN_ACTIVITY));
    }

    #[tokio::test]
    async fn test_invalid_input() {
        let (_, registry) = registry();
        let ctx = ActivityContext::first_delivery("createNewAttempt");

        let result = registry
            .execute(&ctx, "createNewAttempt", json!({ "attemptId": 1 }))
            .await;
        assert!(matches!(result, Err(RegistryError::Deserialization(_))));
    }

    #[tokio::test]
    async fn test_retry_stops_on_non_retryable() {
        let (store, registry) = registry();
        let job = store.create_job(uuid::Uuid::now_v7()).await.unwrap();
        let policy = RetryPolicy::fixed(Duration::ZERO, 3);

        store.fail_next_writes(5);
        let input = json!({ "jobId": job.id, "connectionId": job.connection_id });
        // Store faults outside attempt creation are not re-delivered
        let error = registry
            .execute_with_retry("reportJobStart", input, &policy)
            .await
            .unwrap_err();
        assert!(error.is_type(error_types::BACKING_STORE_UNAVAILABLE));

        store.fail_next_writes(0);
        let output = registry
            .execute_with_retry("createNewAttempt", json!({ "jobId": job.id }), &policy)
            .await
            .unwrap();
        assert!(output["attemptId"].as_i64().is_some());
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_fault() {
        let (store, registry) = registry();
        let job = store.create_job(uuid::Uuid::now_v7()).await.unwrap();
        let policy = RetryPolicy::fixed(Duration::ZERO, 3);

        store.fail_next_writes(2);
        let output = registry
            .execute_with_retry("createNewAttemptNumber", json!({ "jobId": job.id }), &policy)
            .await
            .unwrap();
        assert_eq!(output["attemptNumber"], 0);
        assert_eq!(store.get_job(job.id).await.unwrap().attempts.len(), 1);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let (store, registry) = registry();
        let job = store.create_job(uuid::Uuid::now_v7()).await.unwrap();
        let policy = RetryPolicy::fixed(Duration::ZERO, 2);

        store.fail_next_writes(2);
        let error = registry
            .execute_with_retry("createNewAttempt", json!({ "jobId": job.id }), &policy)
            .await
            .unwrap_err();
        assert!(error.retryable);
        assert!(store.get_job(job.id).await.unwrap().attempts.is_empty());
    }
}
