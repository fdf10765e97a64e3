//! Activity trait definition

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use syncflow_jobs::JobError;

use super::ActivityContext;

/// Error type names carried in [`ActivityError::error_type`]
pub mod error_types {
    /// A precondition of the requested transition does not hold
    pub const ILLEGAL_STATE: &str = "IllegalState";

    /// The connection already has a non-terminal job
    pub const CONFLICTING_JOB: &str = "ConflictingJob";

    /// The job is terminal with a different outcome
    pub const TERMINAL_CONFLICT: &str = "TerminalConflict";

    /// The job store failed
    pub const BACKING_STORE_UNAVAILABLE: &str = "BackingStoreUnavailable";

    /// Transient failure the caller may safely re-deliver
    pub const RETRYABLE: &str = "Retryable";

    /// The input did not match the activity's contract
    pub const INVALID_INPUT: &str = "InvalidInput";

    /// No activity is registered under the requested name
    pub const UNKNOWN_ACTIVITY: &str = "UnknownActivity";
}

/// How an activity reports job store faults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFaults {
    /// Transient store faults are retryable; the activity is safe to re-deliver
    Retryable,

    /// Store faults surface as ordinary failures for the engine's policy to handle
    Surface,
}

/// Error type for activity failures
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityError {
    /// Error message
    pub message: String,

    /// Error type/code for programmatic handling
    pub error_type: Option<String>,

    /// Whether this error is retryable
    ///
    /// Non-retryable errors will immediately fail the activity
    /// without further retry attempts.
    pub retryable: bool,

    /// Additional error details (for debugging)
    pub details: Option<serde_json::Value>,
}

impl ActivityError {
    /// Create a new retryable error
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_type: None,
            retryable: true,
            details: None,
        }
    }

    /// Create a non-retryable error
    pub fn non_retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_type: None,
            retryable: false,
            details: None,
        }
    }

    /// Set the error type
    pub fn with_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = Some(error_type.into());
        self
    }

    /// Add error details
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Check the error type
    pub fn is_type(&self, error_type: &str) -> bool {
        self.error_type.as_deref() == Some(error_type)
    }

    /// Translate a job error into the engine-facing shape
    pub fn from_job_error(err: JobError, faults: StoreFaults) -> Self {
        let message = err.to_string();
        match err {
            JobError::JobNotFound(job_id) => Self::non_retryable(message)
                .with_type(error_types::ILLEGAL_STATE)
                .with_details(serde_json::json!({ "jobId": job_id })),
            JobError::AttemptNotFound { job_id, attempt } => Self::non_retryable(message)
                .with_type(error_types::ILLEGAL_STATE)
                .with_details(serde_json::json!({ "jobId": job_id, "attempt": attempt })),
            JobError::IllegalState(_) => {
                Self::non_retryable(message).with_type(error_types::ILLEGAL_STATE)
            }
            JobError::ConflictingJob {
                connection_id,
                job_id,
            } => Self::non_retryable(message)
                .with_type(error_types::CONFLICTING_JOB)
                .with_details(serde_json::json!({
                    "connectionId": connection_id,
                    "jobId": job_id,
                })),
            JobError::TerminalConflict {
                job_id,
                current,
                requested,
            } => Self::non_retryable(message)
                .with_type(error_types::TERMINAL_CONFLICT)
                .with_details(serde_json::json!({
                    "jobId": job_id,
                    "current": current,
                    "requested": requested,
                })),
            JobError::BackingStoreUnavailable(ref store_err) => match faults {
                StoreFaults::Retryable if store_err.is_transient() => {
                    Self::retryable(message).with_type(error_types::RETRYABLE)
                }
                _ => Self::non_retryable(message)
                    .with_type(error_types::BACKING_STORE_UNAVAILABLE),
            },
        }
    }
}

impl std::fmt::Display for ActivityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ActivityError {}

impl From<JobError> for ActivityError {
    fn from(err: JobError) -> Self {
        Self::from_job_error(err, StoreFaults::Surface)
    }
}

/// An activity is a single named operation invoked by the workflow engine
///
/// Activities take one plain-data input and return one plain-data output.
/// They keep no mutable state between invocations; everything they need is
/// in the input or in the job store.
///
/// # Example
///
/// ```ignore
/// use syncflow_activities::prelude::*;
///
/// struct ReportJobStart {
///     service: Arc<JobActivities>,
/// }
///
/// #[async_trait]
/// impl Activity for ReportJobStart {
///     const TYPE: &'static str = "reportJobStart";
///     type Input = ReportJobStartInput;
///     type Output = ();
///
///     async fn execute(
///         &self,
///         _ctx: &ActivityContext,
///         input: Self::Input,
///     ) -> Result<Self::Output, ActivityError> {
///         Ok(self.service.report_job_start(input.job_id, input.connection_id).await?)
///     }
/// }
/// ```
#[async_trait]
pub trait Activity: Send + Sync + 'static {
    /// Unique name of this activity
    ///
    /// This is used to look up the activity in the registry.
    const TYPE: &'static str;

    /// Input type for the activity
    type Input: Serialize + DeserializeOwned + Send;

    /// Output type for the activity
    type Output: Serialize + DeserializeOwned + Send;

    /// Execute the activity
    ///
    /// # Errors
    ///
    /// Return `ActivityError::retryable()` only when re-delivering the same
    /// input is safe. Return `ActivityError::non_retryable()` otherwise.
    async fn execute(
        &self,
        ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError>;
}
