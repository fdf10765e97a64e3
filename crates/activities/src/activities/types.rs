//! Inputs and outputs of the job activities
//!
//! Field names are camelCase and must stay stable: the workflow engine
//! records these values in its history and replays them. New fields are
//! added only with a `#[serde(default)]`.

use serde::{Deserialize, Serialize};
use syncflow_jobs::{ConnectionId, FailureSummary, JobId, SyncOutput};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCreationInput {
    pub connection_id: ConnectionId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCreationOutput {
    pub job_id: JobId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptCreationInput {
    pub job_id: JobId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptCreationOutput {
    pub attempt_id: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptNumberCreationOutput {
    pub attempt_number: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSuccessInput {
    pub job_id: JobId,
    pub attempt_id: i32,
    pub connection_id: ConnectionId,
    #[serde(default)]
    pub standard_sync_output: SyncOutput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSuccessInputWithAttemptNumber {
    pub job_id: JobId,
    pub attempt_number: i32,
    pub connection_id: ConnectionId,
    #[serde(default)]
    pub standard_sync_output: SyncOutput,
}

/// Finalizes a job as failed
///
/// `attempt_number` names the last attempt associated with the failure.
/// The attempt itself is failed separately with `attemptFailure`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobFailureInput {
    pub job_id: JobId,
    pub connection_id: ConnectionId,
    pub attempt_number: i32,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptFailureInput {
    pub job_id: JobId,
    pub attempt_id: i32,
    pub connection_id: ConnectionId,
    #[serde(default)]
    pub standard_sync_output: Option<SyncOutput>,
    #[serde(default)]
    pub attempt_failure_summary: Option<FailureSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptNumberFailureInput {
    pub job_id: JobId,
    pub attempt_number: i32,
    pub connection_id: ConnectionId,
    #[serde(default)]
    pub standard_sync_output: Option<SyncOutput>,
    #[serde(default)]
    pub attempt_failure_summary: Option<FailureSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCancelledInput {
    pub job_id: JobId,
    pub attempt_id: i32,
    pub connection_id: ConnectionId,
    #[serde(default)]
    pub attempt_failure_summary: Option<FailureSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCancelledInputWithAttemptNumber {
    pub job_id: JobId,
    pub attempt_number: i32,
    pub connection_id: ConnectionId,
    #[serde(default)]
    pub attempt_failure_summary: Option<FailureSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportJobStartInput {
    pub job_id: JobId,
    pub connection_id: ConnectionId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsureCleanJobStateInput {
    pub connection_id: ConnectionId,
}
