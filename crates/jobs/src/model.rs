//! Job and attempt data model

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of an externally managed connection
pub type ConnectionId = Uuid;

/// Identifier of a job
pub type JobId = i64;

/// Job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job created, no attempt yet
    Pending,

    /// At least one attempt has been created
    Running,

    /// Job finished successfully
    Succeeded,

    /// Job failed
    Failed,

    /// Job was cancelled
    Cancelled,
}

impl JobStatus {
    /// Terminal statuses are never rewritten
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attempt status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Running,
    Succeeded,
    Failed,
}

impl AttemptStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque payload describing the results of a sync
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncOutput(pub serde_json::Value);

impl SyncOutput {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// Where a failure originated
///
/// Origins this crate does not know are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FailureOrigin {
    Source,
    Destination,
    Replication,
    Normalization,
    Platform,
    Unknown,
    Other(String),
}

impl FailureOrigin {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Source => "source",
            Self::Destination => "destination",
            Self::Replication => "replication",
            Self::Normalization => "normalization",
            Self::Platform => "platform",
            Self::Unknown => "unknown",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for FailureOrigin {
    fn from(s: String) -> Self {
        match s.as_str() {
            "source" => Self::Source,
            "destination" => Self::Destination,
            "replication" => Self::Replication,
            "normalization" => Self::Normalization,
            "platform" => Self::Platform,
            "unknown" => Self::Unknown,
            _ => Self::Other(s),
        }
    }
}

impl From<FailureOrigin> for String {
    fn from(origin: FailureOrigin) -> Self {
        match origin {
            FailureOrigin::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

/// Category of a failure
///
/// Types this crate does not know are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FailureType {
    ConfigError,
    SystemError,
    ManualCancellation,
    Unknown,
    Other(String),
}

impl FailureType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::ConfigError => "config_error",
            Self::SystemError => "system_error",
            Self::ManualCancellation => "manual_cancellation",
            Self::Unknown => "unknown",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for FailureType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "config_error" => Self::ConfigError,
            "system_error" => Self::SystemError,
            "manual_cancellation" => Self::ManualCancellation,
            "unknown" => Self::Unknown,
            _ => Self::Other(s),
        }
    }
}

impl From<FailureType> for String {
    fn from(failure_type: FailureType) -> Self {
        match failure_type {
            FailureType::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

/// A single diagnosed failure within an attempt
///
/// Fields not modelled here (stack traces, metadata) are carried in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureReason {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_origin: Option<FailureOrigin>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_type: Option<FailureType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
    /// RFC 3339 text or epoch milliseconds on input
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Millis(i64),
        Text(DateTime<Utc>),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Millis(ms) => DateTime::from_timestamp_millis(ms)
                .ok_or_else(|| D::Error::custom(format!("timestamp {ms} out of range"))),
            Repr::Text(ts) => Ok(ts),
        }
    }
}

/// Structured diagnostics attached to a failed or cancelled attempt
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureSummary {
    #[serde(default)]
    pub failures: Vec<FailureReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_success: Option<bool>,
}

/// Message recorded on attempts and jobs finalized by orphan recovery
pub const RECOVERY_MESSAGE: &str = "Setting attempt to FAILED because the workflow for this \
     connection was restarted, and existing job state was cleaned.";

impl FailureSummary {
    /// Synthetic summary for jobs left non-terminal with no workflow driving them
    pub fn platform_recovery() -> Self {
        Self {
            failures: vec![FailureReason {
                failure_origin: Some(FailureOrigin::Platform),
                failure_type: Some(FailureType::SystemError),
                external_message: Some(RECOVERY_MESSAGE.to_string()),
                internal_message: Some(RECOVERY_MESSAGE.to_string()),
                retryable: Some(false),
                timestamp: Utc::now(),
                extra: serde_json::Map::new(),
            }],
            partial_success: None,
        }
    }

    /// Whether this summary was produced by orphan recovery
    pub fn is_platform_recovery(&self) -> bool {
        self.failures.iter().any(|f| {
            f.failure_origin == Some(FailureOrigin::Platform)
                && f.external_message.as_deref() == Some(RECOVERY_MESSAGE)
        })
    }
}

/// Addresses an attempt either by surrogate id or by positional number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptRef {
    Id(i32),
    Number(i32),
}

impl fmt::Display for AttemptRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id {id}"),
            Self::Number(number) => write!(f, "number {number}"),
        }
    }
}

/// One execution try within a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    /// Surrogate id, unique within the job
    pub id: i32,

    /// Position within the job, contiguous from 0
    pub number: i32,

    pub status: AttemptStatus,
    pub sync_output: Option<SyncOutput>,
    pub failure_summary: Option<FailureSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Attempt {
    pub fn new(id: i32, number: i32) -> Self {
        let now = Utc::now();
        Self {
            id,
            number,
            status: AttemptStatus::Running,
            sync_output: None,
            failure_summary: None,
            created_at: now,
            updated_at: now,
            ended_at: None,
        }
    }

    pub fn matches(&self, attempt: AttemptRef) -> bool {
        match attempt {
            AttemptRef::Id(id) => self.id == id,
            AttemptRef::Number(number) => self.number == number,
        }
    }
}

/// A sequence of attempts to sync one connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub connection_id: ConnectionId,
    pub status: JobStatus,

    /// Attempts ordered by number
    pub attempts: Vec<Attempt>,

    /// Human-readable reason recorded by job failure or orphan recovery
    pub failure_reason: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// First time a start was reported for the job
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(id: JobId, connection_id: ConnectionId) -> Self {
        let now = Utc::now();
        Self {
            id,
            connection_id,
            status: JobStatus::Pending,
            attempts: Vec::new(),
            failure_reason: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            ended_at: None,
        }
    }

    pub fn attempt(&self, attempt: AttemptRef) -> Option<&Attempt> {
        self.attempts.iter().find(|a| a.matches(attempt))
    }

    pub fn attempt_mut(&mut self, attempt: AttemptRef) -> Option<&mut Attempt> {
        self.attempts.iter_mut().find(|a| a.matches(attempt))
    }

    pub fn last_attempt(&self) -> Option<&Attempt> {
        self.attempts.last()
    }

    pub fn running_attempt(&self) -> Option<&Attempt> {
        self.attempts
            .iter()
            .find(|a| a.status == AttemptStatus::Running)
    }

    /// Number the next attempt will receive
    pub fn next_attempt_number(&self) -> i32 {
        self.attempts.len() as i32
    }
}
