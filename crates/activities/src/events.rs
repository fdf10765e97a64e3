// Job Lifecycle Events
//
// Sink for job lifecycle events: reported starts and completed transitions.
// Sinks are best effort; a failing sink never fails the activity that
// produced the event.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use syncflow_jobs::{ConnectionId, JobId};
use tracing::info;

/// Lifecycle events emitted by the activity surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    /// A workflow reported that it started driving the job
    Started {
        job_id: JobId,
        connection_id: ConnectionId,
        timestamp: DateTime<Utc>,
    },

    /// The job succeeded
    Succeeded {
        job_id: JobId,
        connection_id: ConnectionId,
        attempt_number: i32,
        timestamp: DateTime<Utc>,
    },

    /// The job failed
    Failed {
        job_id: JobId,
        connection_id: ConnectionId,
        attempt_number: i32,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// The job was cancelled
    Cancelled {
        job_id: JobId,
        connection_id: ConnectionId,
        timestamp: DateTime<Utc>,
    },

    /// An orphaned job was failed by clean-up
    Recovered {
        job_id: JobId,
        connection_id: ConnectionId,
        timestamp: DateTime<Utc>,
    },
}

impl JobEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::Succeeded { .. } => "succeeded",
            Self::Failed { .. } => "failed",
            Self::Cancelled { .. } => "cancelled",
            Self::Recovered { .. } => "recovered",
        }
    }

    pub fn job_id(&self) -> JobId {
        match self {
            Self::Started { job_id, .. }
            | Self::Succeeded { job_id, .. }
            | Self::Failed { job_id, .. }
            | Self::Cancelled { job_id, .. }
            | Self::Recovered { job_id, .. } => *job_id,
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        match self {
            Self::Started { connection_id, .. }
            | Self::Succeeded { connection_id, .. }
            | Self::Failed { connection_id, .. }
            | Self::Cancelled { connection_id, .. }
            | Self::Recovered { connection_id, .. } => *connection_id,
        }
    }
}

/// Error returned by event sinks
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("sink unavailable: {0}")]
    Unavailable(String),
}

/// Destination for job lifecycle events
#[async_trait]
pub trait JobEventSink: Send + Sync {
    /// Sink name for logging
    fn name(&self) -> &'static str;

    /// Record an event
    async fn record(&self, event: JobEvent) -> Result<(), SinkError>;
}

/// Sink that writes events as structured log records
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

#[async_trait]
impl JobEventSink for TracingEventSink {
    fn name(&self) -> &'static str {
        "tracing"
    }

    async fn record(&self, event: JobEvent) -> Result<(), SinkError> {
        info!(
            event = event.name(),
            job_id = event.job_id(),
            connection_id = %event.connection_id(),
            "job lifecycle event"
        );
        Ok(())
    }
}

/// Sink that keeps events in memory
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: RwLock<Vec<JobEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events, oldest first
    pub fn events(&self) -> Vec<JobEvent> {
        self.events.read().clone()
    }

    /// Names of the events recorded for a job
    pub fn names_for(&self, job_id: JobId) -> Vec<&'static str> {
        self.events
            .read()
            .iter()
            .filter(|e| e.job_id() == job_id)
            .map(|e| e.name())
            .collect()
    }
}

#[async_trait]
impl JobEventSink for MemoryEventSink {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn record(&self, event: JobEvent) -> Result<(), SinkError> {
        self.events.write().push(event);
        Ok(())
    }
}
