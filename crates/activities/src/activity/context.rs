//! Activity execution context

use tokio::sync::mpsc;
use uuid::Uuid;

/// Payload sent with heartbeats
#[derive(Debug, Clone)]
pub struct HeartbeatPayload {
    /// Optional progress details
    pub details: Option<serde_json::Value>,
}

/// Error from heartbeat operations
#[derive(Debug, thiserror::Error)]
pub enum HeartbeatError {
    /// Heartbeat channel closed (activity timed out)
    #[error("heartbeat channel closed")]
    ChannelClosed,
}

/// Context provided to activities during execution
///
/// Describes the current delivery of an activity call. The engine delivers
/// each call at least once; `attempt` counts deliveries of the same call and
/// lets creation activities recognise a re-delivery of work that already
/// committed.
///
/// Cancellation is signalled to the workflow, never to a running activity,
/// so the context carries no cancellation token.
#[derive(Debug)]
pub struct ActivityContext {
    /// Unique id of this delivery
    pub execution_id: Uuid,

    /// Current delivery number (1-based)
    pub attempt: u32,

    /// Maximum deliveries allowed
    pub max_attempts: u32,

    /// Workflow instance that invoked the activity
    pub workflow_id: Uuid,

    /// Name of the invoked activity
    pub activity_type: String,

    /// Heartbeat sender
    heartbeat_tx: Option<mpsc::Sender<HeartbeatPayload>>,
}

impl ActivityContext {
    /// Create a new activity context
    pub fn new(
        workflow_id: Uuid,
        activity_type: impl Into<String>,
        attempt: u32,
        max_attempts: u32,
    ) -> Self {
        Self {
            execution_id: Uuid::now_v7(),
            attempt,
            max_attempts,
            workflow_id,
            activity_type: activity_type.into(),
            heartbeat_tx: None,
        }
    }

    /// Context for a single first delivery
    pub fn first_delivery(activity_type: impl Into<String>) -> Self {
        Self::new(Uuid::now_v7(), activity_type, 1, 1)
    }

    /// Create a context with heartbeat support
    pub fn with_heartbeat(mut self, tx: mpsc::Sender<HeartbeatPayload>) -> Self {
        self.heartbeat_tx = Some(tx);
        self
    }

    /// Record a heartbeat
    ///
    /// # Errors
    ///
    /// Returns an error if the heartbeat channel is closed.
    pub async fn heartbeat(
        &self,
        details: Option<serde_json::Value>,
    ) -> Result<(), HeartbeatError> {
        if let Some(tx) = &self.heartbeat_tx {
            tx.send(HeartbeatPayload { details })
                .await
                .map_err(|_| HeartbeatError::ChannelClosed)?;
        }

        Ok(())
    }

    /// Whether the engine delivered this call before
    pub fn is_redelivery(&self) -> bool {
        self.attempt > 1
    }

    /// Check if this is the last retry attempt
    pub fn is_last_attempt(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}
