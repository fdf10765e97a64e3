//! # Job Activities
//!
//! The activity surface a sync workflow invokes to create jobs and attempts
//! and to move them through their lifecycle.
//!
//! ## Features
//!
//! - **Twelve named activities**: job creation, attempt creation by id or
//!   number, terminal transitions, start reporting and orphan clean-up
//! - **Retry envelope**: attempt creation reports transient store faults as
//!   retryable and recognises re-deliveries of committed work
//! - **Lifecycle events**: applied transitions are recorded to a pluggable sink
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     ActivityRegistry                         │
//! │  (name → activity, JSON in/out, re-delivery per policy)     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      JobActivities                           │
//! │  (one JobStore unit per operation, emits JobEvents)         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  JobStore (syncflow-jobs)                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use syncflow_activities::prelude::*;
//!
//! # tokio_test_block(async {
//! let service = Arc::new(JobActivities::new(
//!     Arc::new(InMemoryJobStore::new()),
//!     Arc::new(MemoryEventSink::new()),
//! ));
//! let registry = ActivityRegistry::with_job_activities(service);
//!
//! let output = registry
//!     .execute_with_retry(
//!         "createNewJob",
//!         serde_json::json!({ "connectionId": uuid::Uuid::now_v7() }),
//!         &RetryPolicy::no_retry(),
//!     )
//!     .await
//!     .unwrap();
//! assert_eq!(output["jobId"], 1);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(f)
//! # }
//! ```

pub mod activities;
pub mod activity;
pub mod config;
pub mod driver;
pub mod events;
pub mod registry;
pub mod reliability;
pub mod service;

/// Prelude for common imports
pub mod prelude {
    pub use crate::activities::types::*;
    pub use crate::activity::{error_types, Activity, ActivityContext, ActivityError};
    pub use crate::events::{JobEvent, JobEventSink, MemoryEventSink, TracingEventSink};
    pub use crate::registry::{ActivityRegistry, RegistryError};
    pub use crate::reliability::RetryPolicy;
    pub use crate::service::JobActivities;
    pub use syncflow_jobs::{InMemoryJobStore, JobStore, PostgresJobStore};
}

// Re-export key types at crate root
pub use activity::{Activity, ActivityContext, ActivityError, StoreFaults};
pub use config::{StoreBackend, WorkerConfig};
pub use events::{JobEvent, JobEventSink, MemoryEventSink, SinkError, TracingEventSink};
pub use registry::{ActivityRegistry, AnyActivity, RegistryError};
pub use reliability::RetryPolicy;
pub use service::JobActivities;
