//! # Job Store
//!
//! Jobs and attempts for connection syncs, and the state machine that moves
//! them between statuses.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       state_machine                          │
//! │  (pure transitions over a Job snapshot: Applied/Unchanged)  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         JobStore                             │
//! │  (one serializable unit per call: memory or PostgreSQL)     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use syncflow_jobs::{state_machine, InMemoryJobStore, Job, JobStatus, JobStore};
//!
//! # tokio_test_block(async {
//! let store = InMemoryJobStore::new();
//! let job = store.create_job(uuid::Uuid::now_v7()).await.unwrap();
//! let attempt_id = store.allocate_attempt_id().await.unwrap();
//!
//! let update = store
//!     .update_job(
//!         job.id,
//!         Box::new(move |job: &mut Job| state_machine::start_attempt(job, attempt_id, false)),
//!     )
//!     .await
//!     .unwrap();
//! assert_eq!(update.job.status, JobStatus::Running);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

pub mod error;
pub mod model;
pub mod persistence;
pub mod state_machine;

pub use error::{JobError, Result};
pub use model::{
    Attempt, AttemptRef, AttemptStatus, ConnectionId, FailureOrigin, FailureReason,
    FailureSummary, FailureType, Job, JobId, JobStatus, SyncOutput,
};
pub use persistence::{
    InMemoryJobStore, JobFilter, JobMutation, JobStore, JobUpdate, PostgresJobStore, StoreError,
};
pub use state_machine::Transition;
