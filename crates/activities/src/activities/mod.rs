//! The named job activities
//!
//! Thin typed wrappers over [`JobActivities`](crate::service::JobActivities).
//! Names and input/output shapes are a contract with recorded workflow
//! histories and must not change.

mod creation;
mod lifecycle;
mod status;
pub mod types;

pub use creation::{CreateNewAttempt, CreateNewAttemptNumber, CreateNewJob};
pub use lifecycle::{EnsureCleanJobState, ReportJobStart};
pub use status::{
    AttemptFailure, AttemptFailureWithAttemptNumber, JobCancelled, JobCancelledWithAttemptNumber,
    JobFailure, JobSuccess, JobSuccessWithAttemptNumber,
};
pub use types::*;
