//! Persistence layer for jobs and attempts
//!
//! This module provides:
//! - [`JobStore`] trait for transactional job persistence
//! - [`InMemoryJobStore`] for testing and single-process workers
//! - [`PostgresJobStore`] for production

mod memory;
mod postgres;
mod store;

pub use memory::InMemoryJobStore;
pub use postgres::PostgresJobStore;
pub use store::{JobFilter, JobMutation, JobStore, JobUpdate, StoreError};
