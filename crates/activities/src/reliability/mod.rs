//! Re-delivery of failed activity calls

mod retry;

pub use retry::RetryPolicy;
