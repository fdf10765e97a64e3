//! Activity abstractions
//!
//! Activities are the named operations the workflow engine invokes. They:
//! - Take one plain-data input and return one plain-data output
//! - May be delivered more than once
//! - Can send heartbeats to indicate liveness

mod context;
mod definition;

pub use context::{ActivityContext, HeartbeatError, HeartbeatPayload};
pub use definition::{error_types, Activity, ActivityError, StoreFaults};
