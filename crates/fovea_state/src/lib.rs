//! In-process shared runtime state.
//!
//! Owned by the runtime struct built at startup and passed by reference;
//! nothing in here is a module-level singleton.

mod bus;
mod heartbeat;

pub use bus::{ProgressBus, SubscriptionHandle};
pub use heartbeat::Heartbeat;
