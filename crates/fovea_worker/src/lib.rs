//! Background worker.
//!
//! Design principles:
//! - The job table is the queue; `claim_oldest_pending` is the only dequeue.
//! - Plugin dispatch is blocking and runs on the blocking pool, never on
//!   the ingress event loop.
//! - Shutdown lands between iterations; an in-flight job always reaches a
//!   terminal state first.

mod executor;
mod worker;

pub use executor::execute_job;
pub use worker::{Worker, WorkerConfig, WorkerHandles};
