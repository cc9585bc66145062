//! Sqlite-backed job table.
//!
//! The database IS the queue: `JobStore::claim_oldest_pending` is the only
//! dequeue primitive in the system, and every mutation goes through the
//! documented store operations. A single sqlite file with WAL journaling is
//! sufficient because the server and worker share one process.

pub mod error;
pub mod jobs;
pub mod models;
pub mod pool;
mod schema;

pub use error::{DbError, Result};
pub use jobs::JobStore;
pub use models::{JobRecord, NewJob, ToolSelection};
pub use pool::{open_file, open_memory};
