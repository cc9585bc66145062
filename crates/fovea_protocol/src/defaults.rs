//! Canonical default values shared across the server and worker.

/// Worker poll interval when the queue is empty (milliseconds).
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Heartbeat staleness threshold (milliseconds). 10x the poll interval.
pub const DEFAULT_HEARTBEAT_STALE_MS: u64 = 5_000;

/// Maximum accepted upload size (bytes).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 512 * 1024 * 1024;

/// HTTP bind address.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8420";

/// Subdirectory of the data root that holds result documents.
pub const OUTPUT_DIR: &str = "output";

/// How many leading bytes of a video upload are searched for the MP4
/// `ftyp` marker.
pub const MP4_MAGIC_WINDOW: usize = 64;

/// Jitter cap added to the worker poll sleep (milliseconds).
pub const POLL_JITTER_MS: u64 = 50;
