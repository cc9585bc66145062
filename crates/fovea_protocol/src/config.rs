//! Resolved system configuration shared by the launcher, server and worker.

use std::path::PathBuf;
use std::time::Duration;

/// Canonical configuration, fully resolved at startup.
///
/// Paths are absolute by the time this struct exists; resolution from the
/// environment and the optional config file happens in the launcher.
#[derive(Debug, Clone)]
pub struct SystemConfig {
    /// Root for input and output blobs. Absolute.
    pub data_root: PathBuf,
    /// Path of the sqlite job table. Absolute.
    pub db_path: PathBuf,
    /// HTTP bind address, e.g. `127.0.0.1:8420`.
    pub bind_addr: String,
    /// Worker poll interval when the queue is empty.
    pub poll_interval: Duration,
    /// Heartbeat age beyond which the health endpoint reports not-alive.
    pub heartbeat_stale: Duration,
    /// Roots plugins may load assets from (colon-separated in the env).
    pub plugin_search_path: Vec<PathBuf>,
    /// Maximum accepted upload size in bytes.
    pub max_upload_bytes: u64,
}
