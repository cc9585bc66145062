//! Configuration resolution.
//!
//! Settings come from CLI flags and environment variables, overridden by
//! an optional local TOML file. `data_root` and `db_path` are required and
//! must be absolute; everything else has a default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Deserialize;

use fovea_protocol::defaults::{
    DEFAULT_BIND_ADDR, DEFAULT_HEARTBEAT_STALE_MS, DEFAULT_MAX_UPLOAD_BYTES,
    DEFAULT_POLL_INTERVAL_MS,
};
use fovea_protocol::SystemConfig;

/// Settings accepted on the command line, each with an environment
/// fallback.
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigArgs {
    /// Root directory for input and output blobs
    #[arg(long, env = "DATA_ROOT")]
    pub data_root: Option<PathBuf>,

    /// Path of the sqlite job database
    #[arg(long, env = "DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// HTTP bind address
    #[arg(long, env = "BIND_ADDR")]
    pub bind_addr: Option<String>,

    /// Worker poll interval in milliseconds
    #[arg(long, env = "POLL_INTERVAL_MS")]
    pub poll_interval_ms: Option<u64>,

    /// Heartbeat staleness threshold in milliseconds
    #[arg(long, env = "HEARTBEAT_STALE_MS")]
    pub heartbeat_stale_ms: Option<u64>,

    /// Colon-separated roots plugins may load assets from
    #[arg(long, env = "PLUGIN_SEARCH_PATH")]
    pub plugin_search_path: Option<String>,

    /// Maximum accepted upload size in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES")]
    pub max_upload_bytes: Option<u64>,
}

/// Optional local settings file. Values here override the environment.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileSettings {
    pub data_root: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
    pub bind_addr: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub heartbeat_stale_ms: Option<u64>,
    pub plugin_search_path: Option<Vec<PathBuf>>,
    pub max_upload_bytes: Option<u64>,
}

pub fn load_file(path: &Path) -> Result<FileSettings> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read config file {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("Invalid config file {}", path.display()))
}

/// Merge file settings over CLI/env settings and apply defaults.
pub fn resolve(args: &ConfigArgs, file: FileSettings) -> Result<SystemConfig> {
    let data_root = file
        .data_root
        .or_else(|| args.data_root.clone())
        .context("DATA_ROOT is required (flag --data-root, env, or config file)")?;
    let db_path = file
        .db_path
        .or_else(|| args.db_path.clone())
        .context("DB_PATH is required (flag --db-path, env, or config file)")?;

    if !data_root.is_absolute() {
        bail!("DATA_ROOT must be an absolute path: {}", data_root.display());
    }
    if !db_path.is_absolute() {
        bail!("DB_PATH must be an absolute path: {}", db_path.display());
    }

    let plugin_search_path = file.plugin_search_path.unwrap_or_else(|| {
        args.plugin_search_path
            .as_deref()
            .map(split_search_path)
            .unwrap_or_default()
    });

    Ok(SystemConfig {
        data_root,
        db_path,
        bind_addr: file
            .bind_addr
            .or_else(|| args.bind_addr.clone())
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
        poll_interval: Duration::from_millis(
            file.poll_interval_ms
                .or(args.poll_interval_ms)
                .unwrap_or(DEFAULT_POLL_INTERVAL_MS),
        ),
        heartbeat_stale: Duration::from_millis(
            file.heartbeat_stale_ms
                .or(args.heartbeat_stale_ms)
                .unwrap_or(DEFAULT_HEARTBEAT_STALE_MS),
        ),
        plugin_search_path,
        max_upload_bytes: file
            .max_upload_bytes
            .or(args.max_upload_bytes)
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
    })
}

fn split_search_path(raw: &str) -> Vec<PathBuf> {
    raw.split(':')
        .filter(|part| !part.is_empty())
        .map(PathBuf::from)
        .collect()
}
