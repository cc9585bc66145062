//! Shared handler state, owned by the runtime and cloned per request.

use std::sync::Arc;

use fovea_blob::BlobStore;
use fovea_db::JobStore;
use fovea_plugins::PluginRegistry;
use fovea_protocol::SystemConfig;
use fovea_state::{Heartbeat, ProgressBus};

#[derive(Clone)]
pub struct AppState {
    pub store: JobStore,
    pub blobs: BlobStore,
    pub registry: Arc<PluginRegistry>,
    pub bus: Arc<ProgressBus>,
    pub heartbeat: Arc<Heartbeat>,
    pub config: Arc<SystemConfig>,
}
