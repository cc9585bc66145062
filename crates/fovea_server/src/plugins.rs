//! Plugin discovery endpoints.

use axum::extract::{Path, State};
use axum::Json;

use fovea_protocol::{PluginManifestResponse, PluginSummary};

use crate::error::ApiError;
use crate::state::AppState;

/// `GET /v1/plugins`
pub async fn list_plugins(State(state): State<AppState>) -> Json<Vec<PluginSummary>> {
    Json(state.registry.list())
}

/// `GET /v1/plugins/{id}/manifest`
pub async fn get_manifest(
    State(state): State<AppState>,
    Path(plugin_id): Path<String>,
) -> Result<Json<PluginManifestResponse>, ApiError> {
    Ok(Json(state.registry.manifest(&plugin_id)?))
}
