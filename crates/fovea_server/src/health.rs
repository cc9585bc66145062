//! Worker liveness endpoint.

use axum::extract::State;
use axum::Json;

use fovea_protocol::HealthResponse;

use crate::state::AppState;

/// `GET /v1/worker/health`
pub async fn worker_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        alive: state.heartbeat.is_alive(state.config.heartbeat_stale),
        last_heartbeat: state.heartbeat.last(),
    })
}
