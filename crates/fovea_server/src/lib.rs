//! HTTP ingress.
//!
//! Thin surface over the job store, blob store and plugin registry. The
//! ingress validates, writes the input blob, inserts the job row and
//! returns; all execution happens in the worker. Handlers suspend on
//! socket, disk and database I/O only, never on plugin dispatch.

mod error;
mod health;
mod jobs;
mod plugins;
mod state;
mod submit;
mod ws;

pub use error::ApiError;
pub use state::AppState;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

/// Build the `/v1` router.
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes as usize;
    Router::new()
        .route("/v1/plugins", get(plugins::list_plugins))
        .route("/v1/plugins/:plugin_id/manifest", get(plugins::get_manifest))
        .route("/v1/image/submit", post(submit::submit_image))
        .route("/v1/video/submit", post(submit::submit_video))
        .route("/v1/jobs", get(jobs::list_jobs))
        .route("/v1/jobs/:job_id", get(jobs::get_job))
        .route("/v1/ws/jobs/:job_id", get(ws::job_progress))
        .route("/v1/worker/health", get(health::worker_health))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
