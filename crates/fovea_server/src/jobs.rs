//! Job polling endpoints.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use std::str::FromStr;

use fovea_blob::BlobKey;
use fovea_db::JobRecord;
use fovea_protocol::{JobId, JobResponse, JobStatus};

use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_LIST_LIMIT: u32 = 50;
const MAX_LIST_LIMIT: u32 = 500;

/// `GET /v1/jobs/{job_id}`: the row projection, with the output document
/// inlined once the job is completed.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobResponse>, ApiError> {
    let job_id = JobId::from_str(&job_id)
        .map_err(|_| ApiError::bad_request(format!("invalid job id: {job_id}")))?;

    let record = state.store.get(job_id).await?;

    let results = match (&record.status, &record.output_path) {
        (JobStatus::Completed, Some(output_path)) => {
            let key = BlobKey::new(output_path.clone())?;
            let bytes = state.blobs.read(&key).await?;
            let mut document: serde_json::Value = serde_json::from_slice(&bytes).map_err(|e| {
                ApiError::Internal(format!("output document for {job_id} is not JSON: {e}"))
            })?;
            // Single-tool documents wrap the tool mapping in a "results"
            // envelope; clients get the mapping itself. Multi-tool
            // documents ({plugin_id, tools}) are returned whole.
            let single = record.job_type == fovea_protocol::JobType::Single;
            let inlined = if single && document.get("results").is_some() {
                document["results"].take()
            } else {
                document
            };
            Some(inlined)
        }
        _ => None,
    };

    Ok(Json(projection(record, results)))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    status: Option<String>,
    limit: Option<u32>,
}

/// `GET /v1/jobs?status=&limit=`: recent jobs, newest first, without
/// inlined results.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<JobResponse>>, ApiError> {
    let status = params
        .status
        .as_deref()
        .map(JobStatus::from_str)
        .transpose()
        .map_err(|e| ApiError::bad_request(format!("invalid status filter: {e}")))?;
    let limit = params.limit.unwrap_or(DEFAULT_LIST_LIMIT).min(MAX_LIST_LIMIT);

    let records = state.store.list_recent(status, limit).await?;
    Ok(Json(
        records
            .into_iter()
            .map(|record| projection(record, None))
            .collect(),
    ))
}

fn projection(record: JobRecord, results: Option<serde_json::Value>) -> JobResponse {
    JobResponse {
        job_id: record.job_id,
        status: record.status,
        plugin_id: record.plugin_id,
        job_type: record.job_type,
        tool: record.tool,
        tool_list: record.tool_list,
        results,
        error_message: record.error_message,
        created_at: record.created_at,
        updated_at: record.updated_at,
    }
}
