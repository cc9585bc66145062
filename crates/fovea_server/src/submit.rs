//! Upload submission: validate, write the input blob, insert the job row.
//!
//! Validation runs before anything touches storage; a rejected submission
//! leaves no blob and no row behind.

use axum::extract::{Multipart, Query, State};
use axum::Json;
use tracing::info;

use fovea_blob::BlobKey;
use fovea_db::{NewJob, ToolSelection};
use fovea_plugins::validate_tools;
use fovea_protocol::defaults::MP4_MAGIC_WINDOW;
use fovea_protocol::{JobId, SubmitResponse, UploadKind};

use crate::error::ApiError;
use crate::state::AppState;

/// Image extensions kept on the stored blob key. Anything else is stored
/// as `.bin`; admissibility is never decided by the extension.
const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "gif", "bmp", "webp"];

/// `POST /v1/image/submit?plugin_id=X&tool=A&tool=B`
pub async fn submit_image(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
    multipart: Multipart,
) -> Result<Json<SubmitResponse>, ApiError> {
    submit(state, params, multipart, UploadKind::Image).await
}

/// `POST /v1/video/submit?plugin_id=X&tool=A`. MP4 only.
pub async fn submit_video(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
    multipart: Multipart,
) -> Result<Json<SubmitResponse>, ApiError> {
    submit(state, params, multipart, UploadKind::Video).await
}

async fn submit(
    state: AppState,
    params: Vec<(String, String)>,
    multipart: Multipart,
    kind: UploadKind,
) -> Result<Json<SubmitResponse>, ApiError> {
    let (plugin_id, tools) = parse_submit_query(&params)?;

    validate_tools(&state.registry, &plugin_id, &tools, kind)?;

    let upload = read_upload(multipart).await?;
    if upload.bytes.is_empty() {
        return Err(ApiError::bad_request("uploaded file is empty"));
    }

    let extension = match kind {
        UploadKind::Video => {
            if !has_mp4_magic(&upload.bytes) {
                return Err(ApiError::bad_request(
                    "video must be an MP4 (no ftyp marker in the first 64 bytes)",
                ));
            }
            "mp4".to_string()
        }
        UploadKind::Image => image_extension(upload.file_name.as_deref()),
    };

    let job_id = JobId::generate();
    let key = BlobKey::new(format!("{job_id}.{extension}"))?;
    let stored_key = state.blobs.put(&upload.bytes, &key).await?;

    state
        .store
        .insert(NewJob {
            job_id,
            plugin_id: plugin_id.clone(),
            selection: ToolSelection::from_ordered(tools),
            input_path: stored_key.as_str().to_string(),
        })
        .await?;

    info!(
        "Accepted {} submission {} for plugin {}",
        kind, job_id, plugin_id
    );
    Ok(Json(SubmitResponse { job_id }))
}

/// Pull `plugin_id` and the ordered `tool` values out of the query. The
/// pair list preserves duplicate keys, so URL order is execution order.
fn parse_submit_query(params: &[(String, String)]) -> Result<(String, Vec<String>), ApiError> {
    let mut plugin_id: Option<String> = None;
    let mut tools = Vec::new();

    for (key, value) in params {
        match key.as_str() {
            "plugin_id" => {
                if plugin_id.replace(value.clone()).is_some() {
                    return Err(ApiError::bad_request("plugin_id given more than once"));
                }
            }
            "tool" => tools.push(value.clone()),
            _ => {}
        }
    }

    let plugin_id =
        plugin_id.ok_or_else(|| ApiError::bad_request("query parameter plugin_id is required"))?;
    Ok((plugin_id, tools))
}

struct Upload {
    bytes: Vec<u8>,
    file_name: Option<String>,
}

/// Read the `file` part of the multipart body.
async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().map(|s| s.to_string());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("cannot read upload: {e}")))?;
        return Ok(Upload {
            bytes: bytes.to_vec(),
            file_name,
        });
    }
    Err(ApiError::bad_request("multipart field 'file' is required"))
}

/// MP4 check: the `ftyp` token must appear in the first 64 bytes.
fn has_mp4_magic(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(MP4_MAGIC_WINDOW)];
    window.windows(4).any(|chunk| chunk == b"ftyp")
}

fn image_extension(file_name: Option<&str>) -> String {
    file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or_else(|| "bin".to_string())
}
