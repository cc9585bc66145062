//! Single-job execution: dispatch, aggregation, output write, finalize.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::debug;

use fovea_blob::BlobKey;
use fovea_plugins::{ToolArgs, ToolInput};
use fovea_protocol::defaults::OUTPUT_DIR;
use fovea_protocol::{JobEvent, JobType, UploadKind};

use fovea_db::JobRecord;

use crate::worker::WorkerHandles;

/// Drive one claimed job to `completed`. Any error propagates to the
/// worker loop, which finalizes the job as failed; partial results are
/// never persisted.
pub async fn execute_job(handles: &WorkerHandles, job: &JobRecord) -> Result<()> {
    let input_key = BlobKey::new(job.input_path.clone())
        .with_context(|| format!("job {} has an invalid input key", job.job_id))?;

    let tools = job.tools_to_run();
    anyhow::ensure!(!tools.is_empty(), "job has no tools to run");

    let args = Arc::new(build_args(handles, job, &input_key).await?);

    let total = tools.len();
    let mut results: Map<String, Value> = Map::new();

    for (index, tool) in tools.iter().enumerate() {
        let registry = Arc::clone(&handles.registry);
        let plugin_id = job.plugin_id.clone();
        let tool_name = tool.clone();
        let call_args = Arc::clone(&args);

        // Plugin code blocks on CPU or I/O; keep it off the event loop.
        let mapping = tokio::task::spawn_blocking(move || {
            registry.run_tool(&plugin_id, &tool_name, &call_args)
        })
        .await
        .context("plugin dispatch task panicked")??;

        results.insert(tool.clone(), Value::Object(mapping));

        // round(100 * completed / total)
        let percent = ((100 * (index + 1) + total / 2) / total) as u8;
        if let Err(e) = handles.store.update_progress(job.job_id, percent).await {
            debug!("Progress update for job {} dropped: {}", job.job_id, e);
        }
        handles
            .bus
            .publish(job.job_id, JobEvent::running(Some(percent)));
    }

    let document = shape_output(job, results);
    let serialized = serde_json::to_vec(&document).context("output serialization failed")?;

    let output_key = BlobKey::new(format!("{OUTPUT_DIR}/{}.json", job.job_id))?;
    let stored_key = handles.blobs.put(&serialized, &output_key).await?;

    handles
        .store
        .finalize_success(job.job_id, stored_key.as_str())
        .await?;
    handles
        .bus
        .publish(job.job_id, JobEvent::completed(Utc::now()));

    Ok(())
}

/// Assemble dispatch arguments once per job: image tools get the upload
/// bytes, video tools get the absolute path of the stored clip.
async fn build_args(
    handles: &WorkerHandles,
    job: &JobRecord,
    input_key: &BlobKey,
) -> Result<ToolArgs> {
    let input = match input_kind(job.input_path.as_str()) {
        UploadKind::Image => {
            let bytes = handles
                .blobs
                .read(input_key)
                .await
                .with_context(|| format!("cannot read input blob {}", input_key))?;
            ToolInput::Image { bytes }
        }
        UploadKind::Video => ToolInput::Video {
            path: handles.blobs.open_path(input_key),
        },
    };
    Ok(ToolArgs {
        job_id: job.job_id,
        input,
    })
}

/// Input kind is encoded in the blob key suffix: videos are stored as
/// `{job_id}.mp4`, everything else is an image.
fn input_kind(input_path: &str) -> UploadKind {
    if input_path.ends_with(".mp4") {
        UploadKind::Video
    } else {
        UploadKind::Image
    }
}

/// The two persisted result shapes.
fn shape_output(job: &JobRecord, mut results: Map<String, Value>) -> Value {
    match job.job_type {
        JobType::Single => {
            // Exactly one entry; unwrap it from the aggregation map.
            let inner = results
                .iter_mut()
                .next()
                .map(|(_, value)| value.take())
                .unwrap_or_else(|| Value::Object(Map::new()));
            json!({ "results": inner })
        }
        JobType::Multi => json!({
            "plugin_id": job.plugin_id,
            "tools": Value::Object(results),
        }),
    }
}
