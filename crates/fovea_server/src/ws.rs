//! Job progress WebSocket.
//!
//! Subscribe first, snapshot second: the subscription is registered before
//! the row is read, so a transition between snapshot and loop entry is
//! delivered rather than lost. The persisted row stays authoritative; the
//! stream is advisory.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::str::FromStr;
use tracing::debug;

use fovea_db::JobRecord;
use fovea_protocol::{JobEvent, JobId, JobStatus, WsStatusMessage};

use crate::error::ApiError;
use crate::state::AppState;

/// `WS /v1/ws/jobs/{job_id}`
pub async fn job_progress(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Response {
    let Ok(job_id) = JobId::from_str(&job_id) else {
        return ApiError::bad_request(format!("invalid job id: {job_id}")).into_response();
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state, job_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, job_id: JobId) {
    let (subscription, mut events) = state.bus.subscribe(job_id);

    let record = match state.store.get(job_id).await {
        Ok(record) => record,
        Err(e) => {
            debug!("WS for unknown job {}: {}", job_id, e);
            state.bus.unsubscribe(subscription);
            return;
        }
    };

    let (mut sink, mut stream) = socket.split();

    // Current status snapshot goes out immediately; if the job is already
    // terminal that is the only message.
    let snapshot = snapshot_event(&record);
    let terminal_at_connect = snapshot.is_terminal();
    if send_status(&mut sink, snapshot).await.is_err() || terminal_at_connect {
        state.bus.unsubscribe(subscription);
        let _ = sink.send(Message::Close(None)).await;
        return;
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    let terminal = event.is_terminal();
                    if send_status(&mut sink, event).await.is_err() || terminal {
                        break;
                    }
                }
                // The bus dropped us (terminal already published, or this
                // subscriber stalled); nothing more will arrive.
                None => break,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                // Clients do not speak on this socket
                Some(Ok(_)) => {}
            },
        }
    }

    state.bus.unsubscribe(subscription);
    let _ = sink.send(Message::Close(None)).await;
}

async fn send_status(
    sink: &mut SplitSink<WebSocket, Message>,
    event: JobEvent,
) -> Result<(), ()> {
    let message = WsStatusMessage::from(event);
    let text = serde_json::to_string(&message).map_err(|_| ())?;
    sink.send(Message::Text(text)).await.map_err(|_| ())
}

/// Map the persisted row to the event a fresh subscriber should see.
fn snapshot_event(record: &JobRecord) -> JobEvent {
    match record.status {
        JobStatus::Pending => JobEvent {
            status: JobStatus::Pending,
            progress: None,
            error: None,
            completed_at: None,
        },
        JobStatus::Running => JobEvent::running(record.progress),
        JobStatus::Completed => JobEvent::completed(record.updated_at),
        JobStatus::Failed => JobEvent::failed(
            record
                .error_message
                .clone()
                .unwrap_or_else(|| "unknown error".to_string()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fovea_protocol::JobType;

    fn record(status: JobStatus) -> JobRecord {
        JobRecord {
            job_id: JobId::generate(),
            status,
            plugin_id: "ocr".into(),
            job_type: JobType::Single,
            tool: Some("extract_text".into()),
            tool_list: None,
            input_path: "x.png".into(),
            output_path: None,
            error_message: None,
            progress: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn snapshot_of_failed_row_carries_the_error() {
        let mut failed = record(JobStatus::Failed);
        failed.error_message = Some("tool exploded".into());
        let event = snapshot_event(&failed);
        assert!(event.is_terminal());
        assert_eq!(event.error.as_deref(), Some("tool exploded"));
    }

    #[test]
    fn snapshot_of_completed_row_is_terminal_with_timestamp() {
        let event = snapshot_event(&record(JobStatus::Completed));
        assert!(event.is_terminal());
        assert!(event.completed_at.is_some());
    }

    #[test]
    fn snapshot_of_pending_row_is_not_terminal() {
        assert!(!snapshot_event(&record(JobStatus::Pending)).is_terminal());
    }
}
