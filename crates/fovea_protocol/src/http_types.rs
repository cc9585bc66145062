//! HTTP API types for the `/v1` surface.
//!
//! These types are used by the server handlers and by clients (CLI, tests).
//! All types use serde with lowercase enum tagging; optional fields are
//! omitted from the wire when absent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::JobEvent;
use crate::types::{JobId, JobStatus, JobType, UploadKind};

// ============================================================================
// Plugin discovery
// ============================================================================

/// One row of `GET /v1/plugins`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginSummary {
    pub id: String,
    pub version: String,
    pub description: String,
}

/// One tool inside a plugin manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolManifestEntry {
    pub name: String,
    pub description: String,
    pub input_kinds: Vec<UploadKind>,
}

/// `GET /v1/plugins/{id}/manifest` response. Derived from the live plugin
/// instance's tool table, never from a shipped descriptor file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginManifestResponse {
    pub id: String,
    pub version: String,
    pub tools: Vec<ToolManifestEntry>,
}

// ============================================================================
// Submission and polling
// ============================================================================

/// `POST /v1/{image,video}/submit` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub job_id: JobId,
}

/// `GET /v1/jobs/{job_id}` response: a projection of the job row, with the
/// parsed output document inlined as `results` once the job is completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResponse {
    pub job_id: JobId,
    pub status: JobStatus,
    pub plugin_id: String,
    pub job_type: JobType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_list: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// WebSocket stream
// ============================================================================

/// Server-pushed message on `WS /v1/ws/jobs/{job_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WsStatusMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<JobEvent> for WsStatusMessage {
    fn from(event: JobEvent) -> Self {
        Self {
            message_type: "status".to_string(),
            status: event.status,
            progress: event.progress,
            error: event.error,
            completed_at: event.completed_at,
        }
    }
}

// ============================================================================
// Health and errors
// ============================================================================

/// `GET /v1/worker/health` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub alive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_heartbeat: Option<DateTime<Utc>>,
}

/// Error body for 4xx/5xx responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JobStatus;

    #[test]
    fn ws_message_carries_type_tag() {
        let msg = WsStatusMessage::from(JobEvent::failed("boom"));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "status");
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"], "boom");
        assert!(json.get("completed_at").is_none());
    }

    #[test]
    fn job_response_omits_absent_fields() {
        let response = JobResponse {
            job_id: JobId::generate(),
            status: JobStatus::Pending,
            plugin_id: "ocr".to_string(),
            job_type: JobType::Single,
            tool: Some("extract_text".to_string()),
            tool_list: None,
            results: None,
            error_message: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("tool_list").is_none());
        assert!(json.get("results").is_none());
        assert!(json.get("error_message").is_none());
    }
}
