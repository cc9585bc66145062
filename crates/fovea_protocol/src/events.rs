//! Job progress events pushed over the in-process bus.
//!
//! Events are advisory. The persisted job row is authoritative; subscribers
//! that miss an event reconcile by reading the row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::JobStatus;

/// A single status observation for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEvent {
    pub status: JobStatus,
    /// Between-tool completion hint in [0, 100].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    /// Populated on `failed` events only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Populated on `completed` events only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobEvent {
    pub fn running(progress: Option<u8>) -> Self {
        Self {
            status: JobStatus::Running,
            progress,
            error: None,
            completed_at: None,
        }
    }

    pub fn completed(at: DateTime<Utc>) -> Self {
        Self {
            status: JobStatus::Completed,
            progress: Some(100),
            error: None,
            completed_at: Some(at),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            progress: None,
            error: Some(error.into()),
            completed_at: None,
        }
    }

    /// Terminal events end the stream for their job.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
