//! Job row models.
//!
//! `JobRow` mirrors the table exactly and is what sqlx decodes; `JobRecord`
//! is the typed view the rest of the system works with. The conversion is
//! the single place raw column text is parsed.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::str::FromStr;

use fovea_protocol::{JobId, JobStatus, JobType};

use crate::error::DbError;

/// Which tools a submission asked for. Exactly one variant is persisted,
/// matching `job_type`: `Single` fills `tool`, `Multi` fills `tool_list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolSelection {
    Single(String),
    Multi(Vec<String>),
}

impl ToolSelection {
    pub fn job_type(&self) -> JobType {
        match self {
            ToolSelection::Single(_) => JobType::Single,
            ToolSelection::Multi(_) => JobType::Multi,
        }
    }

    /// Tools in submission order, regardless of shape.
    pub fn tools(&self) -> Vec<String> {
        match self {
            ToolSelection::Single(tool) => vec![tool.clone()],
            ToolSelection::Multi(tools) => tools.clone(),
        }
    }

    /// Build from an ordered request list. One name is a single-tool job,
    /// more than one is a multi-tool job. Empty lists are rejected upstream
    /// by validation; this panics in debug builds only.
    pub fn from_ordered(mut tools: Vec<String>) -> Self {
        debug_assert!(!tools.is_empty(), "tool selection cannot be empty");
        if tools.len() == 1 {
            ToolSelection::Single(tools.remove(0))
        } else {
            ToolSelection::Multi(tools)
        }
    }
}

/// A job to insert. Timestamps and `pending` status are stamped by the store.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub job_id: JobId,
    pub plugin_id: String,
    pub selection: ToolSelection,
    /// Relative blob key of the uploaded input.
    pub input_path: String,
}

/// Typed view of one persisted job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub job_id: JobId,
    pub status: JobStatus,
    pub plugin_id: String,
    pub job_type: JobType,
    pub tool: Option<String>,
    pub tool_list: Option<Vec<String>>,
    pub input_path: String,
    pub output_path: Option<String>,
    pub error_message: Option<String>,
    pub progress: Option<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Tools to run, in submission order.
    pub fn tools_to_run(&self) -> Vec<String> {
        match self.job_type {
            JobType::Single => self.tool.clone().into_iter().collect(),
            JobType::Multi => self.tool_list.clone().unwrap_or_default(),
        }
    }
}

/// Raw table row.
#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub job_id: String,
    pub status: String,
    pub plugin_id: String,
    pub job_type: String,
    pub tool: Option<String>,
    pub tool_list: Option<String>,
    pub input_path: String,
    pub output_path: Option<String>,
    pub error_message: Option<String>,
    pub progress: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for JobRecord {
    type Error = DbError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let job_id = JobId::from_str(&row.job_id)
            .map_err(|e| DbError::corrupt(format!("job_id: {e}")))?;
        let status = JobStatus::from_str(&row.status)
            .map_err(|e| DbError::corrupt(format!("status: {e}")))?;
        let job_type = JobType::from_str(&row.job_type)
            .map_err(|e| DbError::corrupt(format!("job_type: {e}")))?;
        let tool_list = match row.tool_list {
            Some(raw) => Some(
                serde_json::from_str::<Vec<String>>(&raw)
                    .map_err(|e| DbError::corrupt(format!("tool_list: {e}")))?,
            ),
            None => None,
        };
        let progress = match row.progress {
            Some(value) => Some(
                u8::try_from(value)
                    .map_err(|_| DbError::corrupt(format!("progress out of range: {value}")))?,
            ),
            None => None,
        };

        Ok(JobRecord {
            job_id,
            status,
            plugin_id: row.plugin_id,
            job_type,
            tool: row.tool,
            tool_list,
            input_path: row.input_path,
            output_path: row.output_path,
            error_message: row.error_message,
            progress,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_shape_decides_job_type() {
        let single = ToolSelection::from_ordered(vec!["extract_text".into()]);
        assert_eq!(single.job_type(), JobType::Single);

        let multi =
            ToolSelection::from_ordered(vec!["player_detection".into(), "ball_detection".into()]);
        assert_eq!(multi.job_type(), JobType::Multi);
        assert_eq!(
            multi.tools(),
            vec!["player_detection".to_string(), "ball_detection".to_string()]
        );
    }
}
