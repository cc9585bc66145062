//! Job store: atomic state transitions over the jobs table.
//!
//! Claiming uses `UPDATE ... WHERE status = 'pending'` so that exactly one
//! caller observes any given row even under contention. Finalization uses
//! the same conditional-update guard against `running`.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use fovea_protocol::{JobId, JobStatus};

use crate::error::{DbError, Result};
use crate::models::{JobRecord, JobRow, NewJob, ToolSelection};

#[derive(Debug, Clone)]
pub struct JobStore {
    pool: SqlitePool,
}

impl JobStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new row with `status = pending`.
    pub async fn insert(&self, job: NewJob) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let (tool, tool_list) = match &job.selection {
            ToolSelection::Single(tool) => (Some(tool.clone()), None),
            ToolSelection::Multi(tools) => {
                let serialized = serde_json::to_string(tools)
                    .map_err(|e| DbError::corrupt(format!("tool_list encode: {e}")))?;
                (None, Some(serialized))
            }
        };

        let result = sqlx::query(
            r#"
            INSERT INTO jobs (job_id, status, plugin_id, job_type, tool, tool_list,
                              input_path, created_at, updated_at)
            VALUES (?, 'pending', ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(job.job_id.to_string())
        .bind(&job.plugin_id)
        .bind(job.selection.job_type().as_str())
        .bind(&tool)
        .bind(&tool_list)
        .bind(&job.input_path)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                info!("Inserted job {} for plugin {}", job.job_id, job.plugin_id);
                Ok(())
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(DbError::DuplicateId(job.job_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Atomically claim the oldest pending job, transitioning it to
    /// `running`. Returns `None` when the queue is empty.
    ///
    /// One conditional update is both the selection and the guard: the
    /// candidate subquery and the `status = 'pending'` recheck run inside
    /// a single statement, so concurrent claimers serialize on the write
    /// lock and a loser observes zero rows (a different candidate on its
    /// next poll), never a double claim.
    pub async fn claim_oldest_pending(&self) -> Result<Option<JobRecord>> {
        let now = Utc::now().to_rfc3339();
        let row: Option<JobRow> = sqlx::query_as(
            r#"
            UPDATE jobs
            SET status = 'running', updated_at = ?
            WHERE status = 'pending'
              AND job_id = (
                  SELECT job_id FROM jobs
                  WHERE status = 'pending'
                  ORDER BY created_at ASC
                  LIMIT 1
              )
            RETURNING *
            "#,
        )
        .bind(&now)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            debug!("No pending jobs to claim");
            return Ok(None);
        };

        let record = JobRecord::try_from(row)?;
        info!("Claimed job {}: {}", record.job_id, record.plugin_id);
        Ok(Some(record))
    }

    /// Transition `running -> completed`, recording the output blob key.
    pub async fn finalize_success(&self, job_id: JobId, output_path: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let rows_affected = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'completed',
                output_path = ?,
                error_message = NULL,
                progress = 100,
                updated_at = ?
            WHERE job_id = ? AND status = 'running'
            "#,
        )
        .bind(output_path)
        .bind(&now)
        .bind(job_id.to_string())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(self.transition_refused(job_id, "completed").await);
        }
        info!("Job {} completed: {}", job_id, output_path);
        Ok(())
    }

    /// Transition `running -> failed`, recording the error message.
    pub async fn finalize_failure(&self, job_id: JobId, message: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let rows_affected = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'failed',
                error_message = ?,
                output_path = NULL,
                updated_at = ?
            WHERE job_id = ? AND status = 'running'
            "#,
        )
        .bind(message)
        .bind(&now)
        .bind(job_id.to_string())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(self.transition_refused(job_id, "failed").await);
        }
        info!("Job {} failed: {}", job_id, message);
        Ok(())
    }

    /// Advisory progress hint. Dropped without error unless the job is
    /// currently running.
    pub async fn update_progress(&self, job_id: JobId, percent: u8) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            UPDATE jobs
            SET progress = ?, updated_at = ?
            WHERE job_id = ? AND status = 'running'
            "#,
        )
        .bind(percent.min(100) as i64)
        .bind(&now)
        .bind(job_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, job_id: JobId) -> Result<JobRecord> {
        let row: Option<JobRow> = sqlx::query_as(r#"SELECT * FROM jobs WHERE job_id = ?"#)
            .bind(job_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => JobRecord::try_from(row),
            None => Err(DbError::NotFound(job_id.to_string())),
        }
    }

    /// Recent jobs, newest first. Operator convenience for the listing
    /// endpoint; not part of the dispatch path.
    pub async fn list_recent(
        &self,
        status: Option<JobStatus>,
        limit: u32,
    ) -> Result<Vec<JobRecord>> {
        let rows: Vec<JobRow> = match status {
            Some(status) => {
                sqlx::query_as(
                    r#"
                    SELECT * FROM jobs
                    WHERE status = ?
                    ORDER BY created_at DESC
                    LIMIT ?
                    "#,
                )
                .bind(status.as_str())
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    r#"
                    SELECT * FROM jobs
                    ORDER BY created_at DESC
                    LIMIT ?
                    "#,
                )
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(JobRecord::try_from).collect()
    }

    /// Startup recovery: fail every job still marked `running`. Only safe
    /// to call before the worker task starts.
    pub async fn fail_orphaned_running(&self, message: &str) -> Result<u64> {
        let now = Utc::now().to_rfc3339();
        let rows_affected = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'failed',
                error_message = ?,
                output_path = NULL,
                updated_at = ?
            WHERE status = 'running'
            "#,
        )
        .bind(message)
        .bind(&now)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows_affected > 0 {
            info!("Failed {} orphaned running job(s) at startup", rows_affected);
        }
        Ok(rows_affected)
    }

    /// Build the error for a finalize call whose guard matched zero rows:
    /// either the job is missing or it is not `running`.
    async fn transition_refused(&self, job_id: JobId, target: &str) -> DbError {
        match self.get(job_id).await {
            Ok(record) => DbError::IllegalTransition {
                job_id: job_id.to_string(),
                detail: format!(
                    "cannot transition {} -> {}, job must be running",
                    record.status, target
                ),
            },
            Err(e) => e,
        }
    }
}
