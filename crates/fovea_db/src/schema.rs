//! Job table schema. All CREATE statements live here.

use sqlx::SqlitePool;

use crate::error::Result;

pub(crate) async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS jobs (
            job_id TEXT PRIMARY KEY,
            status TEXT NOT NULL,
            plugin_id TEXT NOT NULL,
            job_type TEXT NOT NULL,
            tool TEXT,
            tool_list TEXT,
            input_path TEXT NOT NULL,
            output_path TEXT,
            error_message TEXT,
            progress INTEGER,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )"#,
    )
    .execute(pool)
    .await?;

    // Claim scans: oldest pending first
    sqlx::query(
        r#"CREATE INDEX IF NOT EXISTS idx_jobs_status_created
           ON jobs (status, created_at)"#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
