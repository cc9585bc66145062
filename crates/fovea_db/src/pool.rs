//! Sqlite pool creation.
//!
//! Concrete `SqlitePool` rather than `AnyPool` so `FromRow` works with
//! chrono types without boilerplate.

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::Result;
use crate::schema;

const MAX_CONNECTIONS: u32 = 5;

/// Open (creating if missing) the job database at `path` and ensure the
/// schema exists.
pub async fn open_file(path: &Path) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(options)
        .await?;

    apply_sqlite_optimizations(&pool).await?;
    schema::ensure_schema(&pool).await?;
    info!("Opened job database at {}", path.display());
    Ok(pool)
}

/// In-memory database for tests.
pub async fn open_memory() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        // A single long-lived connection keeps every query on the same
        // in-memory db.
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    schema::ensure_schema(&pool).await?;
    Ok(pool)
}

/// Apply SQLite-specific optimizations.
async fn apply_sqlite_optimizations(pool: &SqlitePool) -> Result<()> {
    // WAL mode for better concurrent access
    sqlx::query("PRAGMA journal_mode=WAL").execute(pool).await?;

    // NORMAL sync for better performance
    sqlx::query("PRAGMA synchronous=NORMAL")
        .execute(pool)
        .await?;

    sqlx::query("PRAGMA foreign_keys=ON").execute(pool).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_pool_opens() {
        let pool = open_memory().await;
        assert!(pool.is_ok());
    }

    #[tokio::test]
    async fn file_pool_creates_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.db");
        let pool = open_file(&path).await.unwrap();
        drop(pool);
        assert!(path.exists());
    }
}
