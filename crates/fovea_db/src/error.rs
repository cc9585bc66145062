//! Error types for the database layer.

use thiserror::Error;

/// Database operation result type.
pub type Result<T> = std::result::Result<T, DbError>;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    /// SQLx error (connection, query, etc.)
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Insert with a job id that already exists
    #[error("Duplicate job id: {0}")]
    DuplicateId(String),

    /// Job id not present in the table
    #[error("Job not found: {0}")]
    NotFound(String),

    /// Attempted state transition the state machine forbids.
    /// Observing this is a bug in the caller, not an operational condition.
    #[error("Illegal transition for job {job_id}: {detail}")]
    IllegalTransition { job_id: String, detail: String },

    /// Row contents that cannot be decoded into a job record
    #[error("Corrupt job row: {0}")]
    Corrupt(String),
}

impl DbError {
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }
}
