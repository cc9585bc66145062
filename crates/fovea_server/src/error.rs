//! API error type and HTTP status mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::error;

use fovea_blob::BlobError;
use fovea_db::DbError;
use fovea_plugins::{RegistryError, ValidationError};
use fovea_protocol::ErrorBody;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if matches!(self, ApiError::Internal(_) | ApiError::ServiceUnavailable(_)) {
            error!("Request failed: {}", self);
        }
        let body = ErrorBody {
            detail: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        match err {
            // Unknown plugin is addressed by path/query and surfaces as 404
            ValidationError::UnknownPlugin(_) => ApiError::NotFound(err.to_string()),
            _ => ApiError::BadRequest(err.to_string()),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(id) => ApiError::NotFound(format!("unknown job: {id}")),
            DbError::IllegalTransition { .. } | DbError::Corrupt(_) => {
                ApiError::Internal(err.to_string())
            }
            // The database cannot accept the write right now
            DbError::Sqlx(_) | DbError::DuplicateId(_) => {
                ApiError::ServiceUnavailable(err.to_string())
            }
        }
    }
}

impl From<BlobError> for ApiError {
    fn from(err: BlobError) -> Self {
        match err {
            // Keys built by the server are never user-controlled; a bad
            // one is a bug, not a client error.
            BlobError::BadKey { .. } => ApiError::Internal(err.to_string()),
            BlobError::Storage { .. } | BlobError::BaseDir { .. } => {
                ApiError::ServiceUnavailable(err.to_string())
            }
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(_) => ApiError::NotFound(err.to_string()),
            RegistryError::UnknownTool { .. } => ApiError::BadRequest(err.to_string()),
            RegistryError::Plugin { .. } => ApiError::Internal(err.to_string()),
        }
    }
}
