//! Error types for the storage API
//!
//! Provides unified error handling using thiserror. Every error renders as
//! `{"detail": <message>}`.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use crate::models::ErrorResponse;
use crate::store::StoreError;

/// Message returned to clients when the store misreports a write.
pub const UNEXPECTED_ERROR_MESSAGE: &str = "Unexpected error has occurred";

/// Message returned to clients when the store cannot be reached.
pub const STORE_UNAVAILABLE_MESSAGE: &str = "Storage is unavailable";

// == API Error Enum ==
/// Unified error type for the storage API.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Requested key(s) are absent
    #[error("{0}")]
    NotFound(String),

    /// Request is well formed but not acceptable
    #[error("{0}")]
    InvalidRequest(String),

    /// Request body or query could not be parsed
    #[error("{0}")]
    Unprocessable(String),

    /// Store acknowledged a single-key write with the wrong count
    #[error("store wrote {observed} entries for key {key:?}, expected 1")]
    UnexpectedWriteCount { key: String, observed: u64 },

    /// Store could not complete the operation
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Unprocessable(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Unprocessable(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::UnexpectedWriteCount { .. } => (
                StatusCode::HTTP_VERSION_NOT_SUPPORTED,
                UNEXPECTED_ERROR_MESSAGE.to_string(),
            ),
            ApiError::Store(err) => {
                error!("Store operation failed: {}", err);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    STORE_UNAVAILABLE_MESSAGE.to_string(),
                )
            }
        };

        (status, Json(ErrorResponse::new(detail))).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the storage API.
pub type Result<T> = std::result::Result<T, ApiError>;
