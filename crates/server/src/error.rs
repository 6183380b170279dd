//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use depot_mirror::{MirrorError, UpstreamError};
use depot_storage::StorageError;
use serde::Serialize;

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Mirror(#[from] MirrorError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<depot_core::Error> for ApiError {
    fn from(err: depot_core::Error) -> Self {
        Self::Mirror(err.into())
    }
}

fn storage_status(err: &StorageError) -> StatusCode {
    match err {
        StorageError::NotFound(_) => StatusCode::NOT_FOUND,
        StorageError::AlreadyExists(_) => StatusCode::CONFLICT,
        StorageError::InvalidKey(_) => StatusCode::BAD_REQUEST,
        StorageError::Core(depot_core::Error::InvalidProvider(_)) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn upstream_status(err: &UpstreamError) -> StatusCode {
    match err {
        UpstreamError::Provider(e) if (400..500).contains(&e.status) => {
            StatusCode::from_u16(e.status).unwrap_or(StatusCode::BAD_GATEWAY)
        }
        _ => StatusCode::BAD_GATEWAY,
    }
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::Mirror(e) => match e {
                MirrorError::Validation(_) => "validation_error",
                MirrorError::Upstream(UpstreamError::Transport { .. }) => "upstream_unreachable",
                MirrorError::Upstream(_) | MirrorError::NoPlatforms(_) => "upstream_error",
                MirrorError::Storage(e) => storage_code(e),
                MirrorError::Core(_) | MirrorError::Internal(_) => "internal_error",
            },
            Self::Storage(e) => storage_code(e),
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Mirror(e) => match e {
                MirrorError::Validation(_) => StatusCode::BAD_REQUEST,
                MirrorError::Upstream(e) => upstream_status(e),
                MirrorError::NoPlatforms(_) => StatusCode::BAD_GATEWAY,
                MirrorError::Storage(e) => storage_status(e),
                MirrorError::Core(_) | MirrorError::Internal(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Storage(e) => storage_status(e),
        }
    }
}

fn storage_code(err: &StorageError) -> &'static str {
    match err {
        StorageError::NotFound(_) => "not_found",
        StorageError::AlreadyExists(_) => "conflict",
        StorageError::InvalidKey(_) => "bad_request",
        _ => "storage_error",
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
