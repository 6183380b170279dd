//! Raw access to mirrored objects.
//!
//! Backends without their own public URLs (the filesystem backend) hand out
//! download URLs pointing here.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use futures::StreamExt;

const SERVED_PREFIX: &str = "mirror/";

fn content_type(key: &str) -> &'static str {
    if key.ends_with(".zip") {
        "application/zip"
    } else if key.ends_with(".json") {
        "application/json"
    } else if key.ends_with("_SHA256SUMS") {
        "text/plain; charset=utf-8"
    } else {
        "application/octet-stream"
    }
}

/// GET /v1/objects/{*key} - Stream a mirrored object.
pub async fn get_object(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Response> {
    if !key.starts_with(SERVED_PREFIX) {
        return Err(ApiError::NotFound(format!("object not found: {key}")));
    }

    let stream = state.store.get_stream(&key).await?;
    let body_stream = stream.map(|result| result.map_err(|e| std::io::Error::other(e.to_string())));

    Ok((
        StatusCode::OK,
        [(CONTENT_TYPE, content_type(&key))],
        Body::from_stream(body_stream),
    )
        .into_response())
}
