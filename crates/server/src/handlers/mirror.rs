//! Provider network mirror protocol endpoints.
//!
//! The protocol puts the version and the archive name in the last path
//! segment (`index.json`, `<version>.json`, `<archive>.zip`). axum cannot
//! route on a suffix, so one handler dispatches on it.

use crate::error::{ApiError, ApiResult};
use crate::metrics::record_mirror_response;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::http::header::LOCATION;
use axum::response::{IntoResponse, Response};
use depot_core::Provider;
use serde::Serialize;

/// Response header telling whether the answer came from the mirror store.
pub const MIRROR_SOURCE_HEADER: &str = "x-mirror-source";

const INDEX_FILE: &str = "index.json";

fn source_value(mirror_source: bool) -> &'static str {
    if mirror_source { "true" } else { "false" }
}

fn json_response<T: Serialize>(operation: &str, body: T, mirror_source: bool) -> Response {
    record_mirror_response(operation, mirror_source);
    (
        [(MIRROR_SOURCE_HEADER, source_value(mirror_source))],
        Json(body),
    )
        .into_response()
}

async fn redirect_to_archive(state: &AppState, provider: &Provider) -> ApiResult<Response> {
    let archive = state.mirror.retrieve_archive(provider).await?;
    record_mirror_response("retrieve_archive", archive.mirror_source);
    Ok((
        StatusCode::TEMPORARY_REDIRECT,
        [
            (LOCATION.as_str(), archive.location.as_str()),
            (MIRROR_SOURCE_HEADER, source_value(archive.mirror_source)),
        ],
    )
        .into_response())
}

/// GET /v1/mirror/{hostname}/{namespace}/{name}/{file}
pub async fn mirror_file(
    State(state): State<AppState>,
    Path((hostname, namespace, name, file)): Path<(String, String, String, String)>,
) -> ApiResult<Response> {
    let provider = Provider::new(&hostname, &namespace, &name);

    if file == INDEX_FILE {
        let versions = state.mirror.list_versions(&provider).await?;
        let mirror_source = versions.mirror_source;
        return Ok(json_response("list_versions", versions, mirror_source));
    }

    if let Some(version) = file.strip_suffix(".json") {
        let packages = state
            .mirror
            .list_installation_packages(&provider.with_version(version))
            .await?;
        let mirror_source = packages.mirror_source;
        return Ok(json_response(
            "list_installation_packages",
            packages,
            mirror_source,
        ));
    }

    if file.ends_with(".zip") {
        let build = Provider::from_archive_file_name(&hostname, &namespace, &file)
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        if build.name() != name {
            return Err(ApiError::BadRequest(format!(
                "archive {file} does not belong to provider {name}"
            )));
        }
        return redirect_to_archive(&state, &build).await;
    }

    Err(ApiError::NotFound(format!("unknown mirror file: {file}")))
}

/// GET /v1/mirror/{hostname}/{namespace}/{name}/{version}/{os}/{arch}
pub async fn retrieve_archive(
    State(state): State<AppState>,
    Path((hostname, namespace, name, version, os, arch)): Path<(
        String,
        String,
        String,
        String,
        String,
        String,
    )>,
) -> ApiResult<Response> {
    let provider = Provider::new(hostname, namespace, name)
        .with_version(version)
        .with_platform(os, arch);
    redirect_to_archive(&state, &provider).await
}
