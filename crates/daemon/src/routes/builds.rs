// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Submitter- and admin-facing endpoints: submit, status, logs, artifact
//! download, list, cancel, retry (§6).

use std::str::FromStr;

use axum::extract::multipart::Field;
use axum::extract::{Multipart, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use futures_util::StreamExt;
use hangar_blob::Namespace;
use hangar_core::{BuildId, Platform};
use hangar_engine::ByteStream;
use hangar_wire::{
    BuildSummary, CancelResponse, ListBuildsQuery, ListBuildsResponse, LogEntryWire, LogsQuery,
    LogsResponse, RetryResponse, StatusResponse, SubmitResponse,
};

use crate::auth::{AdminAuth, BuildAuth};
use crate::error::ApiError;
use crate::state::AppState;

/// Adapt a multipart field into the chunk stream `hangar-engine` expects,
/// without first buffering it: `Field<'a>` already implements `Stream<Item
/// = Result<Bytes, MultipartError>>`, so this only needs to map the error
/// type and box it. The `'a` ties the result to the `Multipart` the field
/// borrows from, which is why `ByteStream` carries a lifetime instead of
/// being fixed to `'static`.
fn field_to_byte_stream<'a>(field: Field<'a>) -> ByteStream<'a> {
    Box::pin(field.map(|r| r.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))))
}

/// `submit build` (§6). Each file field is written to the blob store as
/// soon as it's read off the wire — never collected into memory first — so
/// the per-namespace size limit in `BlobStore::put` bounds actual memory
/// use, not just the eventual on-disk size (§4.1, §9).
pub async fn submit(State(state): State<AppState>, mut multipart: Multipart) -> Result<impl IntoResponse, ApiError> {
    let id = BuildId::new();
    let mut platform: Option<Platform> = None;
    let mut source_path: Option<String> = None;
    let mut certs_path: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| ApiError::bad_request(e.to_string()))? {
        match field.name() {
            Some("platform") => {
                let text = field.text().await.map_err(|e| ApiError::bad_request(e.to_string()))?;
                platform = Some(Platform::from_str(&text).map_err(|e| ApiError::bad_request(e.to_string()))?);
            }
            Some("source") => {
                let key = format!("{}.zip", id.as_str());
                let stream = field_to_byte_stream(field);
                source_path = Some(state.lifecycle.store_blob(Namespace::Source, &key, stream, state.upload_limits.max_source_bytes).await?);
            }
            Some("certs") => {
                let key = format!("{}.zip", id.as_str());
                let stream = field_to_byte_stream(field);
                match state.lifecycle.store_blob(Namespace::Certs, &key, stream, state.upload_limits.max_certs_bytes).await {
                    Ok(path) => certs_path = Some(path),
                    Err(err) => {
                        if let Some(path) = &source_path {
                            state.lifecycle.discard_blob(path).await;
                        }
                        return Err(err.into());
                    }
                }
            }
            _ => {}
        }
    }

    let platform = platform.ok_or_else(|| ApiError::bad_request("missing `platform` field"))?;
    let source_path = match source_path {
        Some(path) => path,
        None => {
            if let Some(path) = &certs_path {
                state.lifecycle.discard_blob(path).await;
            }
            return Err(ApiError::bad_request("missing `source` field"));
        }
    };

    let outcome = state.lifecycle.finalize_submit(id, platform, source_path, certs_path).await?;
    Ok((
        axum::http::StatusCode::CREATED,
        Json(SubmitResponse {
            id: outcome.build_id,
            status: hangar_core::BuildStatus::Pending,
            submitted_at: outcome.submitted_at,
            access_token: outcome.build_token,
        }),
    ))
}

pub async fn status(BuildAuth(build): BuildAuth) -> Json<StatusResponse> {
    Json(StatusResponse {
        id: build.id,
        status: build.status,
        platform: build.platform,
        worker_id: build.assigned_worker_id.map(hangar_core::WorkerId::from_string),
        submitted_at: build.submitted_at,
        started_at: build.started_at,
        completed_at: build.completed_at,
        error_message: build.error_message,
    })
}

pub async fn logs(
    BuildAuth(build): BuildAuth,
    Query(query): Query<LogsQuery>,
    State(state): State<AppState>,
) -> Result<Json<LogsResponse>, ApiError> {
    let entries = state.metadata.get_logs(&build.id, query.limit).await?;
    Ok(Json(LogsResponse {
        logs: entries
            .into_iter()
            .map(|e| LogEntryWire { timestamp: e.timestamp, level: e.level.to_string(), message: e.message })
            .collect(),
    }))
}

pub async fn artifact(BuildAuth(build): BuildAuth, State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let path = build.result_blob_path.as_deref().ok_or_else(|| ApiError::not_found("no artifact for this build"))?;
    let file = state.blob.open_logical(path).await?;
    let filename = path.rsplit('/').next().unwrap_or("artifact");
    let body = axum::body::Body::from_stream(tokio_util::io::ReaderStream::new(file));
    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        body,
    ))
}

pub async fn list(
    _admin: AdminAuth,
    Query(query): Query<ListBuildsQuery>,
    State(state): State<AppState>,
) -> Result<Json<ListBuildsResponse>, ApiError> {
    let filter = hangar_storage::BuildFilter {
        status: query.status.as_deref().and_then(parse_status),
        platform: query.platform.as_deref().and_then(|p| Platform::from_str(p).ok()),
        worker_id: query.worker_id.map(hangar_core::WorkerId::from_string),
    };
    let builds = state.metadata.list_builds(&filter).await?;
    let total = builds.len();
    Ok(Json(ListBuildsResponse {
        builds: builds
            .into_iter()
            .map(|b| BuildSummary {
                id: b.id,
                status: b.status,
                platform: b.platform,
                worker_id: b.assigned_worker_id.map(hangar_core::WorkerId::from_string),
                submitted_at: b.submitted_at,
                completed_at: b.completed_at,
            })
            .collect(),
        total,
    }))
}

fn parse_status(s: &str) -> Option<hangar_core::BuildStatus> {
    use hangar_core::BuildStatus::*;
    match s {
        "pending" => Some(Pending),
        "assigned" => Some(Assigned),
        "building" => Some(Building),
        "completed" => Some(Completed),
        "failed" => Some(Failed),
        "cancelled" => Some(Cancelled),
        _ => None,
    }
}

pub async fn cancel(BuildAuth(build): BuildAuth, State(state): State<AppState>) -> Result<Json<CancelResponse>, ApiError> {
    state.lifecycle.cancel(&build.id).await?;
    Ok(Json(CancelResponse { status: hangar_core::BuildStatus::Cancelled }))
}

pub async fn retry(BuildAuth(build): BuildAuth, State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.lifecycle.retry(&build.id).await?;
    Ok((
        axum::http::StatusCode::CREATED,
        Json(RetryResponse {
            id: outcome.build_id,
            status: hangar_core::BuildStatus::Pending,
            access_token: outcome.build_token,
            original_build_id: build.id,
        }),
    ))
}
