// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker-facing endpoints: register, poll, result upload, source/certs
//! download (§6).

use axum::extract::multipart::Field;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use bytes::Bytes;
use futures_util::StreamExt;
use hangar_core::{BuildId, WorkerId};
use hangar_engine::ByteStream;
use hangar_token::WorkerToken;
use hangar_wire::{
    PollResponse, RegisterWorkerRequest, RegisterWorkerResponse, WorkerJobDescriptor,
};

use crate::auth::WorkerAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Adapt a multipart field into the chunk stream `hangar-engine` expects;
/// see the identical helper in `routes::builds` for why `ByteStream` needs
/// the borrowed lifetime instead of `'static`.
fn field_to_byte_stream<'a>(field: Field<'a>) -> ByteStream<'a> {
    Box::pin(field.map(|r| r.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))))
}

/// `register worker` (§6). Re-registering a known id refreshes
/// `last_seen_at` only — counters persist (§9).
pub async fn register(
    _admin: crate::auth::AdminAuth,
    State(state): State<AppState>,
    Json(req): Json<RegisterWorkerRequest>,
) -> Result<Json<RegisterWorkerResponse>, ApiError> {
    let id = req.id.unwrap_or_else(WorkerId::new);
    let now = chrono::Utc::now();
    let worker_token = WorkerToken::generate();
    let public_identifier = format!("worker-{}", &id.as_str()[id.as_str().len().saturating_sub(6)..]);

    let inserted = state
        .metadata
        .upsert_worker(&id, &req.name, &public_identifier, &req.capabilities, now, worker_token.reveal())
        .await?;

    Ok(Json(RegisterWorkerResponse {
        id,
        status: if inserted { "registered" } else { "re-registered" },
    }))
}

/// `poll` (§6): claim the oldest pending build for this worker, rotating
/// its token in the same response (§4.3).
pub async fn poll(
    WorkerAuth(worker): WorkerAuth,
    State(state): State<AppState>,
) -> Result<Json<PollResponse>, ApiError> {
    let now = chrono::Utc::now();
    let claimed = state.dispatcher.claim(&worker.id, now).await?;

    let new_token = WorkerToken::generate();
    state.metadata.rotate_worker_token(&worker.id, new_token.reveal(), now).await?;

    let job = claimed.map(|c| WorkerJobDescriptor {
        id: c.build_id.clone(),
        platform: c.platform,
        source_url: format!("/api/builds/{}/source", c.build_id),
        certs_url: c.has_certs.then(|| format!("/api/builds/{}/certs", c.build_id)),
        otp: c.otp,
        otp_expires_at: c.otp_expires_at,
    });

    Ok(Json(PollResponse { job, access_token: Some(new_token.reveal().to_string()) }))
}

/// `worker result upload` (§6). The `result` field streams straight into
/// the blob store as it's read off the wire (§4.1, §9's running-counter
/// size limit), which is why the CLI/worker contract requires `build_id`
/// and `success` to precede `result` on the wire: multipart fields can only
/// be consumed in order, so ownership must be known before the bytes start
/// landing on disk.
pub async fn upload_result(
    WorkerAuth(worker): WorkerAuth,
    State(state): State<AppState>,
    mut multipart: axum::extract::Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut build_id: Option<BuildId> = None;
    let mut success: Option<bool> = None;
    let mut error_message: Option<String> = None;
    let mut result_written = false;

    while let Some(field) = multipart.next_field().await.map_err(|e| ApiError::bad_request(e.to_string()))? {
        match field.name() {
            Some("build_id") => {
                build_id = Some(BuildId::from_string(field.text().await.map_err(|e| ApiError::bad_request(e.to_string()))?));
            }
            Some("worker_id") => {
                // Carried by the wire contract for the worker's own bookkeeping;
                // ownership is actually checked against the authenticated token.
                let _ = field.text().await;
            }
            Some("success") => {
                let text = field.text().await.map_err(|e| ApiError::bad_request(e.to_string()))?;
                success = Some(text == "true");
            }
            Some("error_message") => {
                error_message = Some(field.text().await.map_err(|e| ApiError::bad_request(e.to_string()))?);
            }
            Some("result") => {
                let build_id = build_id.clone().ok_or_else(|| ApiError::bad_request("`build_id` must precede `result`"))?;
                let success = success.ok_or_else(|| ApiError::bad_request("`success` must precede `result`"))?;
                if !success {
                    return Err(ApiError::bad_request("`result` attached to a non-successful upload"));
                }

                let build = state.metadata.get_build(&build_id).await?;
                if build.assigned_worker_id.as_deref() != Some(worker.id.as_str()) {
                    return Err(ApiError::forbidden("build is not assigned to this worker"));
                }

                let ext = field
                    .file_name()
                    .and_then(|name| name.rsplit_once('.'))
                    .map(|(_, extension)| extension.to_string())
                    .unwrap_or_else(|| "bin".to_string());

                let stream = field_to_byte_stream(field);
                state.lifecycle.complete(&build_id, stream, &ext).await?;
                result_written = true;
            }
            _ => {}
        }
    }

    let build_id = build_id.ok_or_else(|| ApiError::bad_request("missing `build_id` field"))?;
    let success = success.ok_or_else(|| ApiError::bad_request("missing `success` field"))?;

    if success {
        if !result_written {
            return Err(ApiError::bad_request("missing `result` field"));
        }
    } else {
        let build = state.metadata.get_build(&build_id).await?;
        if build.assigned_worker_id.as_deref() != Some(worker.id.as_str()) {
            return Err(ApiError::forbidden("build is not assigned to this worker"));
        }
        let message = error_message.unwrap_or_else(|| "build failed".to_string());
        state.lifecycle.fail(&build_id, &message).await?;
    }

    Ok(Json(serde_json::json!({ "success": true })))
}

/// `download source` (§6 — worker OR VM). Ownership is enforced by the
/// caller's token: a worker must own the assignment, a VM's token is
/// already bound to this exact build.
pub async fn download_source(
    auth: crate::auth::WorkerOrVmAuth,
    Path(_id): Path<BuildId>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let build = auth.build();
    stream_blob(&state, &build.source_blob_path).await
}

/// `download certs` (§6 — worker only).
pub async fn download_certs(
    WorkerAuth(worker): WorkerAuth,
    Path(id): Path<BuildId>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let build = state.metadata.get_build(&id).await?;
    if build.assigned_worker_id.as_deref() != Some(worker.id.as_str()) {
        return Err(ApiError::forbidden("build is not assigned to this worker"));
    }
    let path = build.certs_blob_path.as_deref().ok_or_else(|| ApiError::not_found("no certs for this build"))?;
    stream_blob(&state, path).await
}

async fn stream_blob(state: &AppState, logical_path: &str) -> Result<impl IntoResponse, ApiError> {
    let file = state.blob.open_logical(logical_path).await?;
    let filename = logical_path.rsplit('/').next().unwrap_or("download");
    let body = axum::body::Body::from_stream(tokio_util::io::ReaderStream::new(file));
    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        body,
    ))
}

/// `heartbeat` (§6 — worker or VM): the only trigger that advances
/// `assigned` to `building` (§9).
pub async fn heartbeat(
    auth: crate::auth::WorkerOrVmAuth,
    Path(id): Path<BuildId>,
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<hangar_wire::HeartbeatResponse>, ApiError> {
    let worker_id = auth.worker_id().ok_or_else(|| ApiError::forbidden("build has no assigned worker"))?;
    state.lifecycle.heartbeat(&id, &worker_id).await?;

    if !body.is_empty() {
        if let Ok(req) = serde_json::from_slice::<hangar_wire::HeartbeatRequest>(&body) {
            if let Some(percent) = req.progress {
                state.lifecycle.record_progress(&id, percent).await?;
            }
        }
    }

    Ok(Json(hangar_wire::HeartbeatResponse { status: "ok", timestamp: chrono::Utc::now() }))
}
