// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ephemeral-VM endpoints: OTP exchange, secure cert bundle, telemetry,
//! log streaming (§6).

use axum::extract::{Path, State};
use axum::Json;
use hangar_core::{BuildId, LogLevel, TelemetryEvent};
use hangar_wire::{
    CertsSecureResponse, StreamLogsRequest, StreamLogsResponse, VmAuthRequest, VmAuthResponse,
};

use crate::auth::VmAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// `VM authenticate` (§6): exchange a build's one-time OTP for a VM token.
/// An OTP that doesn't resolve to any build is `Unauthorized`; one that
/// resolves but is already consumed or expired is `Conflict` (§8).
pub async fn authenticate(
    State(state): State<AppState>,
    Json(req): Json<VmAuthRequest>,
) -> Result<Json<VmAuthResponse>, ApiError> {
    let build = state
        .metadata
        .find_build_by_otp(&req.otp)
        .await?
        .ok_or_else(|| ApiError::unauthorized("unknown OTP"))?;

    let vm_token = state.lifecycle.authenticate_vm(&build.id, &req.otp, state.vm_token_ttl).await?;
    let expires_at = chrono::Utc::now() + state.vm_token_ttl;
    Ok(Json(VmAuthResponse { vm_token, expires_at }))
}

/// `certs-secure` (§6): the VM's one-shot signing bundle. A fresh keychain
/// password is minted on every call; nothing here is persisted.
pub async fn certs_secure(
    VmAuth(build): VmAuth,
    State(state): State<AppState>,
) -> Result<Json<CertsSecureResponse>, ApiError> {
    let bundle = state.lifecycle.certs_secure_bundle(&build.id).await?;
    Ok(Json(CertsSecureResponse {
        p12: bundle.p12,
        p12_password: bundle.p12_password,
        keychain_password: bundle.keychain_password,
        provisioning_profiles: bundle.provisioning_profiles,
    }))
}

/// `telemetry` (§6): a closed sum type is parsed before any business logic
/// sees it (§9). Only `CpuSnapshot` samples are persisted; the other
/// variants are acknowledged and dropped — they carry no data this
/// controller acts on.
pub async fn telemetry(
    VmAuth(build): VmAuth,
    Path(id): Path<BuildId>,
    State(state): State<AppState>,
    Json(event): Json<TelemetryEvent>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if id != build.id {
        return Err(ApiError::forbidden("VM token is not bound to this build"));
    }
    if let TelemetryEvent::CpuSnapshot { timestamp, data } = &event {
        if !data.is_valid() {
            return Err(ApiError::bad_request("cpu/memory sample out of range"));
        }
        state.metadata.append_cpu_snapshot(&build.id, *timestamp, data.cpu_percent, data.memory_mb).await?;
    }
    Ok(Json(serde_json::json!({ "status": "ok" })))
}

/// `stream logs` (§6): a VM posts one line or a batch; both shapes resolve
/// to the same ordered append (§5 ordering guarantee iii).
pub async fn stream_logs(
    VmAuth(build): VmAuth,
    Path(id): Path<BuildId>,
    State(state): State<AppState>,
    Json(req): Json<StreamLogsRequest>,
) -> Result<Json<StreamLogsResponse>, ApiError> {
    if id != build.id {
        return Err(ApiError::forbidden("VM token is not bound to this build"));
    }
    let lines = req.into_lines();
    let now = chrono::Utc::now();
    let entries: Vec<_> = lines
        .into_iter()
        .map(|line| (now, parse_level(&line.level), line.message))
        .collect();
    let count = entries.len();
    state.metadata.append_logs_batch(&build.id, &entries).await?;
    Ok(Json(StreamLogsResponse { success: true, count: Some(count) }))
}

fn parse_level(s: &str) -> LogLevel {
    match s {
        "warn" | "warning" => LogLevel::Warn,
        "error" => LogLevel::Error,
        _ => LogLevel::Info,
    }
}
