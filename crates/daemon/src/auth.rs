// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Axum extractors for the three subject headers plus the admin bypass
//! (§4.3, §6). Each extractor resolves straight to the domain row it
//! authorizes — handlers never see a bare token.

use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;
use hangar_core::{Build, BuildId, Worker, WorkerId};
use hangar_token::BuildToken;

use crate::error::ApiError;
use crate::state::AppState;

const API_KEY_HEADER: &str = "x-api-key";
const BUILD_TOKEN_HEADER: &str = "x-build-token";
const WORKER_TOKEN_HEADER: &str = "x-worker-token";
const VM_TOKEN_HEADER: &str = "x-vm-token";

fn header_str<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok())
}

fn is_admin(parts: &Parts, state: &AppState) -> bool {
    header_str(parts, API_KEY_HEADER).is_some_and(|v| state.admin_key.matches(v))
}

/// Requires the admin API key. Used by maintenance-only surfaces (§4.3):
/// register worker, list builds.
pub struct AdminAuth;

impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if is_admin(parts, state) {
            Ok(AdminAuth)
        } else {
            Err(ApiError::unauthorized("missing or invalid admin API key"))
        }
    }
}

/// The build identified by the `{id}` path segment, authorized either by
/// the admin key or by a matching `X-Build-Token` (§6 "admin or build").
pub struct BuildAuth(pub Build);

impl FromRequestParts<AppState> for BuildAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Path(build_id) = Path::<BuildId>::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::bad_request("missing or malformed build id"))?;
        let build = state.metadata.get_build(&build_id).await?;

        if is_admin(parts, state) {
            return Ok(BuildAuth(build));
        }
        let token = header_str(parts, BUILD_TOKEN_HEADER)
            .ok_or_else(|| ApiError::unauthorized("missing X-Build-Token"))?;
        if BuildToken::from_stored(build.build_token.clone()).matches(token) {
            Ok(BuildAuth(build))
        } else {
            Err(ApiError::forbidden("build token does not match this build"))
        }
    }
}

/// The worker identified by a valid `X-Worker-Token` (§6 `poll`, result
/// upload, download certs).
pub struct WorkerAuth(pub Worker);

impl FromRequestParts<AppState> for WorkerAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = header_str(parts, WORKER_TOKEN_HEADER)
            .ok_or_else(|| ApiError::unauthorized("missing X-Worker-Token"))?;
        let worker = state
            .metadata
            .find_worker_by_token(token)
            .await?
            .ok_or_else(|| ApiError::unauthorized("unknown worker token"))?;
        Ok(WorkerAuth(worker))
    }
}

/// The build a VM's `X-VM-Token` is bound to (§6 certs-secure, telemetry,
/// stream logs). Rejects an expired token even if it's still on the row —
/// a VM is ephemeral and its token is meant to die with it.
pub struct VmAuth(pub Build);

impl FromRequestParts<AppState> for VmAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = header_str(parts, VM_TOKEN_HEADER)
            .ok_or_else(|| ApiError::unauthorized("missing X-VM-Token"))?;
        let build = state
            .metadata
            .find_build_by_vm_token(token)
            .await?
            .ok_or_else(|| ApiError::unauthorized("unknown VM token"))?;
        if build.vm_token_expires_at.is_none_or(|exp| chrono::Utc::now() >= exp) {
            return Err(ApiError::unauthorized("VM token expired"));
        }
        Ok(VmAuth(build))
    }
}

/// Either a worker that owns a build, or the VM spawned for it (§6
/// `download source`, `heartbeat`). Whichever matched, the caller gets the
/// build row; the dispatched worker id (for heartbeat's ownership check) is
/// derived from it.
pub enum WorkerOrVmAuth {
    Worker(Worker, Build),
    Vm(Build),
}

impl FromRequestParts<AppState> for WorkerOrVmAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if header_str(parts, VM_TOKEN_HEADER).is_some() {
            let VmAuth(build) = VmAuth::from_request_parts(parts, state).await?;
            return Ok(WorkerOrVmAuth::Vm(build));
        }
        let WorkerAuth(worker) = WorkerAuth::from_request_parts(parts, state).await?;
        let Path(build_id) = Path::<BuildId>::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::bad_request("missing or malformed build id"))?;
        let build = state.metadata.get_build(&build_id).await?;
        Ok(WorkerOrVmAuth::Worker(worker, build))
    }
}

impl WorkerOrVmAuth {
    pub fn build(&self) -> &Build {
        match self {
            WorkerOrVmAuth::Worker(_, build) => build,
            WorkerOrVmAuth::Vm(build) => build,
        }
    }

    /// The worker id to use for the Lifecycle Engine's ownership check —
    /// a VM heartbeats on behalf of the worker that spawned it.
    pub fn worker_id(&self) -> Option<WorkerId> {
        match self {
            WorkerOrVmAuth::Worker(w, _) => Some(w.id.clone()),
            WorkerOrVmAuth::Vm(build) => build.assigned_worker_id.clone().map(WorkerId::from_string),
        }
    }
}
