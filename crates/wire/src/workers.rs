// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker-facing DTOs (§6 register/poll/heartbeat).

use chrono::{DateTime, Utc};
use hangar_core::{BuildId, Platform, WorkerId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterWorkerRequest {
    /// If present and already known, this is a re-registration (§9: counters
    /// persist, only `last_seen_at` is refreshed).
    pub id: Option<WorkerId>,
    pub name: String,
    #[serde(default)]
    pub capabilities: hangar_core::WorkerCapabilities,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RegisterWorkerResponse {
    pub id: WorkerId,
    pub status: &'static str,
}

/// The job handed back on a successful `poll` (§6).
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WorkerJobDescriptor {
    pub id: BuildId,
    pub platform: Platform,
    pub source_url: String,
    pub certs_url: Option<String>,
    pub otp: String,
    pub otp_expires_at: DateTime<Utc>,
}

/// `{job: null}` or `{job: {...}, access_token: <rotated>}` (§6 `poll`).
#[derive(Debug, Clone, Serialize, Default, PartialEq)]
pub struct PollResponse {
    pub job: Option<WorkerJobDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct HeartbeatQuery {
    pub worker_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct HeartbeatRequest {
    pub progress: Option<u32>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HeartbeatResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
}
