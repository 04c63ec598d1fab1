// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Submitter- and admin-facing build DTOs (§6 submit/status/logs/list/
//! cancel/retry).

use chrono::{DateTime, Utc};
use hangar_core::{BuildId, BuildStatus, Platform, WorkerId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmitResponse {
    pub id: BuildId,
    pub status: BuildStatus,
    pub submitted_at: DateTime<Utc>,
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusResponse {
    pub id: BuildId,
    pub status: BuildStatus,
    pub platform: Platform,
    pub worker_id: Option<WorkerId>,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEntryWire {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogsResponse {
    pub logs: Vec<LogEntryWire>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LogsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ListBuildsQuery {
    pub status: Option<String>,
    pub platform: Option<String>,
    pub worker_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuildSummary {
    pub id: BuildId,
    pub status: BuildStatus,
    pub platform: Platform,
    pub worker_id: Option<WorkerId>,
    pub submitted_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListBuildsResponse {
    pub builds: Vec<BuildSummary>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CancelResponse {
    pub status: BuildStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryResponse {
    pub id: BuildId,
    pub status: BuildStatus,
    pub access_token: String,
    pub original_build_id: BuildId,
}
