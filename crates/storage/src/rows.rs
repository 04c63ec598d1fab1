// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Row <-> domain-type mapping. The Metadata Store is the only place that
//! knows builds/workers are rows; everyone else deals in `hangar_core`
//! types.

use chrono::{DateTime, Utc};
use hangar_core::{
    Build, BuildId, BuildStatus, Platform, Worker, WorkerCapabilities, WorkerId, WorkerStatus,
};

use crate::error::MetadataError;

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct BuildRow {
    pub id: String,
    pub platform: String,
    pub status: String,
    pub source_blob_path: String,
    pub certs_blob_path: Option<String>,
    pub result_blob_path: Option<String>,
    pub assigned_worker_id: Option<String>,
    pub build_token: String,
    pub otp: Option<String>,
    pub otp_expires_at: Option<DateTime<Utc>>,
    pub otp_consumed: bool,
    pub vm_token: Option<String>,
    pub vm_token_expires_at: Option<DateTime<Utc>>,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub retry_parent_id: Option<String>,
}

pub(crate) fn status_to_str(status: BuildStatus) -> &'static str {
    match status {
        BuildStatus::Pending => "pending",
        BuildStatus::Assigned => "assigned",
        BuildStatus::Building => "building",
        BuildStatus::Completed => "completed",
        BuildStatus::Failed => "failed",
        BuildStatus::Cancelled => "cancelled",
    }
}

fn status_from_str(s: &str) -> Result<BuildStatus, MetadataError> {
    Ok(match s {
        "pending" => BuildStatus::Pending,
        "assigned" => BuildStatus::Assigned,
        "building" => BuildStatus::Building,
        "completed" => BuildStatus::Completed,
        "failed" => BuildStatus::Failed,
        "cancelled" => BuildStatus::Cancelled,
        other => return Err(MetadataError::CorruptRow(format!("unknown build status '{other}'"))),
    })
}

pub(crate) fn worker_status_to_str(status: WorkerStatus) -> &'static str {
    match status {
        WorkerStatus::Idle => "idle",
        WorkerStatus::Building => "building",
        WorkerStatus::Offline => "offline",
    }
}

fn worker_status_from_str(s: &str) -> Result<WorkerStatus, MetadataError> {
    Ok(match s {
        "idle" => WorkerStatus::Idle,
        "building" => WorkerStatus::Building,
        "offline" => WorkerStatus::Offline,
        other => {
            return Err(MetadataError::CorruptRow(format!("unknown worker status '{other}'")))
        }
    })
}

impl BuildRow {
    pub(crate) fn into_domain(self) -> Result<Build, MetadataError> {
        let platform = self
            .platform
            .parse::<Platform>()
            .map_err(|e| MetadataError::CorruptRow(e.to_string()))?;
        Ok(Build {
            id: BuildId::from_string(self.id),
            platform,
            status: status_from_str(&self.status)?,
            source_blob_path: self.source_blob_path,
            certs_blob_path: self.certs_blob_path,
            result_blob_path: self.result_blob_path,
            assigned_worker_id: self.assigned_worker_id,
            build_token: self.build_token,
            otp: self.otp,
            otp_expires_at: self.otp_expires_at,
            otp_consumed: self.otp_consumed,
            vm_token: self.vm_token,
            vm_token_expires_at: self.vm_token_expires_at,
            submitted_at: self.submitted_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            last_heartbeat_at: self.last_heartbeat_at,
            error_message: self.error_message,
            retry_parent_id: self.retry_parent_id.map(BuildId::from_string),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct WorkerRow {
    pub id: String,
    pub name: String,
    pub public_identifier: String,
    pub capabilities: serde_json::Value,
    pub status: String,
    pub completed_count: i64,
    pub failed_count: i64,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub worker_token: String,
}

impl WorkerRow {
    pub(crate) fn into_domain(self) -> Result<Worker, MetadataError> {
        let capabilities: WorkerCapabilities = serde_json::from_value(self.capabilities)
            .map_err(|e| MetadataError::CorruptRow(e.to_string()))?;
        Ok(Worker {
            id: WorkerId::from_string(self.id),
            name: self.name,
            public_identifier: self.public_identifier,
            capabilities,
            status: worker_status_from_str(&self.status)?,
            completed_count: self.completed_count.max(0) as u64,
            failed_count: self.failed_count.max(0) as u64,
            first_seen_at: self.first_seen_at,
            last_seen_at: self.last_seen_at,
            worker_token: self.worker_token,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct BuildLogRow {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub message: String,
}

impl BuildLogRow {
    pub(crate) fn into_domain(self) -> Result<hangar_core::BuildLogEntry, MetadataError> {
        let level = match self.level.as_str() {
            "info" => hangar_core::LogLevel::Info,
            "warn" => hangar_core::LogLevel::Warn,
            "error" => hangar_core::LogLevel::Error,
            other => {
                return Err(MetadataError::CorruptRow(format!("unknown log level '{other}'")))
            }
        };
        Ok(hangar_core::BuildLogEntry { timestamp: self.timestamp, level, message: self.message })
    }
}

pub(crate) fn log_level_to_str(level: hangar_core::LogLevel) -> &'static str {
    match level {
        hangar_core::LogLevel::Info => "info",
        hangar_core::LogLevel::Warn => "warn",
        hangar_core::LogLevel::Error => "error",
    }
}
