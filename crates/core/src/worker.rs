// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker identifier and record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a registered worker.
    pub struct WorkerId("wkr_");
}

/// Capability record a worker registers with (e.g. platforms it can build).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerCapabilities {
    pub platforms: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    Idle,
    Building,
    Offline,
}

crate::simple_display! {
    WorkerStatus {
        Idle => "idle",
        Building => "building",
        Offline => "offline",
    }
}

/// A registered worker. Mutated by the Dispatcher (status transitions) and
/// the Lifecycle Engine (counter increments on completion/failure).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub id: WorkerId,
    pub name: String,
    /// PII-free display name surfaced on the public dashboard.
    pub public_identifier: String,
    pub capabilities: WorkerCapabilities,
    pub status: WorkerStatus,
    pub completed_count: u64,
    pub failed_count: u64,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,

    /// Current worker credential; rotated by the Dispatcher on every poll
    /// so a leaked token has a short useful life (§4.3, §9).
    pub worker_token: String,
}
