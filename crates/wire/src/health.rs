// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `health` (§6): live, not cached — backed by the dispatcher's queue hints.

use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct QueueHealth {
    pub pending: i64,
    pub active: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HealthResponse {
    pub status: &'static str,
    pub queue: QueueHealth,
}
