// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `public stats` (§6): a read-only consumer is the landing-page dashboard,
//! explicitly out of scope (§1) — only its wire shape lives here.

use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct StatsResponse {
    pub nodes_online: i64,
    pub builds_queued: i64,
    pub active_builds: i64,
    pub builds_today: i64,
    pub total_builds: i64,
}
