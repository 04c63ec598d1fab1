// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unauthenticated read-only surfaces: the public dashboard's stats feed
//! and the liveness probe (§6 `public stats`, `health`).

use axum::extract::State;
use axum::Json;
use hangar_wire::{HealthResponse, QueueHealth, StatsResponse};

use crate::error::ApiError;
use crate::state::AppState;

/// `public stats` (§6): the landing-page dashboard's sole data source; it
/// is an external, out-of-scope collaborator (§1) so only this wire shape
/// is owned here.
pub async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let today_start = chrono::Utc::now().date_naive().and_time(chrono::NaiveTime::MIN).and_utc();
    let stats = state.metadata.stats(today_start).await?;
    Ok(Json(StatsResponse {
        nodes_online: stats.nodes_online,
        builds_queued: stats.builds_queued,
        active_builds: stats.active_builds,
        builds_today: stats.builds_today,
        total_builds: stats.total_builds,
    }))
}

/// `health` (§6): live queue hints from the dispatcher's in-process cache,
/// not a database round trip — this is the cheap liveness probe.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        queue: QueueHealth { pending: state.dispatcher.pending_hint(), active: state.dispatcher.active_hint() },
    })
}
