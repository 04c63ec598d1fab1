// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The HTTP surface (§6) atop the six components: one `axum::Router` built
//! from the composition root's `AppState`. Handlers stay thin — parsing
//! and authorization live in `hangar_wire`/`crate::auth`, all business
//! logic lives in `hangar_engine`.

pub mod builds;
pub mod monitoring;
pub mod vm;
pub mod workers;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderName;
use axum::routing::{get, post};
use axum::Router;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::state::AppState;

const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn router(state: AppState) -> Router {
    let request_id_header = HeaderName::from_static(REQUEST_ID_HEADER);
    Router::new()
        .route("/api/builds", post(builds::submit).get(builds::list))
        .route("/api/builds/:id", get(builds::status))
        .route("/api/builds/:id/logs", get(builds::logs))
        .route("/api/builds/:id/artifact", get(builds::artifact))
        .route("/api/builds/:id/cancel", post(builds::cancel))
        .route("/api/builds/:id/retry", post(builds::retry))
        .route("/api/builds/:id/source", get(workers::download_source))
        .route("/api/builds/:id/certs", get(workers::download_certs))
        .route("/api/builds/:id/heartbeat", post(workers::heartbeat))
        .route("/api/builds/:id/certs-secure", get(vm::certs_secure))
        .route("/api/builds/:id/telemetry", post(vm::telemetry))
        .route("/api/builds/:id/logs-stream", post(vm::stream_logs))
        .route("/api/workers", post(workers::register))
        .route("/api/workers/poll", get(workers::poll))
        .route("/api/workers/results", post(workers::upload_result))
        .route("/api/vm/authenticate", post(vm::authenticate))
        .route("/api/stats", get(monitoring::stats))
        .route("/health", get(monitoring::health))
        .layer(DefaultBodyLimit::max(4 * 1024 * 1024 * 1024))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .with_state(state)
}
