// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `hangard` — the controller daemon: one composition root that wires the
//! Metadata Store, Blob Store, Job Dispatcher, Lifecycle Engine, and
//! Liveness Watchdog into an `axum::Router`, then serves it (§4, §6).

mod auth;
mod config;
mod error;
mod routes;
mod state;

use std::sync::Arc;

use hangar_blob::BlobStore;
use hangar_core::SystemClock;
use hangar_engine::{Dispatcher, LifecycleEngine, Watchdog};
use hangar_storage::MetadataStore;
use hangar_token::AdminKey;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::HangarConfig;
use crate::state::AppState;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,hangar_daemon=debug".into()),
        )
        .init();

    let config = HangarConfig::load()?;

    let metadata = Arc::new(MetadataStore::connect(&config.database.url, config.database.max_connections).await?);
    metadata.migrate().await?;
    tracing::info!(bind = %config.bind, "metadata store ready");

    let blob = Arc::new(BlobStore::new(&config.blob.root));

    let otp_ttl = chrono::Duration::seconds(config.token.otp_ttl_secs);
    let vm_token_ttl = chrono::Duration::seconds(config.token.vm_token_ttl_secs);

    let dispatcher = Arc::new(Dispatcher::new(metadata.clone(), otp_ttl));
    dispatcher.rebuild_cache().await?;

    let upload_limits = config.upload_limits.to_bytes();
    let lifecycle = Arc::new(LifecycleEngine::new(metadata.clone(), blob.clone(), dispatcher.clone(), SystemClock, upload_limits));

    let watchdog = Watchdog::new(metadata.clone(), lifecycle.clone(), SystemClock, config.watchdog.to_engine_config());
    tokio::spawn(async move { watchdog.run().await });

    let admin_key = AdminKey::from_stored(config.token.admin_api_key.clone());
    let bind = config.bind;
    let state =
        AppState { metadata, blob, dispatcher, lifecycle, admin_key, otp_ttl, vm_token_ttl, upload_limits, config: Arc::new(config) };

    let router = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = TcpListener::bind(bind).await?;
    tracing::info!(%bind, "hangard listening");
    axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

/// Waits for SIGINT or (on unix) SIGTERM so in-flight requests drain before
/// the process exits instead of being cut off mid-response.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(%err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received, draining in-flight requests");
}
