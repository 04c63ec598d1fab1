// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Liveness Watchdog (§4.6): the ultimate backstop against a worker or
//! VM that silently dies. Runs on a fixed interval, reclaims any build that
//! has gone stale, and never trusts a worker's self-report over its own
//! clock.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use hangar_core::Clock;
use hangar_storage::MetadataStore;

use crate::error::LifecycleError;
use crate::lifecycle::LifecycleEngine;

#[derive(Debug, Clone, Copy)]
pub struct WatchdogConfig {
    /// How often `run_once` fires.
    pub poll_interval: StdDuration,
    /// A build heartbeating less recently than this is stale.
    pub heartbeat_timeout: Duration,
    /// A build that has never heartbeated is only stale once it has been
    /// `assigned`/`building` longer than this grace period (§4.6 scenario
    /// 3: a slow VM boot shouldn't be reclaimed immediately).
    pub no_heartbeat_grace: Duration,
}

pub struct Watchdog<C: Clock> {
    metadata: Arc<MetadataStore>,
    lifecycle: Arc<LifecycleEngine<C>>,
    clock: C,
    config: WatchdogConfig,
}

impl<C: Clock + Clone> Watchdog<C> {
    pub fn new(metadata: Arc<MetadataStore>, lifecycle: Arc<LifecycleEngine<C>>, clock: C, config: WatchdogConfig) -> Self {
        Self { metadata, lifecycle, clock, config }
    }

    /// One reclamation pass. Returns the number of builds failed.
    pub async fn run_once(&self) -> Result<usize, LifecycleError> {
        let now = self.clock.now();
        let heartbeat_cutoff = now - self.config.heartbeat_timeout;
        let grace_cutoff = now - self.config.no_heartbeat_grace;

        let stuck = self.metadata.list_stuck_builds(heartbeat_cutoff, grace_cutoff).await?;
        let mut reclaimed = 0;
        for build in stuck {
            match self.lifecycle.fail(&build.id, "stuck: no heartbeat within grace period").await {
                Ok(()) => {
                    reclaimed += 1;
                    tracing::warn!(build_id = %build.id, "watchdog reclaimed stuck build");
                }
                Err(err) => {
                    // fail() is its own no-op on a terminal build; any other
                    // error here is transient (db hiccup) and retried on the
                    // next pass.
                    tracing::error!(build_id = %build.id, error = %err, "watchdog failed to reclaim build");
                }
            }
        }
        Ok(reclaimed)
    }

    /// Runs `run_once` forever on `poll_interval`. Intended to be spawned
    /// as a background task at process startup.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        loop {
            ticker.tick().await;
            if let Err(err) = self.run_once().await {
                tracing::error!(error = %err, "watchdog pass failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hangar_blob::BlobStore;
    use hangar_core::{Build, BuildId, BuildStatus, FakeClock, Platform};
    use hangar_storage::MetadataStore as Store;
    use sqlx::PgPool;

    use crate::dispatcher::Dispatcher;
    use crate::lifecycle::UploadLimits;

    fn sample_assigned_build(id: &str, started_at: chrono::DateTime<chrono::Utc>) -> Build {
        Build {
            id: BuildId::from_string(id),
            platform: Platform::Ios,
            status: BuildStatus::Assigned,
            source_blob_path: format!("source/{id}.zip"),
            certs_blob_path: None,
            result_blob_path: None,
            assigned_worker_id: Some("wkr_stub".to_string()),
            build_token: format!("tok_{id}"),
            otp: None,
            otp_expires_at: None,
            otp_consumed: false,
            vm_token: None,
            vm_token_expires_at: None,
            submitted_at: started_at,
            started_at: Some(started_at),
            completed_at: None,
            last_heartbeat_at: None,
            error_message: None,
            retry_parent_id: None,
        }
    }

    #[sqlx::test(migrations = "../storage/migrations")]
    async fn reclaims_a_build_that_never_heartbeated_past_grace(pool: PgPool) {
        let metadata = Arc::new(Store::from_pool(pool));
        let now = chrono::Utc::now();
        let build = sample_assigned_build("bld_stuck", now - chrono::Duration::minutes(10));
        metadata.insert_build(&build).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let blob = Arc::new(BlobStore::new(dir.path()));
        let dispatcher = Arc::new(Dispatcher::new(metadata.clone(), chrono::Duration::minutes(15)));
        let clock = FakeClock::new(now);
        let limits = UploadLimits { max_source_bytes: 1, max_certs_bytes: 1, max_result_bytes: 1 };
        let lifecycle = Arc::new(LifecycleEngine::new(metadata.clone(), blob, dispatcher, clock.clone(), limits));

        let config = WatchdogConfig {
            poll_interval: StdDuration::from_secs(30),
            heartbeat_timeout: chrono::Duration::minutes(2),
            no_heartbeat_grace: chrono::Duration::minutes(5),
        };
        let watchdog = Watchdog::new(metadata.clone(), lifecycle, clock, config);

        let reclaimed = watchdog.run_once().await.unwrap();
        assert_eq!(reclaimed, 1);

        let reloaded = metadata.get_build(&build.id).await.unwrap();
        assert_eq!(reloaded.status, BuildStatus::Failed);
        assert!(reloaded.error_message.unwrap().contains("stuck"));
    }

    #[sqlx::test(migrations = "../storage/migrations")]
    async fn a_build_still_inside_the_grace_period_is_left_alone(pool: PgPool) {
        let metadata = Arc::new(Store::from_pool(pool));
        let now = chrono::Utc::now();
        let build = sample_assigned_build("bld_fresh", now - chrono::Duration::seconds(30));
        metadata.insert_build(&build).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let blob = Arc::new(BlobStore::new(dir.path()));
        let dispatcher = Arc::new(Dispatcher::new(metadata.clone(), chrono::Duration::minutes(15)));
        let clock = FakeClock::new(now);
        let limits = UploadLimits { max_source_bytes: 1, max_certs_bytes: 1, max_result_bytes: 1 };
        let lifecycle = Arc::new(LifecycleEngine::new(metadata.clone(), blob, dispatcher, clock.clone(), limits));

        let config = WatchdogConfig {
            poll_interval: StdDuration::from_secs(30),
            heartbeat_timeout: chrono::Duration::minutes(2),
            no_heartbeat_grace: chrono::Duration::minutes(5),
        };
        let watchdog = Watchdog::new(metadata.clone(), lifecycle, clock, config);

        let reclaimed = watchdog.run_once().await.unwrap();
        assert_eq!(reclaimed, 0);

        let reloaded = metadata.get_build(&build.id).await.unwrap();
        assert_eq!(reloaded.status, BuildStatus::Assigned);
    }
}
