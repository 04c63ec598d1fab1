// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Job Dispatcher (§4.4): hands out the next pending build to a
//! polling worker at most once, strictly FIFO, race-free under concurrent
//! pollers via `SELECT ... FOR UPDATE SKIP LOCKED`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use hangar_core::{BuildId, BuildStatus, LogLevel, Platform, WorkerId, WorkerStatus};
use hangar_storage::MetadataStore;
use hangar_token::Otp;

use crate::error::DispatchError;
use crate::queue::PendingQueue;

/// A job descriptor handed to a worker on a successful claim (§6 `poll`).
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub build_id: BuildId,
    pub platform: Platform,
    pub otp: String,
    pub otp_expires_at: DateTime<Utc>,
    pub has_certs: bool,
}

pub struct Dispatcher {
    metadata: Arc<MetadataStore>,
    queue: PendingQueue,
    otp_ttl: chrono::Duration,
}

impl Dispatcher {
    pub fn new(metadata: Arc<MetadataStore>, otp_ttl: chrono::Duration) -> Self {
        Self { metadata, queue: PendingQueue::new(), otp_ttl }
    }

    /// Reconstruct the in-memory queue cache from the Metadata Store. Run
    /// once at startup so the cache reflects rows that were already
    /// pending/assigned/building before this process started (§3).
    pub async fn rebuild_cache(&self) -> Result<(), DispatchError> {
        let pending = self.metadata.list_pending().await?.len() as i64;
        let active = self
            .metadata
            .list_builds(&hangar_storage::BuildFilter {
                status: Some(BuildStatus::Building),
                platform: None,
                worker_id: None,
            })
            .await?
            .len() as i64
            + self
                .metadata
                .list_builds(&hangar_storage::BuildFilter {
                    status: Some(BuildStatus::Assigned),
                    platform: None,
                    worker_id: None,
                })
                .await?
                .len() as i64;
        self.queue.rehydrate(pending, active);
        Ok(())
    }

    /// Called by the Lifecycle Engine immediately after a submission
    /// commits. The build row is already `pending` in the Metadata Store;
    /// this only notifies long-poll waiters and bumps the cache hint.
    pub fn enqueue(&self, _build_id: &BuildId) {
        self.queue.mark_enqueued();
    }

    /// Called on terminal states or cancellation to keep the active-set
    /// hint accurate.
    pub fn release(&self, _build_id: &BuildId, _reason: &str) {
        self.queue.mark_released();
    }

    pub async fn wait_for_work(&self) {
        self.queue.notified().await;
    }

    pub fn pending_hint(&self) -> i64 {
        self.queue.pending_hint()
    }

    pub fn active_hint(&self) -> i64 {
        self.queue.active_hint()
    }

    /// Claim algorithm (§4.4): one Metadata Store transaction, strict FIFO,
    /// `SKIP LOCKED` semantics. Returns `None` if the worker already owns a
    /// build or there's nothing pending.
    pub async fn claim(
        &self,
        worker_id: &WorkerId,
        now: DateTime<Utc>,
    ) -> Result<Option<ClaimedJob>, DispatchError> {
        let mut tx = self.metadata.begin().await?;

        // Step 1: the existing assignment takes priority.
        let worker = match self.metadata.lock_idle_worker(&mut tx, worker_id).await? {
            Some(w) => w,
            None => {
                tx.commit().await?;
                return Ok(None);
            }
        };

        // Step 2.
        let build = match self.metadata.select_oldest_pending_for_update(&mut tx).await? {
            Some(b) => b,
            None => {
                tx.commit().await?;
                return Ok(None);
            }
        };

        // Step 3.
        let otp = Otp::generate();
        let otp_expires_at = now + self.otp_ttl;
        self.metadata
            .assign_to_worker(&mut tx, &build.id, worker_id, now, otp.reveal(), otp_expires_at)
            .await?;
        self.metadata.set_worker_status(&mut tx, worker_id, WorkerStatus::Building).await?;

        // Step 4.
        self.metadata
            .append_log_tx(
                &mut tx,
                &build.id,
                now,
                LogLevel::Info,
                &format!("assigned to worker {}", worker.name),
            )
            .await?;

        // Step 5: commit — the claim is now durable.
        tx.commit().await?;

        self.queue.mark_claimed();

        Ok(Some(ClaimedJob {
            build_id: build.id,
            platform: build.platform,
            otp: otp.reveal().to_string(),
            otp_expires_at,
            has_certs: build.certs_blob_path.is_some(),
        }))
    }
}
