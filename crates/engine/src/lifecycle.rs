// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Lifecycle Engine (§4.5): owns every `Build.status` transition —
//! submit, heartbeat, complete, fail, cancel, retry — plus secure cert
//! repackaging for the in-build VM. Every transition that changes status
//! commits inside one Metadata Store transaction before any caller-visible
//! side effect (dispatcher release, log line) fires.

use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::Stream;
use hangar_core::{
    Build, BuildId, BuildStatus, Clock, LogLevel, Platform, WorkerId, WorkerStatus,
};
use hangar_storage::{BuildStatusUpdate, MetadataStore};
use hangar_token::{BuildToken, VmTokenGrant};

use crate::certs::{self, CertsSecureBundle};
use crate::dispatcher::Dispatcher;
use crate::error::LifecycleError;
use hangar_blob::{BlobStore, Namespace};

/// A boxed chunk stream, the shape every streaming upload arrives in once
/// the HTTP layer has peeled off a multipart field. Parameterized over a
/// lifetime rather than fixed to `'static` so a caller can box a borrowing
/// stream — an `axum::extract::multipart::Field<'a>` ties its `Stream` impl
/// to the `Multipart` it borrows from — without first buffering it whole.
pub type ByteStream<'a> = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send + 'a>>;

/// Result of a successful `submit` or `retry`.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub build_id: BuildId,
    pub build_token: String,
    pub submitted_at: DateTime<Utc>,
}

/// Byte-size caps applied while streaming an upload (§4.1, §7 invariant i).
#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    pub max_source_bytes: u64,
    pub max_certs_bytes: u64,
    pub max_result_bytes: u64,
}

pub struct LifecycleEngine<C: Clock = hangar_core::SystemClock> {
    metadata: Arc<MetadataStore>,
    blob: Arc<BlobStore>,
    dispatcher: Arc<Dispatcher>,
    clock: C,
    limits: UploadLimits,
}

impl<C: Clock> LifecycleEngine<C> {
    pub fn new(
        metadata: Arc<MetadataStore>,
        blob: Arc<BlobStore>,
        dispatcher: Arc<Dispatcher>,
        clock: C,
        limits: UploadLimits,
    ) -> Self {
        Self { metadata, blob, dispatcher, clock, limits }
    }

    /// Stream `chunks` into `namespace` under `key`, enforcing the relevant
    /// upload limit as a running counter. Exposed so a caller juggling
    /// multiple multipart fields (the HTTP layer) can write each one to the
    /// blob store the instant it's encountered, rather than collecting all
    /// fields into memory before calling [`LifecycleEngine::finalize_submit`].
    pub async fn store_blob<'a>(
        &self,
        namespace: Namespace,
        key: &str,
        chunks: ByteStream<'a>,
        max_bytes: u64,
    ) -> Result<String, LifecycleError> {
        let outcome = self.blob.put(namespace, key, chunks, Some(max_bytes)).await?;
        Ok(outcome.path)
    }

    /// Best-effort cleanup of a blob already written by [`Self::store_blob`],
    /// used when a later field in the same upload fails (§7 invariant i: a
    /// submit that fails partway through leaves no partial blob behind).
    pub async fn discard_blob(&self, logical_path: &str) {
        let _ = self.blob.delete_logical(logical_path).await;
    }

    /// Insert the `pending` build row once its blobs are already written,
    /// and enqueue it. The counterpart to [`Self::store_blob`]: callers that
    /// stream each multipart field as it arrives call this once both blobs
    /// have landed, instead of going through [`Self::submit`].
    pub async fn finalize_submit(
        &self,
        id: BuildId,
        platform: Platform,
        source_blob_path: String,
        certs_blob_path: Option<String>,
    ) -> Result<SubmitOutcome, LifecycleError> {
        let now = self.clock.now();
        let build_token = BuildToken::generate();
        let build = Build {
            id: id.clone(),
            platform,
            status: BuildStatus::Pending,
            source_blob_path,
            certs_blob_path,
            result_blob_path: None,
            assigned_worker_id: None,
            build_token: build_token.reveal().to_string(),
            otp: None,
            otp_expires_at: None,
            otp_consumed: false,
            vm_token: None,
            vm_token_expires_at: None,
            submitted_at: now,
            started_at: None,
            completed_at: None,
            last_heartbeat_at: None,
            error_message: None,
            retry_parent_id: None,
        };

        self.metadata.insert_build(&build).await?;
        self.dispatcher.enqueue(&build.id);

        Ok(SubmitOutcome { build_id: id, build_token: build_token.reveal().to_string(), submitted_at: now })
    }

    /// Write the source (and optional certs) blob, insert a `pending` build
    /// row with a freshly minted build token, and enqueue it. A failure
    /// partway through leaves no partial blob behind (§7 invariant i).
    ///
    /// A convenience wrapper around [`Self::store_blob`] and
    /// [`Self::finalize_submit`] for callers that already hold both streams
    /// up front (tests, non-HTTP callers); the HTTP submit handler calls the
    /// two pieces directly so each multipart field streams to disk as it's
    /// read instead of being buffered whole first.
    pub async fn submit<'a>(
        &self,
        platform: Platform,
        source: ByteStream<'a>,
        certs: Option<ByteStream<'a>>,
    ) -> Result<SubmitOutcome, LifecycleError> {
        let id = BuildId::new();

        let source_path = self
            .store_blob(Namespace::Source, &format!("{}.zip", id.as_str()), source, self.limits.max_source_bytes)
            .await?;

        let certs_path = match certs {
            None => None,
            Some(certs_stream) => {
                match self.store_blob(Namespace::Certs, &format!("{}.zip", id.as_str()), certs_stream, self.limits.max_certs_bytes).await {
                    Ok(path) => Some(path),
                    Err(err) => {
                        self.discard_blob(&source_path).await;
                        return Err(err);
                    }
                }
            }
        };

        self.finalize_submit(id, platform, source_path, certs_path).await
    }

    /// Record a liveness signal from the assigned worker. The first
    /// heartbeat after a claim also flips `assigned` to `building` (§9:
    /// there's no separate "start building" call).
    pub async fn heartbeat(&self, build_id: &BuildId, worker_id: &WorkerId) -> Result<(), LifecycleError> {
        let now = self.clock.now();
        let mut tx = self.metadata.begin().await?;
        let build = self.metadata.get_build_for_update(&mut tx, build_id).await?;

        if build.status.is_terminal() {
            // The build finished (or was cancelled) by the time this
            // heartbeat arrived; nothing left to record.
            tx.commit().await?;
            return Ok(());
        }

        if build.assigned_worker_id.as_deref() != Some(worker_id.as_str()) {
            tx.commit().await?;
            return Err(LifecycleError::Forbidden);
        }

        self.metadata.record_heartbeat(&mut tx, build_id, now).await?;
        if build.status == BuildStatus::Assigned {
            self.metadata
                .update_build_status(&mut tx, build_id, BuildStatus::Building, BuildStatusUpdate::default())
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Append a progress note carried alongside a heartbeat. Never affects
    /// status (§4.5).
    pub async fn record_progress(&self, build_id: &BuildId, percent: u32) -> Result<(), LifecycleError> {
        let now = self.clock.now();
        self.metadata.append_log(build_id, now, LogLevel::Info, &format!("progress: {percent}%")).await?;
        Ok(())
    }

    /// Idempotent on an already-completed build; `InvalidTransition` if the
    /// build reached a different terminal state first.
    pub async fn complete<'a>(&self, build_id: &BuildId, result: ByteStream<'a>, ext: &str) -> Result<(), LifecycleError> {
        let existing = self.metadata.get_build(build_id).await?;
        if existing.status == BuildStatus::Completed {
            return Ok(());
        }
        if !existing.status.can_transition_to(BuildStatus::Completed) {
            return Err(LifecycleError::InvalidTransition("complete"));
        }

        // The blob write happens outside the transaction: if the commit
        // below never lands, the build stays `building` and the worker's
        // next complete attempt retries against the same result path (§5
        // invariant ii).
        let outcome =
            self.blob.put(Namespace::Results, &format!("{}.{ext}", build_id.as_str()), result, Some(self.limits.max_result_bytes)).await?;

        let now = self.clock.now();
        let mut tx = self.metadata.begin().await?;
        let build = self.metadata.get_build_for_update(&mut tx, build_id).await?;
        if build.status == BuildStatus::Completed {
            tx.commit().await?;
            return Ok(());
        }
        if !build.status.can_transition_to(BuildStatus::Completed) {
            tx.commit().await?;
            return Err(LifecycleError::InvalidTransition("complete"));
        }

        self.metadata
            .update_build_status(
                &mut tx,
                build_id,
                BuildStatus::Completed,
                BuildStatusUpdate { completed_at: Some(now), result_blob_path: Some(&outcome.path), ..Default::default() },
            )
            .await?;
        if let Some(worker_id) = &build.assigned_worker_id {
            self.metadata.increment_worker_completed(&mut tx, &WorkerId::from_string(worker_id.clone())).await?;
        }
        self.metadata.append_log_tx(&mut tx, build_id, now, LogLevel::Info, "completed").await?;
        tx.commit().await?;

        self.dispatcher.release(build_id, "completed");
        Ok(())
    }

    /// No-op on an already-terminal build (§4.6: the watchdog's fail is the
    /// ultimate backstop, and must be safe to call twice).
    pub async fn fail(&self, build_id: &BuildId, error_message: &str) -> Result<(), LifecycleError> {
        let now = self.clock.now();
        let mut tx = self.metadata.begin().await?;
        let build = self.metadata.get_build_for_update(&mut tx, build_id).await?;

        if build.status.is_terminal() {
            tx.commit().await?;
            return Ok(());
        }
        if !build.status.can_transition_to(BuildStatus::Failed) {
            tx.commit().await?;
            return Err(LifecycleError::InvalidTransition("fail"));
        }

        self.metadata
            .update_build_status(
                &mut tx,
                build_id,
                BuildStatus::Failed,
                BuildStatusUpdate { completed_at: Some(now), error_message: Some(error_message), ..Default::default() },
            )
            .await?;
        if let Some(worker_id) = &build.assigned_worker_id {
            self.metadata.increment_worker_failed(&mut tx, &WorkerId::from_string(worker_id.clone())).await?;
        }
        self.metadata.append_log_tx(&mut tx, build_id, now, LogLevel::Error, error_message).await?;
        tx.commit().await?;

        self.dispatcher.release(build_id, "failed");
        Ok(())
    }

    /// Accepted from `pending`, `assigned`, or `building`; releases the
    /// worker in the latter two. A second cancel of an already-cancelled
    /// build is a no-op; cancelling a build that reached a *different*
    /// terminal state fails with `InvalidTransition`.
    pub async fn cancel(&self, build_id: &BuildId) -> Result<(), LifecycleError> {
        let now = self.clock.now();
        let mut tx = self.metadata.begin().await?;
        let build = self.metadata.get_build_for_update(&mut tx, build_id).await?;

        if build.status == BuildStatus::Cancelled {
            tx.commit().await?;
            return Ok(());
        }
        if build.status.is_terminal() {
            tx.commit().await?;
            return Err(LifecycleError::InvalidTransition("cancel"));
        }

        let held_worker = build.assigned_worker_id.clone().filter(|_| build.status.holds_a_worker());

        self.metadata
            .update_build_status(
                &mut tx,
                build_id,
                BuildStatus::Cancelled,
                BuildStatusUpdate { completed_at: Some(now), ..Default::default() },
            )
            .await?;
        if let Some(worker_id) = held_worker {
            self.metadata.set_worker_status(&mut tx, &WorkerId::from_string(worker_id), WorkerStatus::Idle).await?;
        }
        self.metadata.append_log_tx(&mut tx, build_id, now, LogLevel::Info, "cancelled by submitter").await?;
        tx.commit().await?;

        self.dispatcher.release(build_id, "cancelled");
        Ok(())
    }

    /// Link a new `pending` build to its parent's blobs without re-upload.
    /// Fails with `SourceGone` if the parent's source (or certs) blob has
    /// since been garbage-collected (§9).
    pub async fn retry(&self, parent_id: &BuildId) -> Result<SubmitOutcome, LifecycleError> {
        let parent = self.metadata.get_build(parent_id).await?;

        if !self.blob.exists_logical(&parent.source_blob_path).await? {
            return Err(LifecycleError::SourceGone);
        }
        if let Some(certs_path) = &parent.certs_blob_path {
            if !self.blob.exists_logical(certs_path).await? {
                return Err(LifecycleError::SourceGone);
            }
        }

        let now = self.clock.now();
        let child_id = BuildId::new();
        let build_token = BuildToken::generate();
        let child = Build {
            id: child_id.clone(),
            platform: parent.platform,
            status: BuildStatus::Pending,
            source_blob_path: parent.source_blob_path.clone(),
            certs_blob_path: parent.certs_blob_path.clone(),
            result_blob_path: None,
            assigned_worker_id: None,
            build_token: build_token.reveal().to_string(),
            otp: None,
            otp_expires_at: None,
            otp_consumed: false,
            vm_token: None,
            vm_token_expires_at: None,
            submitted_at: now,
            started_at: None,
            completed_at: None,
            last_heartbeat_at: None,
            error_message: None,
            retry_parent_id: Some(parent_id.clone()),
        };

        self.metadata.insert_build(&child).await?;
        self.metadata.insert_retry_link(parent_id, &child_id).await?;
        self.dispatcher.enqueue(&child_id);

        Ok(SubmitOutcome { build_id: child_id, build_token: build_token.reveal().to_string(), submitted_at: now })
    }

    /// Exchange a one-time OTP for a VM token. Consumption is atomic
    /// (§4.3); a stale or already-used OTP fails with `OtpConflict`.
    pub async fn authenticate_vm(&self, build_id: &BuildId, presented_otp: &str, vm_token_ttl: chrono::Duration) -> Result<String, LifecycleError> {
        let now = self.clock.now();
        let grant = VmTokenGrant::new(vm_token_ttl, now);

        let mut tx = self.metadata.begin().await?;
        let consumed = self
            .metadata
            .consume_otp(&mut tx, build_id, presented_otp, now, grant.token.reveal(), grant.expires_at)
            .await?;
        if !consumed {
            tx.commit().await?;
            return Err(LifecycleError::OtpConflict);
        }
        tx.commit().await?;
        Ok(grant.token.reveal().to_string())
    }

    /// Reads the attached cert zip, parses it, and mints a fresh keychain
    /// password. The blob is read before any Metadata Store transaction
    /// opens (§5: cert repackaging touches the blob store first).
    pub async fn certs_secure_bundle(&self, build_id: &BuildId) -> Result<CertsSecureBundle, LifecycleError> {
        let build = self.metadata.get_build(build_id).await?;
        let certs_path = build.certs_blob_path.as_deref().ok_or(LifecycleError::SourceGone)?;
        let bytes = self.blob.get_logical(certs_path).await?;
        let parsed = certs::parse_cert_zip(&bytes)?;
        Ok(certs::build_secure_bundle(&parsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use hangar_core::FakeClock;
    use sqlx::PgPool;

    fn chunks(parts: &[&str]) -> ByteStream<'static> {
        Box::pin(stream::iter(parts.iter().map(|p| Ok(Bytes::copy_from_slice(p.as_bytes()))).collect::<Vec<_>>()))
    }

    fn harness(pool: PgPool) -> (LifecycleEngine<FakeClock>, tempfile::TempDir) {
        let metadata = Arc::new(MetadataStore::from_pool(pool));
        let dir = tempfile::tempdir().unwrap();
        let blob = Arc::new(BlobStore::new(dir.path()));
        let dispatcher = Arc::new(Dispatcher::new(metadata.clone(), chrono::Duration::minutes(15)));
        let clock = FakeClock::new(Utc::now());
        let limits = UploadLimits { max_source_bytes: 1_000_000, max_certs_bytes: 1_000_000, max_result_bytes: 1_000_000 };
        (LifecycleEngine::new(metadata, blob, dispatcher, clock, limits), dir)
    }

    #[sqlx::test(migrations = "../storage/migrations")]
    async fn submit_then_cancel_releases_nothing_assigned(pool: PgPool) {
        let (engine, _dir) = harness(pool);
        let outcome = engine.submit(Platform::Ios, chunks(&["source-bytes"]), None).await.unwrap();
        engine.cancel(&outcome.build_id).await.unwrap();

        let build = engine.metadata.get_build(&outcome.build_id).await.unwrap();
        assert_eq!(build.status, BuildStatus::Cancelled);
    }

    #[sqlx::test(migrations = "../storage/migrations")]
    async fn cancel_is_idempotent_but_errors_after_a_different_terminal_state(pool: PgPool) {
        let (engine, _dir) = harness(pool);
        let outcome = engine.submit(Platform::Android, chunks(&["source-bytes"]), None).await.unwrap();
        engine.fail(&outcome.build_id, "boom").await.unwrap();

        let err = engine.cancel(&outcome.build_id).await.unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition("cancel")));
    }

    #[sqlx::test(migrations = "../storage/migrations")]
    async fn fail_on_an_already_failed_build_is_a_no_op(pool: PgPool) {
        let (engine, _dir) = harness(pool);
        let outcome = engine.submit(Platform::Ios, chunks(&["source-bytes"]), None).await.unwrap();
        engine.fail(&outcome.build_id, "first").await.unwrap();
        engine.fail(&outcome.build_id, "second").await.unwrap();

        let build = engine.metadata.get_build(&outcome.build_id).await.unwrap();
        assert_eq!(build.error_message.as_deref(), Some("first"));
    }

    #[sqlx::test(migrations = "../storage/migrations")]
    async fn heartbeat_from_a_worker_that_does_not_own_the_build_is_forbidden(pool: PgPool) {
        let (engine, _dir) = harness(pool);
        let outcome = engine.submit(Platform::Ios, chunks(&["source-bytes"]), None).await.unwrap();
        let worker_id = WorkerId::new();

        let err = engine.heartbeat(&outcome.build_id, &worker_id).await.unwrap_err();
        assert!(matches!(err, LifecycleError::Forbidden));
    }

    #[sqlx::test(migrations = "../storage/migrations")]
    async fn retry_fails_with_source_gone_once_the_parent_blob_is_deleted(pool: PgPool) {
        let (engine, _dir) = harness(pool);
        let outcome = engine.submit(Platform::Ios, chunks(&["source-bytes"]), None).await.unwrap();
        let parent = engine.metadata.get_build(&outcome.build_id).await.unwrap();
        engine.blob.delete_logical(&parent.source_blob_path).await.unwrap();

        let err = engine.retry(&outcome.build_id).await.unwrap_err();
        assert!(matches!(err, LifecycleError::SourceGone));
    }

    #[sqlx::test(migrations = "../storage/migrations")]
    async fn retry_links_the_child_to_the_parent_without_reuploading(pool: PgPool) {
        let (engine, _dir) = harness(pool);
        let outcome = engine.submit(Platform::Android, chunks(&["source-bytes"]), None).await.unwrap();
        let child = engine.retry(&outcome.build_id).await.unwrap();

        let child_build = engine.metadata.get_build(&child.build_id).await.unwrap();
        assert_eq!(child_build.retry_parent_id, Some(outcome.build_id));
        assert_eq!(child_build.status, BuildStatus::Pending);
    }
}
