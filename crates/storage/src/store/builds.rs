// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use chrono::{DateTime, Utc};
use hangar_core::{Build, BuildId, BuildStatus, Platform, WorkerId};

use super::MetadataStore;
use crate::error::MetadataError;
use crate::rows::{status_to_str, BuildRow};
use crate::tx::Tx;

/// Optional filters for `list builds` (§6).
#[derive(Debug, Clone, Default)]
pub struct BuildFilter {
    pub status: Option<BuildStatus>,
    pub platform: Option<Platform>,
    pub worker_id: Option<WorkerId>,
}

/// Fields set alongside a status transition; `None` leaves the column
/// untouched.
#[derive(Debug, Default)]
pub struct BuildStatusUpdate<'a> {
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result_blob_path: Option<&'a str>,
    pub error_message: Option<&'a str>,
}

impl MetadataStore {
    pub async fn insert_build(&self, build: &Build) -> Result<(), MetadataError> {
        sqlx::query(
            "INSERT INTO builds (id, platform, status, source_blob_path, certs_blob_path, \
             build_token, submitted_at, retry_parent_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(build.id.as_str())
        .bind(build.platform.to_string())
        .bind(status_to_str(build.status))
        .bind(&build.source_blob_path)
        .bind(&build.certs_blob_path)
        .bind(&build.build_token)
        .bind(build.submitted_at)
        .bind(build.retry_parent_id.as_ref().map(|id| id.as_str()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_build(&self, id: &BuildId) -> Result<Build, MetadataError> {
        let row: Option<BuildRow> = sqlx::query_as("SELECT * FROM builds WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.ok_or_else(|| MetadataError::BuildNotFound(id.to_string()))?.into_domain()
    }

    pub async fn find_build_by_build_token(
        &self,
        token: &str,
    ) -> Result<Option<Build>, MetadataError> {
        let row: Option<BuildRow> = sqlx::query_as("SELECT * FROM builds WHERE build_token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        row.map(BuildRow::into_domain).transpose()
    }

    pub async fn find_build_by_vm_token(
        &self,
        token: &str,
    ) -> Result<Option<Build>, MetadataError> {
        let row: Option<BuildRow> = sqlx::query_as("SELECT * FROM builds WHERE vm_token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        row.map(BuildRow::into_domain).transpose()
    }

    /// Look up the build a presented OTP was minted for, ahead of the
    /// atomic consumption check in `consume_otp` (§6 `VM authenticate`
    /// only carries the OTP, not a build id). Matches on the currently
    /// active OTP regardless of expiry/consumption so a stale OTP still
    /// resolves to a build and fails `consume_otp` with `OtpConflict`
    /// rather than a plain not-found.
    pub async fn find_build_by_otp(&self, otp: &str) -> Result<Option<Build>, MetadataError> {
        let row: Option<BuildRow> = sqlx::query_as("SELECT * FROM builds WHERE otp = $1")
            .bind(otp)
            .fetch_optional(&self.pool)
            .await?;
        row.map(BuildRow::into_domain).transpose()
    }

    pub async fn list_builds(&self, filter: &BuildFilter) -> Result<Vec<Build>, MetadataError> {
        let status = filter.status.map(status_to_str);
        let platform = filter.platform.map(|p| p.to_string());
        let worker_id = filter.worker_id.as_ref().map(|w| w.as_str().to_string());
        let rows: Vec<BuildRow> = sqlx::query_as(
            "SELECT * FROM builds \
             WHERE ($1::text IS NULL OR status = $1) \
               AND ($2::text IS NULL OR platform = $2) \
               AND ($3::text IS NULL OR assigned_worker_id = $3) \
             ORDER BY submitted_at ASC, id ASC",
        )
        .bind(status)
        .bind(platform)
        .bind(worker_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(BuildRow::into_domain).collect()
    }

    /// All non-terminal builds, reconstructed into the dispatcher's
    /// in-memory queue cache on startup (§3 "Queue item").
    pub async fn list_pending(&self) -> Result<Vec<Build>, MetadataError> {
        let rows: Vec<BuildRow> =
            sqlx::query_as("SELECT * FROM builds WHERE status = 'pending' ORDER BY submitted_at ASC, id ASC")
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(BuildRow::into_domain).collect()
    }

    /// Builds whose last heartbeat is stale, or which never heartbeated
    /// past the grace period (§4.6).
    pub async fn list_stuck_builds(
        &self,
        heartbeat_cutoff: DateTime<Utc>,
        no_heartbeat_grace_cutoff: DateTime<Utc>,
    ) -> Result<Vec<Build>, MetadataError> {
        let rows: Vec<BuildRow> = sqlx::query_as(
            "SELECT * FROM builds \
             WHERE status IN ('assigned', 'building') \
               AND ( \
                 (last_heartbeat_at IS NULL AND started_at < $1) \
                 OR last_heartbeat_at < $2 \
               )",
        )
        .bind(no_heartbeat_grace_cutoff)
        .bind(heartbeat_cutoff)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(BuildRow::into_domain).collect()
    }

    /// Lock a build row for the duration of the transaction. Used by every
    /// status-changing operation (heartbeat, complete, fail, cancel,
    /// watchdog reclamation) so concurrent callers serialize on one row
    /// instead of racing (§5 invariant i, §4.6 concurrency note).
    pub async fn get_build_for_update(
        &self,
        tx: &mut Tx,
        id: &BuildId,
    ) -> Result<Build, MetadataError> {
        let row: Option<BuildRow> = sqlx::query_as("SELECT * FROM builds WHERE id = $1 FOR UPDATE")
            .bind(id.as_str())
            .fetch_optional(&mut tx.0)
            .await?;
        row.ok_or_else(|| MetadataError::BuildNotFound(id.to_string()))?.into_domain()
    }

    /// `select_oldest_pending_for_update` (§4.2): the one pending build
    /// with the oldest `submitted_at`, invisible to any concurrent caller
    /// running the same query (`SKIP LOCKED`), ties broken by id.
    pub async fn select_oldest_pending_for_update(
        &self,
        tx: &mut Tx,
    ) -> Result<Option<Build>, MetadataError> {
        let row: Option<BuildRow> = sqlx::query_as(
            "SELECT * FROM builds WHERE status = 'pending' \
             ORDER BY submitted_at ASC, id ASC \
             FOR UPDATE SKIP LOCKED LIMIT 1",
        )
        .fetch_optional(&mut tx.0)
        .await?;
        row.map(BuildRow::into_domain).transpose()
    }

    pub async fn update_build_status(
        &self,
        tx: &mut Tx,
        id: &BuildId,
        new_status: BuildStatus,
        extra: BuildStatusUpdate<'_>,
    ) -> Result<(), MetadataError> {
        sqlx::query(
            "UPDATE builds SET status = $2, \
             started_at = COALESCE($3, started_at), \
             completed_at = COALESCE($4, completed_at), \
             result_blob_path = COALESCE($5, result_blob_path), \
             error_message = COALESCE($6, error_message) \
             WHERE id = $1",
        )
        .bind(id.as_str())
        .bind(status_to_str(new_status))
        .bind(extra.started_at)
        .bind(extra.completed_at)
        .bind(extra.result_blob_path)
        .bind(extra.error_message)
        .execute(&mut tx.0)
        .await?;
        Ok(())
    }

    pub async fn assign_to_worker(
        &self,
        tx: &mut Tx,
        id: &BuildId,
        worker_id: &WorkerId,
        started_at: DateTime<Utc>,
        otp: &str,
        otp_expires_at: DateTime<Utc>,
    ) -> Result<(), MetadataError> {
        sqlx::query(
            "UPDATE builds SET status = 'assigned', assigned_worker_id = $2, started_at = $3, \
             otp = $4, otp_expires_at = $5, otp_consumed = FALSE WHERE id = $1",
        )
        .bind(id.as_str())
        .bind(worker_id.as_str())
        .bind(started_at)
        .bind(otp)
        .bind(otp_expires_at)
        .execute(&mut tx.0)
        .await?;
        Ok(())
    }

    /// Marks the OTP consumed and stores the minted VM token, but only if
    /// it was unconsumed and unexpired — returns `false` (no row updated)
    /// on double-consumption so the caller can surface Conflict (§4.3, §8).
    pub async fn consume_otp(
        &self,
        tx: &mut Tx,
        id: &BuildId,
        presented_otp: &str,
        now: DateTime<Utc>,
        vm_token: &str,
        vm_token_expires_at: DateTime<Utc>,
    ) -> Result<bool, MetadataError> {
        let result = sqlx::query(
            "UPDATE builds SET otp_consumed = TRUE, vm_token = $2, vm_token_expires_at = $3 \
             WHERE id = $1 AND otp = $4 AND otp_consumed = FALSE AND otp_expires_at > $5",
        )
        .bind(id.as_str())
        .bind(vm_token)
        .bind(vm_token_expires_at)
        .bind(presented_otp)
        .bind(now)
        .execute(&mut tx.0)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn record_heartbeat(&self, tx: &mut Tx, id: &BuildId, now: DateTime<Utc>) -> Result<(), MetadataError> {
        sqlx::query("UPDATE builds SET last_heartbeat_at = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(now)
            .execute(&mut tx.0)
            .await?;
        Ok(())
    }

    pub async fn insert_retry_link(
        &self,
        parent_id: &BuildId,
        child_id: &BuildId,
    ) -> Result<(), MetadataError> {
        sqlx::query("INSERT INTO retries (parent_id, child_id) VALUES ($1, $2)")
            .bind(parent_id.as_str())
            .bind(child_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
