// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use chrono::{DateTime, Utc};
use hangar_core::{Worker, WorkerCapabilities, WorkerId, WorkerStatus};
use sqlx::Row;

use super::MetadataStore;
use crate::error::MetadataError;
use crate::rows::{worker_status_to_str, WorkerRow};
use crate::tx::Tx;

impl MetadataStore {
    pub async fn get_worker(&self, id: &WorkerId) -> Result<Worker, MetadataError> {
        let row: Option<WorkerRow> = sqlx::query_as("SELECT * FROM workers WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.ok_or_else(|| MetadataError::WorkerNotFound(id.to_string()))?.into_domain()
    }

    pub async fn find_worker_by_token(&self, token: &str) -> Result<Option<Worker>, MetadataError> {
        let row: Option<WorkerRow> = sqlx::query_as("SELECT * FROM workers WHERE worker_token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        row.map(WorkerRow::into_domain).transpose()
    }

    pub async fn list_workers(&self) -> Result<Vec<Worker>, MetadataError> {
        let rows: Vec<WorkerRow> =
            sqlx::query_as("SELECT * FROM workers ORDER BY first_seen_at ASC").fetch_all(&self.pool).await?;
        rows.into_iter().map(WorkerRow::into_domain).collect()
    }

    /// Register or re-register a worker (§4.5/§9: re-registration with a
    /// known id refreshes `last_seen_at` only — counters persist).
    pub async fn upsert_worker(
        &self,
        id: &WorkerId,
        name: &str,
        public_identifier: &str,
        capabilities: &WorkerCapabilities,
        now: DateTime<Utc>,
        worker_token: &str,
    ) -> Result<bool, MetadataError> {
        let caps = serde_json::to_value(capabilities)
            .map_err(|e| MetadataError::CorruptRow(e.to_string()))?;
        let result = sqlx::query(
            "INSERT INTO workers (id, name, public_identifier, capabilities, status, \
             first_seen_at, last_seen_at, worker_token) \
             VALUES ($1, $2, $3, $4, 'idle', $5, $5, $6) \
             ON CONFLICT (id) DO UPDATE SET \
               name = EXCLUDED.name, \
               public_identifier = EXCLUDED.public_identifier, \
               capabilities = EXCLUDED.capabilities, \
               last_seen_at = EXCLUDED.last_seen_at \
             RETURNING (xmax = 0) AS inserted",
        )
        .bind(id.as_str())
        .bind(name)
        .bind(public_identifier)
        .bind(caps)
        .bind(now)
        .bind(worker_token)
        .fetch_one(&self.pool)
        .await?;
        Ok(result.get::<bool, _>("inserted"))
    }

    pub async fn set_worker_status(
        &self,
        tx: &mut Tx,
        id: &WorkerId,
        status: WorkerStatus,
    ) -> Result<(), MetadataError> {
        sqlx::query("UPDATE workers SET status = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(worker_status_to_str(status))
            .execute(&mut tx.0)
            .await?;
        Ok(())
    }

    /// Check-and-lock a worker row for the claim transaction: returns the
    /// worker only if it exists and isn't already `building` (§4.4 step 1 —
    /// "the existing assignment takes priority").
    pub async fn lock_idle_worker(
        &self,
        tx: &mut Tx,
        id: &WorkerId,
    ) -> Result<Option<Worker>, MetadataError> {
        let row: Option<WorkerRow> = sqlx::query_as(
            "SELECT * FROM workers WHERE id = $1 AND status != 'building' FOR UPDATE",
        )
        .bind(id.as_str())
        .fetch_optional(&mut tx.0)
        .await?;
        row.map(WorkerRow::into_domain).transpose()
    }

    /// Rotate the worker's credential; the caller persists the new value
    /// and invalidates the old one in the same statement (§4.3).
    pub async fn rotate_worker_token(
        &self,
        id: &WorkerId,
        new_token: &str,
        now: DateTime<Utc>,
    ) -> Result<(), MetadataError> {
        sqlx::query("UPDATE workers SET worker_token = $2, last_seen_at = $3 WHERE id = $1")
            .bind(id.as_str())
            .bind(new_token)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn increment_worker_completed(&self, tx: &mut Tx, id: &WorkerId) -> Result<(), MetadataError> {
        sqlx::query("UPDATE workers SET completed_count = completed_count + 1, status = 'idle' WHERE id = $1")
            .bind(id.as_str())
            .execute(&mut tx.0)
            .await?;
        Ok(())
    }

    pub async fn increment_worker_failed(&self, tx: &mut Tx, id: &WorkerId) -> Result<(), MetadataError> {
        sqlx::query("UPDATE workers SET failed_count = failed_count + 1, status = 'idle' WHERE id = $1")
            .bind(id.as_str())
            .execute(&mut tx.0)
            .await?;
        Ok(())
    }
}
