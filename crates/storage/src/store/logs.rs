// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use chrono::{DateTime, Utc};
use hangar_core::{BuildId, BuildLogEntry, LogLevel};

use super::MetadataStore;
use crate::error::MetadataError;
use crate::rows::{log_level_to_str, BuildLogRow};
use crate::tx::Tx;

impl MetadataStore {
    pub async fn append_log(
        &self,
        id: &BuildId,
        timestamp: DateTime<Utc>,
        level: LogLevel,
        message: &str,
    ) -> Result<(), MetadataError> {
        sqlx::query("INSERT INTO build_logs (build_id, timestamp, level, message) VALUES ($1, $2, $3, $4)")
            .bind(id.as_str())
            .bind(timestamp)
            .bind(log_level_to_str(level))
            .bind(message)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Same as [`Self::append_log`] but inside an already-open transaction,
    /// used when the log line is part of a larger atomic operation (claim,
    /// complete, fail, cancel).
    pub async fn append_log_tx(
        &self,
        tx: &mut Tx,
        id: &BuildId,
        timestamp: DateTime<Utc>,
        level: LogLevel,
        message: &str,
    ) -> Result<(), MetadataError> {
        sqlx::query("INSERT INTO build_logs (build_id, timestamp, level, message) VALUES ($1, $2, $3, $4)")
            .bind(id.as_str())
            .bind(timestamp)
            .bind(log_level_to_str(level))
            .bind(message)
            .execute(&mut tx.0)
            .await?;
        Ok(())
    }

    /// Append multiple entries from a single worker/VM in one round trip,
    /// preserving their submission order (§5 ordering guarantee iii).
    pub async fn append_logs_batch(
        &self,
        id: &BuildId,
        entries: &[(DateTime<Utc>, LogLevel, String)],
    ) -> Result<(), MetadataError> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for (timestamp, level, message) in entries {
            sqlx::query(
                "INSERT INTO build_logs (build_id, timestamp, level, message) VALUES ($1, $2, $3, $4)",
            )
            .bind(id.as_str())
            .bind(timestamp)
            .bind(log_level_to_str(*level))
            .bind(message)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn get_logs(
        &self,
        id: &BuildId,
        limit: Option<i64>,
    ) -> Result<Vec<BuildLogEntry>, MetadataError> {
        let rows: Vec<BuildLogRow> = sqlx::query_as(
            "SELECT timestamp, level, message FROM build_logs WHERE build_id = $1 \
             ORDER BY timestamp ASC, id ASC LIMIT $2",
        )
        .bind(id.as_str())
        .bind(limit.unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(BuildLogRow::into_domain).collect()
    }
}
