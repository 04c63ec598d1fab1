// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use chrono::{DateTime, Utc};
use hangar_core::BuildId;
use sqlx::Row;

use super::MetadataStore;
use crate::error::MetadataError;

impl MetadataStore {
    pub async fn append_cpu_snapshot(
        &self,
        id: &BuildId,
        timestamp: DateTime<Utc>,
        cpu_percent: f64,
        memory_mb: f64,
    ) -> Result<(), MetadataError> {
        sqlx::query(
            "INSERT INTO cpu_snapshots (build_id, timestamp, cpu_percent, memory_mb) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(id.as_str())
        .bind(timestamp)
        .bind(cpu_percent)
        .bind(memory_mb)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Aggregate counters backing the public `/stats` and `/health` endpoints
/// (§6) — read live from the Metadata Store rather than cached, same as
/// the teacher's status query handlers read live materialized state.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stats {
    pub nodes_online: i64,
    pub builds_queued: i64,
    pub active_builds: i64,
    pub builds_today: i64,
    pub total_builds: i64,
}

impl MetadataStore {
    pub async fn stats(&self, today_start: DateTime<Utc>) -> Result<Stats, MetadataError> {
        let row = sqlx::query(
            "SELECT \
               (SELECT COUNT(*) FROM workers WHERE status != 'offline') AS nodes_online, \
               (SELECT COUNT(*) FROM builds WHERE status = 'pending') AS builds_queued, \
               (SELECT COUNT(*) FROM builds WHERE status IN ('assigned', 'building')) AS active_builds, \
               (SELECT COUNT(*) FROM builds WHERE submitted_at >= $1) AS builds_today, \
               (SELECT COUNT(*) FROM builds) AS total_builds",
        )
        .bind(today_start)
        .fetch_one(&self.pool)
        .await?;
        Ok(Stats {
            nodes_online: row.get("nodes_online"),
            builds_queued: row.get("builds_queued"),
            active_builds: row.get("active_builds"),
            builds_today: row.get("builds_today"),
            total_builds: row.get("total_builds"),
        })
    }
}
