// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

mod builds;
mod logs;
mod telemetry;
mod workers;

pub use builds::{BuildFilter, BuildStatusUpdate};
pub use telemetry::Stats;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::error::MetadataError;
use crate::tx::Tx;

/// Durable transactional store of Build, Worker, BuildLog, and CpuSnapshot
/// records (§4.2). The Metadata Store exclusively owns durability; the
/// in-process dispatcher queue is a cache rebuilt from it on startup.
#[derive(Clone)]
pub struct MetadataStore {
    pool: PgPool,
}

impl MetadataStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, MetadataError> {
        let pool = PgPoolOptions::new().max_connections(max_connections).connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply `migrations/` against the connected database. Idempotent.
    pub async fn migrate(&self) -> Result<(), MetadataError> {
        sqlx::migrate!("./migrations").run(&self.pool).await.map_err(|e| {
            MetadataError::Database(sqlx::Error::Migrate(Box::new(e)))
        })
    }

    /// Open a transaction. Every multi-step mutation (claim, complete,
    /// fail, cancel, retry, cert repackaging's row update) runs through one
    /// of these so partial writes never become visible (§5, §7).
    pub async fn begin(&self) -> Result<Tx, MetadataError> {
        Ok(Tx(self.pool.begin().await?))
    }
}
