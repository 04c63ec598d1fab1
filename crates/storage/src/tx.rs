// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! An opaque handle to one Metadata Store transaction.
//!
//! Every external status change must commit before any side effect
//! observable to the caller (§4.2's durability guarantee) — callers open a
//! `Tx`, drive one or more of the primitives below through it, and either
//! `commit` or let it drop (which rolls back, same as an aborted request
//! releasing its locks per §5).

use crate::error::MetadataError;

pub struct Tx(pub(crate) sqlx::Transaction<'static, sqlx::Postgres>);

impl Tx {
    pub async fn commit(self) -> Result<(), MetadataError> {
        self.0.commit().await.map_err(Into::into)
    }

    pub async fn rollback(self) -> Result<(), MetadataError> {
        self.0.rollback().await.map_err(Into::into)
    }
}
