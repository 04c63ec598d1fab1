// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use hangar_core::{ErrorKind, HasErrorKind};

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("build {0} not found")]
    BuildNotFound(String),

    #[error("worker {0} not found")]
    WorkerNotFound(String),

    #[error("row contained a value this version doesn't understand: {0}")]
    CorruptRow(String),

    #[error("metadata store error: {0}")]
    Database(#[from] sqlx::Error),
}

impl HasErrorKind for MetadataError {
    fn kind(&self) -> ErrorKind {
        match self {
            MetadataError::BuildNotFound(_) | MetadataError::WorkerNotFound(_) => {
                ErrorKind::NotFound
            }
            MetadataError::CorruptRow(_) | MetadataError::Database(_) => ErrorKind::Internal,
        }
    }
}
