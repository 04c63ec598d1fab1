// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use hangar_core::{ErrorKind, HasErrorKind};

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    /// A resolved path fell outside the configured root (§4.1 contract).
    #[error("path escapes blob store root")]
    PathEscape,

    #[error("blob not found")]
    NotFound,

    /// The running byte count crossed the caller-supplied limit mid-stream.
    #[error("blob exceeds configured size limit")]
    TooLarge,

    #[error("blob store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HasErrorKind for BlobError {
    fn kind(&self) -> ErrorKind {
        match self {
            BlobError::PathEscape => ErrorKind::BadRequest,
            BlobError::NotFound => ErrorKind::NotFound,
            BlobError::TooLarge => ErrorKind::PayloadTooLarge,
            BlobError::Io(_) => ErrorKind::Internal,
        }
    }
}
