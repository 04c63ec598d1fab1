// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use hangar_core::{ErrorKind, HasErrorKind, UnknownPlatform};
use hangar_storage::MetadataError;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

impl HasErrorKind for DispatchError {
    fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::Metadata(e) => e.kind(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Blob(#[from] hangar_blob::BlobError),

    #[error("{0} is not a legal transition from its current status")]
    InvalidTransition(&'static str),

    #[error("heartbeat from a worker that doesn't own this build")]
    Forbidden,

    #[error("the OTP was already consumed or has expired")]
    OtpConflict,

    #[error("source blobs for the parent build are no longer addressable")]
    SourceGone,

    #[error(transparent)]
    UnknownPlatform(#[from] UnknownPlatform),

    #[error(transparent)]
    Certs(#[from] CertsError),
}

impl HasErrorKind for LifecycleError {
    fn kind(&self) -> ErrorKind {
        match self {
            LifecycleError::Metadata(e) => e.kind(),
            LifecycleError::Blob(e) => e.kind(),
            LifecycleError::InvalidTransition(_) => ErrorKind::InvalidTransition,
            LifecycleError::Forbidden => ErrorKind::Forbidden,
            LifecycleError::OtpConflict => ErrorKind::Conflict,
            LifecycleError::SourceGone => ErrorKind::NotFound,
            LifecycleError::UnknownPlatform(_) => ErrorKind::BadRequest,
            LifecycleError::Certs(e) => e.kind(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CertsError {
    #[error("cert bundle has no .p12 entry")]
    Malformed,

    #[error("cert bundle is not a valid zip archive")]
    InvalidZip,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl HasErrorKind for CertsError {
    fn kind(&self) -> ErrorKind {
        match self {
            CertsError::Malformed | CertsError::InvalidZip => ErrorKind::CertsMalformed,
            CertsError::Io(_) => ErrorKind::Internal,
        }
    }
}
