// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Content-addressed filesystem storage for source archives, cert bundles,
//! and result artifacts (§4.1).
//!
//! Writes are streaming and atomic: a chunk stream is copied straight to a
//! sibling temp file, then renamed into place, so concurrent writers to the
//! same key never interleave — the last rename simply wins. Every resolved
//! path is checked against the configured root before any I/O touches it.

mod error;
mod namespace;
mod store;

pub use error::BlobError;
pub use namespace::Namespace;
pub use store::{BlobStore, PutOutcome};
