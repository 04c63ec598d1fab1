// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The composition root's shared state: one `Arc` per component, handed to
//! every handler through axum's `State` extractor. No file-level globals —
//! everything here was constructed explicitly in `main` (§9).

use std::sync::Arc;

use hangar_blob::BlobStore;
use hangar_core::SystemClock;
use hangar_engine::{Dispatcher, LifecycleEngine, UploadLimits};
use hangar_storage::MetadataStore;
use hangar_token::AdminKey;

use crate::config::HangarConfig;

pub type Lifecycle = LifecycleEngine<SystemClock>;

#[derive(Clone)]
pub struct AppState {
    pub metadata: Arc<MetadataStore>,
    pub blob: Arc<BlobStore>,
    pub dispatcher: Arc<Dispatcher>,
    pub lifecycle: Arc<Lifecycle>,
    pub admin_key: AdminKey,
    pub otp_ttl: chrono::Duration,
    pub vm_token_ttl: chrono::Duration,
    pub upload_limits: UploadLimits,
    pub config: Arc<HangarConfig>,
}
