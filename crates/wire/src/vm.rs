// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! DTOs for the ephemeral-VM surface: OTP exchange and cert repackaging
//! (§6 `VM authenticate`, `certs-secure`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct VmAuthRequest {
    pub otp: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VmAuthResponse {
    pub vm_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Mirrors `hangar_engine::CertsSecureBundle` at the wire boundary. Kept as
/// its own type (rather than re-exporting the engine's) so the wire crate
/// stays the single place that owns every JSON shape in §6, independent of
/// how the engine happens to model the bundle internally.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CertsSecureResponse {
    pub p12: String,
    pub p12_password: String,
    pub keychain_password: String,
    pub provisioning_profiles: Vec<String>,
}
