// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One `HangarConfig`, loaded once at startup and passed down explicitly to
//! every component's constructor — no file-level globals (§9 redesign
//! note). Layered the way `golem-service-base`'s services configure
//! themselves: a TOML file merged with `HANGAR__`-prefixed environment
//! overrides, split on `__` for nested keys.

use std::net::SocketAddr;
use std::time::Duration;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

#[derive(Clone, Debug, Deserialize)]
pub struct BlobConfig {
    pub root: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct UploadLimitsConfig {
    #[serde(default = "default_max_source_mb")]
    pub max_source_mb: u64,
    #[serde(default = "default_max_certs_mb")]
    pub max_certs_mb: u64,
    #[serde(default = "default_max_result_mb")]
    pub max_result_mb: u64,
}

fn default_max_source_mb() -> u64 {
    512
}
fn default_max_certs_mb() -> u64 {
    64
}
fn default_max_result_mb() -> u64 {
    2048
}

impl UploadLimitsConfig {
    pub fn to_bytes(&self) -> hangar_engine::UploadLimits {
        hangar_engine::UploadLimits {
            max_source_bytes: self.max_source_mb * 1024 * 1024,
            max_certs_bytes: self.max_certs_mb * 1024 * 1024,
            max_result_bytes: self.max_result_mb * 1024 * 1024,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct TokenConfig {
    /// Out-of-band admin API key (§4.3) bypassing per-subject tokens.
    pub admin_api_key: String,
    #[serde(default = "default_otp_ttl_secs")]
    pub otp_ttl_secs: i64,
    #[serde(default = "default_vm_token_ttl_secs")]
    pub vm_token_ttl_secs: i64,
}

fn default_otp_ttl_secs() -> i64 {
    600
}
fn default_vm_token_ttl_secs() -> i64 {
    3600
}

#[derive(Clone, Debug, Deserialize)]
pub struct WatchdogConfigSection {
    #[serde(default = "default_watchdog_poll_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_heartbeat_deadline_secs")]
    pub heartbeat_deadline_secs: i64,
    #[serde(default = "default_no_heartbeat_grace_secs")]
    pub no_heartbeat_grace_secs: i64,
}

fn default_watchdog_poll_secs() -> u64 {
    15
}
fn default_heartbeat_deadline_secs() -> i64 {
    120
}
fn default_no_heartbeat_grace_secs() -> i64 {
    300
}

impl WatchdogConfigSection {
    pub fn to_engine_config(&self) -> hangar_engine::WatchdogConfig {
        hangar_engine::WatchdogConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            heartbeat_timeout: chrono::Duration::seconds(self.heartbeat_deadline_secs),
            no_heartbeat_grace: chrono::Duration::seconds(self.no_heartbeat_grace_secs),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct HangarConfig {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
    pub database: DatabaseConfig,
    pub blob: BlobConfig,
    #[serde(default)]
    pub upload_limits: UploadLimitsConfig,
    pub token: TokenConfig,
    #[serde(default)]
    pub watchdog: WatchdogConfigSection,
    /// How long a terminal build's row and blobs stay addressable before
    /// they're eligible for garbage collection (§3 "retention window",
    /// §9 open question — GC itself stays a future policy knob).
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

fn default_bind() -> SocketAddr {
    "0.0.0.0:8080".parse().unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 8080)))
}

fn default_retention_days() -> i64 {
    30
}

impl Default for UploadLimitsConfig {
    fn default() -> Self {
        Self {
            max_source_mb: default_max_source_mb(),
            max_certs_mb: default_max_certs_mb(),
            max_result_mb: default_max_result_mb(),
        }
    }
}

impl Default for WatchdogConfigSection {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_watchdog_poll_secs(),
            heartbeat_deadline_secs: default_heartbeat_deadline_secs(),
            no_heartbeat_grace_secs: default_no_heartbeat_grace_secs(),
        }
    }
}

impl HangarConfig {
    /// Load from `config/hangar.toml` (if present) merged with
    /// `HANGAR__SECTION__KEY`-style environment overrides, e.g.
    /// `HANGAR__DATABASE__URL`, `HANGAR__TOKEN__ADMIN_API_KEY`.
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("config/hangar.toml"))
            .merge(Env::prefixed("HANGAR__").split("__"))
            .extract()
    }
}
