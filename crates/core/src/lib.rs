// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hangar-core: domain types shared by every component of the build
//! controller — builds, workers, logs, telemetry, and the shared error-kind
//! vocabulary. No I/O lives here; that's `hangar-storage`, `hangar-token`,
//! and `hangar-engine`.

pub mod macros;

pub mod build;
pub mod clock;
pub mod error;
pub mod log;
pub mod platform;
pub mod telemetry;
pub mod worker;

pub use build::{Build, BuildId, BuildStatus, RetryId};
pub use clock::{Clock, FakeClock, SystemClock};
pub use error::{ErrorKind, HasErrorKind};
pub use log::{BuildLogEntry, LogLevel};
pub use platform::{Platform, UnknownPlatform};
pub use telemetry::{CpuSnapshot, TelemetryEvent};
pub use worker::{Worker, WorkerCapabilities, WorkerId, WorkerStatus};
