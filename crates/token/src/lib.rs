// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! The three-tier token scheme of §4.3: build tokens, worker tokens, VM
//! tokens, plus the OTP that bootstraps a VM and the out-of-band admin key.
//!
//! No I/O lives here — binding a token to a specific `Build`/`Worker` row
//! and persisting it is `hangar-storage`'s job. This crate only owns
//! generation, redaction, and constant-time comparison.

mod kind;
mod raw;

pub use kind::{AdminKey, BuildToken, Otp, VmToken, VmTokenGrant, WorkerToken};
pub use raw::{constant_time_eq, generate_secret};
