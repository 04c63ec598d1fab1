// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The three token kinds (§4.3) plus the one-time password and admin key.
//!
//! Each kind is its own Rust type rather than a shared `String` so a build
//! token can never be accidentally compared against a worker's subject —
//! the type system enforces "every token grants access to exactly one
//! subject kind" (§8) at compile time; which *instance* of that subject it
//! binds to is still the caller's job to check.
//!
//! None of these types implement `Display`, and `Debug` always prints
//! `<redacted>` — §7 forbids secrets from reaching logs or error messages,
//! so there's no code path that can interpolate one by accident.

use crate::raw::{constant_time_eq, generate_secret};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

macro_rules! opaque_token {
    ($name:ident) => {
        #[derive(Clone, Serialize)]
        pub struct $name(String);

        impl $name {
            pub fn generate() -> Self {
                Self(generate_secret())
            }

            /// Rehydrate from a value already persisted in the Metadata Store.
            pub fn from_stored(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// The raw value, for persisting or returning to the client once.
            pub fn reveal(&self) -> &str {
                &self.0
            }

            /// Constant-time check against a caller-supplied header value.
            pub fn matches(&self, provided: &str) -> bool {
                constant_time_eq(&self.0, provided)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}(<redacted>)", stringify!($name))
            }
        }
    };
}

opaque_token!(BuildToken);
opaque_token!(WorkerToken);
opaque_token!(VmToken);
opaque_token!(AdminKey);
opaque_token!(Otp);

/// A VM token carries an absolute expiry sized to a typical build.
#[derive(Clone)]
pub struct VmTokenGrant {
    pub token: VmToken,
    pub expires_at: DateTime<Utc>,
}

impl VmTokenGrant {
    pub fn new(ttl: chrono::Duration, now: DateTime<Utc>) -> Self {
        Self { token: VmToken::generate(), expires_at: now + ttl }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_never_prints_the_value() {
        let t = BuildToken::generate();
        let debug = format!("{:?}", t);
        assert!(!debug.contains(t.reveal()));
        assert_eq!(debug, "BuildToken(<redacted>)");
    }

    #[test]
    fn matches_rejects_wrong_value() {
        let t = WorkerToken::generate();
        assert!(t.matches(t.reveal()));
        assert!(!t.matches("not-the-token"));
    }

    #[test]
    fn vm_grant_expires_after_ttl() {
        let now = Utc::now();
        let grant = VmTokenGrant::new(chrono::Duration::minutes(15), now);
        assert!(!grant.is_expired(now + chrono::Duration::minutes(10)));
        assert!(grant.is_expired(now + chrono::Duration::minutes(16)));
    }
}
