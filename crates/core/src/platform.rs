// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Target mobile platform for a build.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
}

crate::simple_display! {
    Platform {
        Ios => "ios",
        Android => "android",
    }
}

/// Unknown platform string supplied on submit.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown platform '{0}', expected 'ios' or 'android'")]
pub struct UnknownPlatform(pub String);

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ios" => Ok(Platform::Ios),
            "android" => Ok(Platform::Android),
            other => Err(UnknownPlatform(other.to_string())),
        }
    }
}
