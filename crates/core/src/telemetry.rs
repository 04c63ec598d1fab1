// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Telemetry samples posted by the in-build VM.
//!
//! §9's redesign note retires the source's ad-hoc `any`-typed telemetry
//! body in favor of a closed, tagged sum type: every posted event is
//! parsed into one of these variants before any business logic sees it.
//! Unrecognized `type` values land in `Other` rather than being rejected,
//! since the controller has no opinion on telemetry it doesn't act on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// CPU percentage, clamped to the valid range by the caller before storage.
pub const CPU_PERCENT_RANGE: std::ops::RangeInclusive<f64> = 0.0..=1000.0;
/// Memory usage in MB, clamped to the valid range by the caller before storage.
pub const MEMORY_MB_RANGE: std::ops::RangeInclusive<f64> = 0.0..=1_000_000.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpuSnapshot {
    pub cpu_percent: f64,
    pub memory_mb: f64,
}

impl CpuSnapshot {
    pub fn is_valid(&self) -> bool {
        CPU_PERCENT_RANGE.contains(&self.cpu_percent) && MEMORY_MB_RANGE.contains(&self.memory_mb)
    }
}

#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    CpuSnapshot {
        timestamp: DateTime<Utc>,
        data: CpuSnapshot,
    },
    MonitorStarted {
        timestamp: DateTime<Utc>,
    },
    Heartbeat {
        timestamp: DateTime<Utc>,
    },
    /// Anything the controller doesn't interpret, kept for the record.
    Other {
        kind: String,
        timestamp: DateTime<Utc>,
        data: Value,
    },
}

/// `TelemetryEvent` is never re-serialized on the wire (the controller only
/// ever receives it); this impl exists for logging/debugging call sites and
/// mirrors the `type`-tagged shape it was parsed from, including `Other`'s
/// original `type` string.
impl Serialize for TelemetryEvent {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        match self {
            TelemetryEvent::CpuSnapshot { timestamp, data } => {
                let mut s = serializer.serialize_struct("TelemetryEvent", 3)?;
                s.serialize_field("type", "cpu_snapshot")?;
                s.serialize_field("timestamp", timestamp)?;
                s.serialize_field("data", data)?;
                s.end()
            }
            TelemetryEvent::MonitorStarted { timestamp } => {
                let mut s = serializer.serialize_struct("TelemetryEvent", 2)?;
                s.serialize_field("type", "monitor_started")?;
                s.serialize_field("timestamp", timestamp)?;
                s.end()
            }
            TelemetryEvent::Heartbeat { timestamp } => {
                let mut s = serializer.serialize_struct("TelemetryEvent", 2)?;
                s.serialize_field("type", "heartbeat")?;
                s.serialize_field("timestamp", timestamp)?;
                s.end()
            }
            TelemetryEvent::Other { kind, timestamp, data } => {
                let mut s = serializer.serialize_struct("TelemetryEvent", 3)?;
                s.serialize_field("type", kind)?;
                s.serialize_field("timestamp", timestamp)?;
                s.serialize_field("data", data)?;
                s.end()
            }
        }
    }
}

/// `#[serde(tag = "type")]` can't fall back to a catch-all: `#[serde(other)]`
/// is only legal on a unit variant, and a struct variant can't wear it. So
/// `TelemetryEvent` gets a hand-rolled `Deserialize` the way `StreamLogsRequest`
/// (`wire/src/logs_stream.rs`) gets its untagged one: try the closed set of
/// known shapes first, and only fall back to `Other` if none match.
impl<'de> Deserialize<'de> for TelemetryEvent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(tag = "type", rename_all = "snake_case")]
        enum Known {
            CpuSnapshot { timestamp: DateTime<Utc>, data: CpuSnapshot },
            MonitorStarted { timestamp: DateTime<Utc> },
            Heartbeat { timestamp: DateTime<Utc> },
        }

        #[derive(Deserialize)]
        struct Fallback {
            #[serde(rename = "type")]
            kind: String,
            timestamp: DateTime<Utc>,
            #[serde(default)]
            data: Value,
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Known(Known),
            Fallback(Fallback),
        }

        match Wire::deserialize(deserializer)? {
            Wire::Known(Known::CpuSnapshot { timestamp, data }) => Ok(TelemetryEvent::CpuSnapshot { timestamp, data }),
            Wire::Known(Known::MonitorStarted { timestamp }) => Ok(TelemetryEvent::MonitorStarted { timestamp }),
            Wire::Known(Known::Heartbeat { timestamp }) => Ok(TelemetryEvent::Heartbeat { timestamp }),
            Wire::Fallback(Fallback { kind, timestamp, data }) => Ok(TelemetryEvent::Other { kind, timestamp, data }),
        }
    }
}

impl TelemetryEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            TelemetryEvent::CpuSnapshot { timestamp, .. }
            | TelemetryEvent::MonitorStarted { timestamp }
            | TelemetryEvent::Heartbeat { timestamp }
            | TelemetryEvent::Other { timestamp, .. } => *timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_type_parses_into_its_variant() {
        let json = serde_json::json!({"type": "heartbeat", "timestamp": "2026-01-01T00:00:00Z"});
        let event: TelemetryEvent = serde_json::from_value(json).unwrap();
        assert!(matches!(event, TelemetryEvent::Heartbeat { .. }));
    }

    #[test]
    fn unknown_type_falls_back_to_other() {
        let json = serde_json::json!({
            "type": "gpu_snapshot",
            "timestamp": "2026-01-01T00:00:00Z",
            "data": {"gpu_percent": 12.0}
        });
        let event: TelemetryEvent = serde_json::from_value(json).unwrap();
        assert!(matches!(event, TelemetryEvent::Other { ref kind, .. } if kind == "gpu_snapshot"));
    }

    #[test]
    fn cpu_snapshot_out_of_range_is_invalid() {
        let snap = CpuSnapshot { cpu_percent: 1500.0, memory_mb: 10.0 };
        assert!(!snap.is_valid());
    }
}
