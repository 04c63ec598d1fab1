// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build identifier and state machine.
//!
//! A [`Build`] is one submitted job's entire lifecycle, not a single
//! compilation attempt (see GLOSSARY). `BuildStatus` forms the DAG
//! described in §4.5; [`BuildStatus::can_transition_to`] is the single
//! place that decides whether a requested transition is legal, so the
//! dispatcher, lifecycle engine, and watchdog can't independently drift
//! on what counts as a valid move.

use crate::platform::Platform;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a build (one submission's lifecycle).
    pub struct BuildId("bld_");
}

crate::define_id! {
    /// Identifier linking a retry build back to its parent.
    pub struct RetryId("rty_");
}

/// Status of a build. Forms a DAG: pending -> assigned -> building ->
/// {completed, failed, cancelled}; cancellation may also fire directly
/// from pending or assigned (§3, invariant i).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Pending,
    Assigned,
    Building,
    Completed,
    Failed,
    Cancelled,
}

crate::simple_display! {
    BuildStatus {
        Pending => "pending",
        Assigned => "assigned",
        Building => "building",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

impl BuildStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, BuildStatus::Completed | BuildStatus::Failed | BuildStatus::Cancelled)
    }

    /// Can a worker currently be assigned/building for a build in this status?
    pub fn holds_a_worker(self) -> bool {
        matches!(self, BuildStatus::Assigned | BuildStatus::Building)
    }

    /// True if `to` is a legal transition from `self`, independent of any
    /// particular caller (dispatcher, lifecycle, watchdog).
    pub fn can_transition_to(self, to: BuildStatus) -> bool {
        use BuildStatus::*;
        matches!(
            (self, to),
            (Pending, Assigned)
                | (Pending, Cancelled)
                | (Assigned, Building)
                | (Assigned, Cancelled)
                | (Assigned, Failed) // watchdog: no heartbeat before first heartbeat arrived
                | (Building, Completed)
                | (Building, Failed)
                | (Building, Cancelled)
        )
    }
}

/// A submitted build. See §3 for the full attribute list and invariants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Build {
    pub id: BuildId,
    pub platform: Platform,
    pub status: BuildStatus,

    /// Blob Store path under `source/`.
    pub source_blob_path: String,
    /// Blob Store path under `certs/`, if a cert bundle was submitted.
    pub certs_blob_path: Option<String>,
    /// Blob Store path under `results/`, set exactly when status = completed.
    pub result_blob_path: Option<String>,

    pub assigned_worker_id: Option<String>,

    /// Submitter's credential, minted on submit (§4.3).
    pub build_token: String,

    pub otp: Option<String>,
    pub otp_expires_at: Option<DateTime<Utc>>,
    pub otp_consumed: bool,

    /// Minted by exchanging `otp` exactly once; authenticates the one
    /// ephemeral VM spawned for this build (§4.3).
    pub vm_token: Option<String>,
    pub vm_token_expires_at: Option<DateTime<Utc>>,

    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_heartbeat_at: Option<DateTime<Utc>>,

    pub error_message: Option<String>,
    pub retry_parent_id: Option<BuildId>,
}

impl Build {
    /// Invariant (ii): completed iff result_blob_path is set.
    pub fn result_invariant_holds(&self) -> bool {
        (self.status == BuildStatus::Completed) == self.result_blob_path.is_some()
    }

    /// Invariant (iii): assigned/building implies a worker is attached.
    pub fn worker_invariant_holds(&self) -> bool {
        !self.status.holds_a_worker() || self.assigned_worker_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_can_move_to_assigned_or_cancelled_only() {
        assert!(BuildStatus::Pending.can_transition_to(BuildStatus::Assigned));
        assert!(BuildStatus::Pending.can_transition_to(BuildStatus::Cancelled));
        assert!(!BuildStatus::Pending.can_transition_to(BuildStatus::Completed));
        assert!(!BuildStatus::Pending.can_transition_to(BuildStatus::Building));
    }

    #[test]
    fn terminal_states_have_no_outgoing_transitions() {
        for to in [
            BuildStatus::Pending,
            BuildStatus::Assigned,
            BuildStatus::Building,
            BuildStatus::Completed,
            BuildStatus::Failed,
            BuildStatus::Cancelled,
        ] {
            assert!(!BuildStatus::Completed.can_transition_to(to));
            assert!(!BuildStatus::Failed.can_transition_to(to));
            assert!(!BuildStatus::Cancelled.can_transition_to(to));
        }
    }

    #[test]
    fn building_reaches_all_three_terminal_states() {
        assert!(BuildStatus::Building.can_transition_to(BuildStatus::Completed));
        assert!(BuildStatus::Building.can_transition_to(BuildStatus::Failed));
        assert!(BuildStatus::Building.can_transition_to(BuildStatus::Cancelled));
    }

    #[test]
    fn id_round_trips_through_display() {
        let id = BuildId::new();
        let parsed = BuildId::from_string(id.to_string());
        assert_eq!(id, parsed);
        assert!(id.as_str().starts_with("bld_"));
    }
}
