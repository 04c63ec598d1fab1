// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Dispatcher's in-memory queue cache (§3 "Queue item", §9).
//!
//! This is a hint, not a source of truth: every claim still re-reads the
//! authoritative row via `select_oldest_pending_for_update` (§5). The
//! cache exists so a poller can cheaply tell "probably nothing to do" from
//! "go check the database", and so long-poll callers have something to
//! wait on — the typed notification channel the §9 redesign note asks for
//! in place of an event-emitter-style listener list.

use std::sync::atomic::{AtomicI64, Ordering};

use tokio::sync::Notify;

pub struct PendingQueue {
    notify: Notify,
    pending_hint: AtomicI64,
    active_hint: AtomicI64,
}

impl Default for PendingQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingQueue {
    pub fn new() -> Self {
        Self { notify: Notify::new(), pending_hint: AtomicI64::new(0), active_hint: AtomicI64::new(0) }
    }

    /// Reset the hints from an authoritative count, called once at startup
    /// (and safe to call again after any drift is suspected).
    pub fn rehydrate(&self, pending: i64, active: i64) {
        self.pending_hint.store(pending, Ordering::SeqCst);
        self.active_hint.store(active, Ordering::SeqCst);
    }

    pub fn mark_enqueued(&self) {
        self.pending_hint.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_one();
    }

    pub fn mark_claimed(&self) {
        self.pending_hint.fetch_sub(1, Ordering::SeqCst);
        self.active_hint.fetch_add(1, Ordering::SeqCst);
    }

    pub fn mark_released(&self) {
        let prev = self.active_hint.fetch_sub(1, Ordering::SeqCst);
        if prev <= 0 {
            self.active_hint.store(0, Ordering::SeqCst);
        }
    }

    /// Wait until something is enqueued, for long-poll callers. Short
    /// pollers should just call `claim` on a fixed interval instead.
    pub async fn notified(&self) {
        self.notify.notified().await;
    }

    pub fn pending_hint(&self) -> i64 {
        self.pending_hint.load(Ordering::SeqCst).max(0)
    }

    pub fn active_hint(&self) -> i64 {
        self.active_hint.load(Ordering::SeqCst).max(0)
    }
}
