//! Presence tracking with a staleness window.
//!
//! A user is active iff their latest heartbeat is no older than the staleness
//! window. Entries are merged by username keeping the newest heartbeat, so a
//! slow fetch can never move a user's `last_active` backwards.

use std::{
    collections::{BTreeSet, HashMap},
    time::Duration,
};

use crate::{PresenceEntry, Timestamp};

/// Maximum heartbeat age before a user is considered absent.
pub const DEFAULT_STALENESS_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Interval at which presence is re-fetched as a fallback against missed
/// change notifications.
pub const DEFAULT_PRESENCE_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Interval at which a client refreshes its own heartbeat.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Presence timing configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceConfig {
    /// Heartbeat age limit
    pub staleness_window: Duration,
    /// Fallback poll cadence (should be < staleness_window)
    pub poll_interval: Duration,
    /// Own heartbeat cadence (should be < staleness_window / 2)
    pub heartbeat_interval: Duration,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            staleness_window: DEFAULT_STALENESS_WINDOW,
            poll_interval: DEFAULT_PRESENCE_POLL_INTERVAL,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }
}

/// Local view of a room's presence.
#[derive(Debug, Clone)]
pub struct PresenceTracker {
    window: Duration,
    last_seen: HashMap<String, Timestamp>,
    active: BTreeSet<String>,
}

impl PresenceTracker {
    /// Create an empty tracker with the given staleness window.
    pub fn new(window: Duration) -> Self {
        Self { window, last_seen: HashMap::new(), active: BTreeSet::new() }
    }

    /// Oldest heartbeat still considered active at `now`.
    pub fn active_since(&self, now: Timestamp) -> Timestamp {
        now.saturating_sub(self.window)
    }

    /// Record a heartbeat, keeping the newest per user. Returns true if it
    /// advanced the user's `last_active`.
    pub fn observe(&mut self, entry: &PresenceEntry) -> bool {
        match self.last_seen.get_mut(&entry.username) {
            Some(seen) if *seen >= entry.last_active => false,
            Some(seen) => {
                *seen = entry.last_active;
                true
            },
            None => {
                self.last_seen.insert(entry.username.clone(), entry.last_active);
                true
            },
        }
    }

    /// Merge a full presence fetch issued at `requested_at`.
    ///
    /// Users missing from the snapshot whose last known heartbeat predates
    /// the request have left (or gone stale) on the backend and are dropped.
    /// Heartbeats observed after the request was issued are kept.
    pub fn apply_snapshot(&mut self, entries: &[PresenceEntry], requested_at: Timestamp) {
        let listed: BTreeSet<&str> = entries.iter().map(|e| e.username.as_str()).collect();
        self.last_seen.retain(|name, seen| listed.contains(name.as_str()) || *seen >= requested_at);

        for entry in entries {
            self.observe(entry);
        }
    }

    /// Drop a user immediately (departure notice).
    pub fn remove(&mut self, username: &str) -> bool {
        self.last_seen.remove(username).is_some()
    }

    /// Recompute the active set at `now`, pruning stale entries. Returns true
    /// if the active set changed.
    pub fn recompute(&mut self, now: Timestamp) -> bool {
        let window = self.window;
        self.last_seen.retain(|_, seen| now.since(*seen) <= window);

        let active: BTreeSet<String> = self.last_seen.keys().cloned().collect();
        let changed = active != self.active;
        self.active = active;
        changed
    }

    /// Users active as of the last recompute, sorted by name.
    pub fn active_users(&self) -> &BTreeSet<String> {
        &self.active
    }

    /// Last known heartbeat of `username`.
    pub fn last_active(&self, username: &str) -> Option<Timestamp> {
        self.last_seen.get(username).copied()
    }

    /// Forget everyone.
    pub fn clear(&mut self) {
        self.last_seen.clear();
        self.active.clear();
    }
}
