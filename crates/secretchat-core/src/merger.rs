//! Room stream merging.
//!
//! A client joins a room by subscribing to the insert feed first and fetching
//! history second. [`RoomStreamMerger`] reconciles the two sources into a
//! single duplicate-free list ordered by `(created_at, id)`:
//!
//! ```text
//! Detached --begin_sync--> Syncing --apply_snapshot--> Live
//!     ^                       |  inserts buffered         |  inserts merged
//!     +--------detach---------+---------------------------+
//! ```
//!
//! Inserts that arrive while the history fetch is outstanding are buffered
//! and merged after the snapshot, so no message is lost in the gap between
//! subscribing and fetching. Merging is idempotent on message id: whichever
//! copy lands first wins and later copies are reported as duplicates.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    time::Duration,
};

use secretchat_crypto::RoomKey;
use tracing::{debug, trace};

use crate::{Message, MessageId, PresenceEntry, Timestamp, presence::PresenceTracker};

/// Synchronization phase of a room view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Not joined
    Detached,
    /// Subscribed; history fetch outstanding
    Syncing,
    /// History merged; inserts apply directly
    Live,
}

/// Result of offering one message to the merger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Newly visible
    Inserted,
    /// Id already present; dropped
    Duplicate,
    /// Held until the history snapshot lands
    Buffered,
    /// Belongs to a different room; dropped
    ForeignRoom,
}

/// Summary of a snapshot merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Newly visible ids, in the order they were merged
    pub inserted: Vec<MessageId>,
    /// Copies dropped because their id was already visible
    pub duplicates: usize,
}

/// One client's merged view of a single room.
#[derive(Debug, Clone)]
pub struct RoomStreamMerger {
    room_key: RoomKey,
    state: SyncState,
    ordered: BTreeMap<(Timestamp, MessageId), Message>,
    index: HashMap<MessageId, Timestamp>,
    buffered: Vec<Message>,
    presence: PresenceTracker,
}

impl RoomStreamMerger {
    /// Create a detached view of `room_key`.
    pub fn new(room_key: RoomKey, staleness_window: Duration) -> Self {
        Self {
            room_key,
            state: SyncState::Detached,
            ordered: BTreeMap::new(),
            index: HashMap::new(),
            buffered: Vec::new(),
            presence: PresenceTracker::new(staleness_window),
        }
    }

    /// Room this view belongs to.
    pub fn room_key(&self) -> &RoomKey {
        &self.room_key
    }

    /// Current synchronization phase.
    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Enter `Syncing`: subsequent inserts are buffered until the next
    /// snapshot. Visible messages are kept.
    pub fn begin_sync(&mut self) {
        self.state = SyncState::Syncing;
    }

    /// Merge a history snapshot, then drain buffered inserts and go `Live`.
    pub fn apply_snapshot(&mut self, snapshot: Vec<Message>) -> MergeReport {
        let mut report = MergeReport::default();
        let buffered = std::mem::take(&mut self.buffered);

        for message in snapshot.into_iter().chain(buffered) {
            let id = message.id.clone();
            match self.merge(message) {
                InsertOutcome::Inserted => report.inserted.push(id),
                InsertOutcome::Duplicate => report.duplicates += 1,
                InsertOutcome::Buffered | InsertOutcome::ForeignRoom => {},
            }
        }

        self.state = SyncState::Live;
        debug!(
            room = %self.room_key,
            inserted = report.inserted.len(),
            duplicates = report.duplicates,
            total = self.ordered.len(),
            "snapshot merged"
        );
        report
    }

    /// Offer one message from the insert feed.
    pub fn apply_insert(&mut self, message: Message) -> InsertOutcome {
        match self.state {
            SyncState::Live => self.merge(message),
            SyncState::Detached | SyncState::Syncing => {
                if message.room_key != self.room_key {
                    return InsertOutcome::ForeignRoom;
                }
                if self.index.contains_key(&message.id) {
                    return InsertOutcome::Duplicate;
                }
                trace!(id = %message.id, "insert buffered during sync");
                self.buffered.push(message);
                InsertOutcome::Buffered
            },
        }
    }

    /// Make a message visible immediately regardless of sync phase. Used for
    /// the sender's own confirmed sends and local-only echoes.
    pub fn merge_local(&mut self, message: Message) -> InsertOutcome {
        self.merge(message)
    }

    fn merge(&mut self, message: Message) -> InsertOutcome {
        if message.room_key != self.room_key {
            debug!(id = %message.id, "dropping message from another room");
            return InsertOutcome::ForeignRoom;
        }
        if self.index.contains_key(&message.id) {
            return InsertOutcome::Duplicate;
        }
        self.index.insert(message.id.clone(), message.created_at);
        self.ordered.insert(message.order_key(), message);
        InsertOutcome::Inserted
    }

    /// Visible messages in `(created_at, id)` order.
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.ordered.values()
    }

    /// Visible message with `id`.
    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        let created_at = *self.index.get(id)?;
        self.ordered.get(&(created_at, id.clone()))
    }

    /// Returns true if `id` is visible.
    pub fn contains(&self, id: &MessageId) -> bool {
        self.index.contains_key(id)
    }

    /// Number of visible messages.
    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    /// Returns true if no message is visible.
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Number of inserts held for the pending snapshot.
    pub fn buffered(&self) -> usize {
        self.buffered.len()
    }

    /// Merge a presence fetch issued at `requested_at` and recompute the
    /// active set at `now`. Returns true if the active set changed.
    pub fn apply_presence(
        &mut self,
        entries: &[PresenceEntry],
        requested_at: Timestamp,
        now: Timestamp,
    ) -> bool {
        self.presence.apply_snapshot(entries, requested_at);
        self.presence.recompute(now)
    }

    /// Record a single heartbeat (typically our own) and recompute.
    pub fn touch_presence(&mut self, username: &str, at: Timestamp, now: Timestamp) -> bool {
        self.presence.observe(&PresenceEntry::new(username, at));
        self.presence.recompute(now)
    }

    /// Re-evaluate staleness at `now`. Returns true if the active set changed.
    pub fn recompute_active(&mut self, now: Timestamp) -> bool {
        self.presence.recompute(now)
    }

    /// Users active as of the last recompute, sorted by name.
    pub fn active_users(&self) -> &BTreeSet<String> {
        self.presence.active_users()
    }

    /// Oldest heartbeat still considered active at `now`.
    pub fn active_since(&self, now: Timestamp) -> Timestamp {
        self.presence.active_since(now)
    }

    /// Drop all state and return to `Detached`.
    pub fn detach(&mut self) {
        self.state = SyncState::Detached;
        self.ordered.clear();
        self.index.clear();
        self.buffered.clear();
        self.presence.clear();
    }
}
