//! Room entity.
//!
//! A room is identified by its secret key and owns its ordered message rows,
//! its presence map, and the senders of every live subscription. Rows are
//! kept CBOR-encoded, the way a persistence layer would hold them at rest.

use std::collections::{BTreeMap, HashMap, HashSet};

use secretchat_core::{Message, MessageId, PresenceEntry, RoomKey, Timestamp};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tracing::trace;

use crate::{BackendError, Subscription};

/// Stored form of a message. The room key is implied by the owning room.
#[derive(Debug, Serialize, Deserialize)]
struct MessageRow {
    id: MessageId,
    sender: String,
    content: String,
    created_at: Timestamp,
}

/// One chat room as held by the authoritative backend.
#[derive(Debug)]
pub struct Room {
    key: RoomKey,
    rows: BTreeMap<(Timestamp, MessageId), Vec<u8>>,
    ids: HashSet<MessageId>,
    presence: HashMap<String, Timestamp>,
    insert_subscribers: Vec<UnboundedSender<Message>>,
    presence_subscribers: Vec<UnboundedSender<()>>,
}

impl Room {
    /// Create an empty room.
    pub fn new(key: RoomKey) -> Self {
        Self {
            key,
            rows: BTreeMap::new(),
            ids: HashSet::new(),
            presence: HashMap::new(),
            insert_subscribers: Vec::new(),
            presence_subscribers: Vec::new(),
        }
    }

    /// Key identifying this room.
    pub fn key(&self) -> &RoomKey {
        &self.key
    }

    /// Store a message and fan it out. Returns false if the id was already
    /// stored (nothing is sent).
    pub fn insert(&mut self, message: &Message) -> Result<bool, BackendError> {
        if message.room_key != self.key {
            return Err(BackendError::Rejected(format!(
                "message {} does not belong to {}",
                message.id, self.key
            )));
        }
        if self.ids.contains(&message.id) {
            return Ok(false);
        }

        let row = MessageRow {
            id: message.id.clone(),
            sender: message.sender.clone(),
            content: message.content.clone(),
            created_at: message.created_at,
        };
        let mut bytes = Vec::new();
        ciborium::into_writer(&row, &mut bytes)
            .map_err(|e| BackendError::Codec(e.to_string()))?;

        self.ids.insert(message.id.clone());
        self.rows.insert(message.order_key(), bytes);

        self.insert_subscribers.retain(|tx| tx.send(message.clone()).is_ok());
        trace!(id = %message.id, subscribers = self.insert_subscribers.len(), "message fanned out");
        Ok(true)
    }

    /// Decode every stored message in `(created_at, id)` order.
    pub fn messages(&self) -> Result<Vec<Message>, BackendError> {
        self.rows
            .values()
            .map(|bytes| {
                let row: MessageRow = ciborium::from_reader(bytes.as_slice())
                    .map_err(|e| BackendError::Codec(e.to_string()))?;
                Ok(Message {
                    id: row.id,
                    sender: row.sender,
                    content: row.content,
                    created_at: row.created_at,
                    room_key: self.key.clone(),
                })
            })
            .collect()
    }

    /// Number of stored messages.
    pub fn message_count(&self) -> usize {
        self.rows.len()
    }

    /// Presence entries with `last_active >= active_since`, sorted by name.
    pub fn presence_since(&self, active_since: Timestamp) -> Vec<PresenceEntry> {
        let mut entries: Vec<PresenceEntry> = self
            .presence
            .iter()
            .filter(|(_, at)| **at >= active_since)
            .map(|(name, at)| PresenceEntry::new(name.clone(), *at))
            .collect();
        entries.sort_by(|a, b| a.username.cmp(&b.username));
        entries
    }

    /// Overwrite `username`'s heartbeat and notify presence subscribers.
    pub fn upsert_presence(&mut self, username: &str, at: Timestamp) {
        self.presence.insert(username.to_string(), at);
        self.notify_presence();
    }

    /// Drop `username` and notify presence subscribers. Returns false if they
    /// were not present.
    pub fn remove_presence(&mut self, username: &str) -> bool {
        let removed = self.presence.remove(username).is_some();
        if removed {
            self.notify_presence();
        }
        removed
    }

    /// Open an insert feed.
    pub fn subscribe_inserts(&mut self) -> Subscription<Message> {
        let (tx, subscription) = Subscription::channel();
        self.insert_subscribers.push(tx);
        subscription
    }

    /// Open a presence change feed.
    pub fn subscribe_presence(&mut self) -> Subscription<()> {
        let (tx, subscription) = Subscription::channel();
        self.presence_subscribers.push(tx);
        subscription
    }

    /// Live insert subscribers (closed ones are pruned on fan-out).
    pub fn insert_subscriber_count(&self) -> usize {
        self.insert_subscribers.iter().filter(|tx| !tx.is_closed()).count()
    }

    /// Close every feed. Subscribers observe end-of-stream.
    pub fn disconnect_all(&mut self) {
        self.insert_subscribers.clear();
        self.presence_subscribers.clear();
    }

    fn notify_presence(&mut self) {
        self.presence_subscribers.retain(|tx| tx.send(()).is_ok());
    }
}
