#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use secretchat_core::{Message, MessageId, PresenceEntry, RoomKey, Timestamp};
use tracing::debug;

use crate::{Backend, BackendError, Room, Subscription};

/// Display name of the seeded welcome messages.
pub const WELCOME_SENDER: &str = "Nexus_9";

/// Seeded welcome messages and how long before the seeding time each was
/// sent.
pub const WELCOME_MESSAGES: [(&str, Duration); 2] = [
    ("Welcome to SecretChat. Communications are encrypted.", Duration::from_secs(60 * 60)),
    ("Use the same secret key to decrypt messages.", Duration::from_secs(30 * 60)),
];

/// In-memory backend for tests, simulation and the demo.
///
/// Authoritative owner of every [`Room`]. All state lives behind one
/// `Arc<Mutex<_>>`, so clones share rooms. Operations never block on I/O and
/// complete immediately; fan-out happens under the lock, which keeps every
/// subscriber's feed in insertion order.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    rooms: Arc<Mutex<HashMap<RoomKey, Room>>>,
}

impl MemoryBackend {
    /// Create a backend with no rooms.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RoomKey, Room>> {
        // Room state stays consistent across a panicking holder: every
        // mutation is a single insert/remove.
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_room<R>(&self, key: &RoomKey, f: impl FnOnce(&mut Room) -> R) -> R {
        let mut rooms = self.lock();
        let room = rooms.entry(key.clone()).or_insert_with(|| {
            debug!(room = %key, "room created");
            Room::new(key.clone())
        });
        f(room)
    }

    /// Install the two welcome messages from [`WELCOME_SENDER`], dated one
    /// hour and half an hour before `at`. Idempotent.
    pub fn seed_welcome(
        &self,
        key: &RoomKey,
        sender: &str,
        at: Timestamp,
    ) -> Result<(), BackendError> {
        self.with_room(key, |room| {
            for (n, (text, age)) in WELCOME_MESSAGES.iter().enumerate() {
                let message = Message {
                    id: MessageId::new(format!("welcome-{}", n + 1)),
                    sender: sender.to_string(),
                    content: key.seal(text),
                    created_at: at.saturating_sub(*age),
                    room_key: key.clone(),
                };
                room.insert(&message)?;
            }
            Ok(())
        })
    }

    /// Number of rooms referenced so far.
    pub fn room_count(&self) -> usize {
        self.lock().len()
    }

    /// Number of messages stored in `key`'s room.
    pub fn message_count(&self, key: &RoomKey) -> usize {
        self.lock().get(key).map_or(0, Room::message_count)
    }

    /// Live insert subscribers of `key`'s room.
    pub fn insert_subscriber_count(&self, key: &RoomKey) -> usize {
        self.lock().get(key).map_or(0, Room::insert_subscriber_count)
    }

    /// Close every feed of `key`'s room, as a dropped connection would.
    pub fn disconnect_room(&self, key: &RoomKey) {
        if let Some(room) = self.lock().get_mut(key) {
            room.disconnect_all();
        }
    }
}

impl Backend for MemoryBackend {
    async fn fetch_messages(&self, room: &RoomKey) -> Result<Vec<Message>, BackendError> {
        self.with_room(room, |room| room.messages())
    }

    async fn insert_message(&self, message: Message) -> Result<(), BackendError> {
        let key = message.room_key.clone();
        let fresh = self.with_room(&key, |room| room.insert(&message))?;
        if !fresh {
            debug!(id = %message.id, "duplicate insert ignored");
        }
        Ok(())
    }

    async fn subscribe_inserts(
        &self,
        room: &RoomKey,
    ) -> Result<Subscription<Message>, BackendError> {
        Ok(self.with_room(room, Room::subscribe_inserts))
    }

    async fn fetch_presence(
        &self,
        room: &RoomKey,
        active_since: Timestamp,
    ) -> Result<Vec<PresenceEntry>, BackendError> {
        Ok(self.with_room(room, |room| room.presence_since(active_since)))
    }

    async fn upsert_presence(
        &self,
        room: &RoomKey,
        username: &str,
        at: Timestamp,
    ) -> Result<(), BackendError> {
        self.with_room(room, |room| room.upsert_presence(username, at));
        Ok(())
    }

    async fn remove_presence(&self, room: &RoomKey, username: &str) -> Result<(), BackendError> {
        self.with_room(room, |room| room.remove_presence(username));
        Ok(())
    }

    async fn subscribe_presence_changes(
        &self,
        room: &RoomKey,
    ) -> Result<Subscription<()>, BackendError> {
        Ok(self.with_room(room, Room::subscribe_presence))
    }
}
