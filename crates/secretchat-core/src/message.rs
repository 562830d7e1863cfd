//! Chat data model.
//!
//! A [`Message`] is immutable once composed: its `content` is always the
//! transform of some plaintext under the room's secret, and its identity is
//! its [`MessageId`]. Rooms order messages by `(created_at, id)`.

use std::{fmt, time::Duration};

use secretchat_crypto::RoomKey;
use serde::{Deserialize, Serialize};

use crate::env::Environment;

/// Wall-clock time in milliseconds since the Unix epoch.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Timestamp from milliseconds since the Unix epoch.
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Milliseconds since the Unix epoch.
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// `self - duration`, clamped at the epoch.
    #[must_use]
    pub fn saturating_sub(self, duration: Duration) -> Self {
        Self(self.0.saturating_sub(duration.as_millis() as u64))
    }

    /// `self + duration`, clamped at `u64::MAX` millis.
    #[must_use]
    pub fn saturating_add(self, duration: Duration) -> Self {
        Self(self.0.saturating_add(duration.as_millis() as u64))
    }

    /// Time elapsed from `earlier` to `self`. Zero if `earlier` is later.
    pub fn since(self, earlier: Self) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Opaque message identifier, unique within a room.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random identifier (UUID v4 layout) drawn from the environment.
    pub fn generate<E: Environment>(env: &E) -> Self {
        let mut bytes = [0u8; 16];
        env.random_bytes(&mut bytes);
        Self(uuid::Builder::from_random_bytes(bytes).into_uuid().to_string())
    }

    /// Identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A chat message as stored and delivered by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier within the room
    pub id: MessageId,
    /// Sender display name
    pub sender: String,
    /// Transformed (base64) payload
    pub content: String,
    /// Creation time, primary ordering key
    pub created_at: Timestamp,
    /// Room the message belongs to
    pub room_key: RoomKey,
}

impl Message {
    /// Compose a new message: stamp it, give it a fresh id, and transform the
    /// plaintext under the room secret.
    pub fn compose<E: Environment>(
        env: &E,
        room_key: &RoomKey,
        sender: &str,
        plaintext: &str,
    ) -> Self {
        Self {
            id: MessageId::generate(env),
            sender: sender.to_string(),
            content: room_key.seal(plaintext),
            created_at: env.wall_clock(),
            room_key: room_key.clone(),
        }
    }

    /// Sort key `(created_at, id)`.
    pub fn order_key(&self) -> (Timestamp, MessageId) {
        (self.created_at, self.id.clone())
    }

    /// Ciphertext truncated to `max_chars` characters, with `...` appended
    /// when truncated.
    pub fn preview(&self, max_chars: usize) -> String {
        let mut chars = self.content.chars();
        let head: String = chars.by_ref().take(max_chars).collect();
        if chars.next().is_some() { format!("{head}...") } else { head }
    }
}

/// One user's most recent heartbeat in a room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresenceEntry {
    /// Display name
    pub username: String,
    /// Time of the latest heartbeat
    pub last_active: Timestamp,
}

impl PresenceEntry {
    /// Create a presence entry.
    pub fn new(username: impl Into<String>, last_active: Timestamp) -> Self {
        Self { username: username.into(), last_active }
    }
}
