//! SecretChat Backend
//!
//! The external persistence and realtime collaborator, expressed as the
//! [`Backend`] trait. Clients fetch history and presence, insert messages,
//! upsert heartbeats, and subscribe to per-room change feeds.
//!
//! # Implementations
//!
//! - [`MemoryBackend`]: Authoritative in-process owner of [`Room`] entities
//! - [`ChaoticBackend`]: Fault-injecting wrapper for resilience tests

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod chaotic;
mod error;
mod memory;
mod room;
mod subscription;

use std::future::Future;

pub use chaotic::ChaoticBackend;
pub use error::BackendError;
pub use memory::{MemoryBackend, WELCOME_MESSAGES, WELCOME_SENDER};
pub use room::Room;
use secretchat_core::{Message, PresenceEntry, RoomKey, Timestamp};
pub use subscription::Subscription;

/// Persistence and fan-out for chat rooms.
///
/// Must be Clone (handed to every in-flight request), Send + Sync, and
/// `'static`. Implementations share state behind an `Arc`, so clones observe
/// the same rooms. Rooms are created implicitly on first reference.
pub trait Backend: Clone + Send + Sync + 'static {
    /// Every message stored in `room`, ordered by `(created_at, id)`.
    fn fetch_messages(
        &self,
        room: &RoomKey,
    ) -> impl Future<Output = Result<Vec<Message>, BackendError>> + Send;

    /// Store `message` in its room and fan it out to insert subscribers.
    ///
    /// Idempotent by id: re-inserting an existing id succeeds without a second
    /// fan-out.
    fn insert_message(
        &self,
        message: Message,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Subscribe to messages inserted into `room` from now on.
    fn subscribe_inserts(
        &self,
        room: &RoomKey,
    ) -> impl Future<Output = Result<Subscription<Message>, BackendError>> + Send;

    /// Presence entries of `room` with `last_active >= active_since`, sorted
    /// by username.
    fn fetch_presence(
        &self,
        room: &RoomKey,
        active_since: Timestamp,
    ) -> impl Future<Output = Result<Vec<PresenceEntry>, BackendError>> + Send;

    /// Record a heartbeat for `username` in `room`.
    fn upsert_presence(
        &self,
        room: &RoomKey,
        username: &str,
        at: Timestamp,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Remove `username` from `room` (departure notice).
    fn remove_presence(
        &self,
        room: &RoomKey,
        username: &str,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Subscribe to presence change notifications for `room`. Notifications
    /// carry no payload; subscribers re-fetch.
    fn subscribe_presence_changes(
        &self,
        room: &RoomKey,
    ) -> impl Future<Output = Result<Subscription<()>, BackendError>> + Send;
}
