//! Application side-effects and intents.
//!
//! This module defines the [`AppAction`] enum, which represents instructions
//! produced by the [`crate::App`] state machine for the runtime to execute.
//! Every backend request carries the [`SessionId`] it was issued under so its
//! result can be matched against the current session.

use secretchat_core::{Message, RoomKey, Timestamp};

use crate::SessionId;

/// Actions produced by the App state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    /// Render the UI.
    Render,

    /// Quit the application.
    Quit,

    /// Open the insert and presence feeds for a room.
    ///
    /// Executed before any fetch issued alongside it, so nothing inserted
    /// between fetch and subscribe is missed.
    Subscribe {
        /// Session the feeds belong to.
        session: SessionId,
        /// Room to subscribe to.
        room: RoomKey,
    },

    /// Close the current feeds.
    Unsubscribe,

    /// Fetch the room's full history.
    FetchMessages {
        /// Requesting session.
        session: SessionId,
        /// Room to fetch.
        room: RoomKey,
    },

    /// Fetch presence entries active since a point in time.
    FetchPresence {
        /// Requesting session.
        session: SessionId,
        /// Room to fetch.
        room: RoomKey,
        /// Oldest heartbeat to include.
        active_since: Timestamp,
        /// Wall-clock time the request was issued.
        requested_at: Timestamp,
    },

    /// Store a composed message.
    InsertMessage {
        /// Requesting session.
        session: SessionId,
        /// Transformed message.
        message: Message,
    },

    /// Refresh this client's heartbeat.
    UpsertPresence {
        /// Requesting session.
        session: SessionId,
        /// Room to refresh.
        room: RoomKey,
        /// Display name.
        username: String,
        /// Heartbeat time.
        at: Timestamp,
    },

    /// Best-effort departure notice. Fire and forget.
    SendDeparture {
        /// Room being left.
        room: RoomKey,
        /// Display name.
        username: String,
    },
}
