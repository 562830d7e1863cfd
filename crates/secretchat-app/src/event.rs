//! Application input events.
//!
//! This module defines [`AppEvent`], the inputs that drive the
//! [`crate::App`] state machine besides user commands:
//! - System ticks driving reveal steps and timers.
//! - Completions of backend requests, in any order.
//! - Notifications from the room feeds.

use secretchat_core::{ChatError, Message, MessageId, PresenceEntry, Timestamp};

use crate::SessionId;

/// Events processed by the App state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// Periodic tick.
    Tick,

    /// History fetch completed.
    MessagesFetched {
        /// Session that issued the fetch.
        session: SessionId,
        /// Messages or failure.
        result: Result<Vec<Message>, ChatError>,
    },

    /// Presence fetch completed.
    PresenceFetched {
        /// Session that issued the fetch.
        session: SessionId,
        /// Wall-clock time the fetch was issued.
        requested_at: Timestamp,
        /// Entries or failure.
        result: Result<Vec<PresenceEntry>, ChatError>,
    },

    /// Feed subscription completed.
    Subscribed {
        /// Session that subscribed.
        session: SessionId,
        /// Outcome.
        result: Result<(), ChatError>,
    },

    /// Message insert completed.
    MessageInserted {
        /// Session that sent the message.
        session: SessionId,
        /// Message that was sent.
        id: MessageId,
        /// Outcome.
        result: Result<(), ChatError>,
    },

    /// Heartbeat upsert completed.
    HeartbeatSent {
        /// Session that sent the heartbeat.
        session: SessionId,
        /// Outcome.
        result: Result<(), ChatError>,
    },

    /// A message arrived on the insert feed.
    MessageArrived {
        /// Session the feed belongs to.
        session: SessionId,
        /// Delivered message.
        message: Message,
    },

    /// The presence feed signalled a change.
    PresenceChanged {
        /// Session the feed belongs to.
        session: SessionId,
    },

    /// A feed ended without being unsubscribed.
    FeedClosed {
        /// Session the feed belonged to.
        session: SessionId,
    },
}

impl AppEvent {
    /// Session an event belongs to. `None` for session-independent events.
    pub fn session(&self) -> Option<SessionId> {
        match self {
            Self::Tick => None,
            Self::MessagesFetched { session, .. }
            | Self::PresenceFetched { session, .. }
            | Self::Subscribed { session, .. }
            | Self::MessageInserted { session, .. }
            | Self::HeartbeatSent { session, .. }
            | Self::MessageArrived { session, .. }
            | Self::PresenceChanged { session }
            | Self::FeedClosed { session } => Some(*session),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_tick_is_session_independent() {
        let session = SessionId(3);

        assert_eq!(AppEvent::Tick.session(), None);
        assert_eq!(AppEvent::PresenceChanged { session }.session(), Some(session));
        assert_eq!(AppEvent::HeartbeatSent { session, result: Ok(()) }.session(), Some(session));
    }
}
