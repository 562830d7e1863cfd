//! Observable application state types.
//!
//! These structures are the view model handed to renderers: everything a UI
//! needs to draw a room without touching the merger or revealer.

use std::fmt;

use secretchat_core::{MessageId, RevealState, Timestamp};

/// Identifies one join of a room. Results tagged with an older session are
/// stale and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Whether a visible message is known to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Stored by the backend (fetched, echoed, or insert confirmed)
    Delivered,
    /// Echoed locally while the backend was unreachable; other clients may
    /// not see it
    LocalOnly,
}

/// Backend reachability as last observed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Connectivity {
    /// Backend calls are succeeding
    #[default]
    Online,
    /// Backend unreachable; sends are echoed locally only
    Degraded {
        /// Last failure description
        reason: String,
    },
}

impl Connectivity {
    /// Returns true while degraded.
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

/// One row of the room's message list.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageView {
    /// Message identifier
    pub id: MessageId,
    /// Sender display name
    pub sender: String,
    /// Creation time
    pub created_at: Timestamp,
    /// Backend delivery status
    pub delivery: Delivery,
    /// Reveal state (status, progress, rendered text)
    pub reveal: RevealState,
}
