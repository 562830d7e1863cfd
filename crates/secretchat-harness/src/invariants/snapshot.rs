//! Observable state snapshots for invariant checking.
//!
//! Snapshots capture the observable state of the system at a point in time.
//! Invariants operate on snapshots rather than live state to ensure
//! consistent, atomic checks.

use secretchat_app::{App, Delivery, MessageView};
use secretchat_core::{Environment, MessageId, RevealStatus, RoomKey};

/// Snapshot of the entire system state.
#[derive(Debug, Clone, Default)]
pub struct SystemSnapshot {
    /// Per-client state snapshots.
    pub clients: Vec<ClientSnapshot>,
}

impl SystemSnapshot {
    /// Create a snapshot with a single client.
    pub fn single(client: ClientSnapshot) -> Self {
        Self { clients: vec![client] }
    }

    /// Create a snapshot from multiple clients.
    pub fn from_clients(clients: Vec<ClientSnapshot>) -> Self {
        Self { clients }
    }
}

/// Snapshot of a single client's observable state.
#[derive(Debug, Clone)]
pub struct ClientSnapshot {
    /// Display name.
    pub username: String,
    /// Joined room. `None` if not joined.
    pub room: Option<RoomKey>,
    /// Visible messages in display order.
    pub messages: Vec<MessageView>,
    /// Active users, sorted.
    pub active_users: Vec<String>,
    /// Reveal runs in flight.
    pub active_reveals: usize,
    /// Whether the client currently considers the backend unreachable.
    pub degraded: bool,
}

impl ClientSnapshot {
    /// Capture the observable state of `app`.
    pub fn from_app<E: Environment>(app: &App<E>) -> Self {
        Self {
            username: app.username().to_string(),
            room: app.room_key().cloned(),
            messages: app.messages(),
            active_users: app.active_users(),
            active_reveals: app.active_reveals(),
            degraded: app.connectivity().is_degraded(),
        }
    }

    /// Ids of messages the backend is known to hold, in display order.
    pub fn delivered_ids(&self) -> Vec<MessageId> {
        self.messages
            .iter()
            .filter(|view| view.delivery == Delivery::Delivered)
            .map(|view| view.id.clone())
            .collect()
    }

    /// Number of messages currently animating.
    pub fn revealing(&self) -> usize {
        self.messages.iter().filter(|view| view.reveal.status == RevealStatus::Revealing).count()
    }
}
