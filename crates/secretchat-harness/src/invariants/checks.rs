//! Standard invariant checks.
//!
//! These invariants capture behavioral properties that must always hold.
//! They verify WHAT must be true, not specific test scenarios.

use std::collections::HashSet;

use super::{Invariant, InvariantResult, SystemSnapshot, Violation};

/// Visible messages are strictly ordered by `(created_at, id)`.
///
/// Strict ordering also rules out duplicate ids.
pub struct MessagesOrdered;

impl Invariant for MessagesOrdered {
    fn name(&self) -> &'static str {
        "messages_ordered"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            let mut seen = HashSet::new();
            for view in &client.messages {
                if !seen.insert(&view.id) {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!("{}: message {} shown twice", client.username, view.id),
                    });
                }
            }
            for pair in client.messages.windows(2) {
                let (a, b) = (&pair[0], &pair[1]);
                if (a.created_at, &a.id) >= (b.created_at, &b.id) {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "{}: {} ({}) listed before {} ({})",
                            client.username, a.id, a.created_at, b.id, b.created_at
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Every in-flight reveal run belongs to exactly one `Revealing` message.
pub struct RevealsBounded;

impl Invariant for RevealsBounded {
    fn name(&self) -> &'static str {
        "reveals_bounded"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            let revealing = client.revealing();
            if client.active_reveals != revealing {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "{}: {} runs in flight but {} messages revealing",
                        client.username, client.active_reveals, revealing
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Clients in the same room that are online show the same delivered
/// messages in the same order.
///
/// Only meaningful once every backend result and feed item was delivered.
pub struct RoomConvergence;

impl Invariant for RoomConvergence {
    fn name(&self) -> &'static str {
        "room_convergence"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let online: Vec<_> =
            state.clients.iter().filter(|c| c.room.is_some() && !c.degraded).collect();

        for (i, a) in online.iter().enumerate() {
            for b in &online[i + 1..] {
                if a.room != b.room {
                    continue;
                }
                let (ids_a, ids_b) = (a.delivered_ids(), b.delivered_ids());
                if ids_a != ids_b {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "{} sees {} messages, {} sees {}",
                            a.username,
                            ids_a.len(),
                            b.username,
                            ids_b.len()
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}
