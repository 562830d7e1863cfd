//! In-flight reveal registry.
//!
//! Maps message id to the token of its single active reveal run. A second
//! `begin` for the same id is refused, and stale work (a step scheduled for a
//! run that has since been cancelled) is recognised by its token no longer
//! being current.

use std::collections::HashMap;

use crate::MessageId;

/// Identifies one reveal run. Never reused within a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RevealToken(u64);

/// Registry of in-flight reveals, at most one per message id.
#[derive(Debug, Default)]
pub struct RevealRegistry {
    in_flight: HashMap<MessageId, RevealToken>,
    next_token: u64,
}

impl RevealRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the reveal slot for `id`.
    ///
    /// Returns `None` if a run is already in flight for this id.
    pub fn begin(&mut self, id: &MessageId) -> Option<RevealToken> {
        if self.in_flight.contains_key(id) {
            return None;
        }

        let token = RevealToken(self.next_token);
        self.next_token += 1;
        self.in_flight.insert(id.clone(), token);
        Some(token)
    }

    /// Returns true if `token` is the current run for `id`.
    pub fn is_current(&self, id: &MessageId, token: RevealToken) -> bool {
        self.in_flight.get(id) == Some(&token)
    }

    /// Release the slot for `id` if `token` is the current run.
    ///
    /// Returns false (and changes nothing) for a stale token.
    pub fn finish(&mut self, id: &MessageId, token: RevealToken) -> bool {
        if !self.is_current(id, token) {
            return false;
        }
        self.in_flight.remove(id);
        true
    }

    /// Release the slot for `id` regardless of token.
    pub fn cancel(&mut self, id: &MessageId) -> Option<RevealToken> {
        self.in_flight.remove(id)
    }

    /// Returns true if a run is in flight for `id`.
    pub fn in_flight(&self, id: &MessageId) -> bool {
        self.in_flight.contains_key(id)
    }

    /// Number of in-flight runs for `id` (0 or 1).
    pub fn runs_for(&self, id: &MessageId) -> usize {
        usize::from(self.in_flight(id))
    }

    /// Number of in-flight runs across all messages.
    pub fn len(&self) -> usize {
        self.in_flight.len()
    }

    /// Returns true if nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }

    /// Release every slot.
    pub fn clear(&mut self) {
        self.in_flight.clear();
    }
}
