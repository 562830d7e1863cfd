//! View invariants checked while simulations run.
//!
//! Each client's observable state is captured in a [`ClientSnapshot`]; the
//! snapshots of every client together form a [`SystemSnapshot`]. An
//! [`InvariantRegistry`] runs its checks over that and reports the first
//! [`Violation`].
//!
//! Two sets exist. [`InvariantRegistry::standard`] holds after every single
//! input. [`InvariantRegistry::quiescent`] adds [`RoomConvergence`], which
//! only holds once every queued result and feed item has been delivered.

mod checks;
mod snapshot;

pub use checks::{MessagesOrdered, RevealsBounded, RoomConvergence};
pub use snapshot::{ClientSnapshot, SystemSnapshot};

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// A failed check: which invariant, and what it saw.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Name of the violated invariant.
    pub invariant: &'static str,
    /// Description of what went wrong.
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// One property of a [`SystemSnapshot`].
pub trait Invariant: Send + Sync {
    /// Name reported in a [`Violation`].
    fn name(&self) -> &'static str;

    /// Check `state`.
    fn check(&self, state: &SystemSnapshot) -> InvariantResult;
}

/// Ordered set of invariants run against each snapshot.
#[derive(Default)]
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl InvariantRegistry {
    /// Ordering and reveal bounds, valid after every processed input.
    pub fn standard() -> Self {
        let mut registry = Self::default();
        registry.add(MessagesOrdered);
        registry.add(RevealsBounded);
        registry
    }

    /// [`InvariantRegistry::standard`] plus room convergence. Only valid once
    /// the system has settled.
    pub fn quiescent() -> Self {
        let mut registry = Self::standard();
        registry.add(RoomConvergence);
        registry
    }

    /// Register an invariant.
    pub fn add(&mut self, invariant: impl Invariant + 'static) {
        self.invariants.push(Box::new(invariant));
    }

    /// Run every invariant, stopping at the first violation.
    pub fn check_all(&self, state: &SystemSnapshot) -> InvariantResult {
        self.invariants.iter().try_for_each(|invariant| invariant.check(state))
    }
}
