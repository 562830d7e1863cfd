//! Chaotic backend wrapper for fault injection testing
//!
//! Backend wrapper that randomly fails operations to test degraded-mode
//! handling and recovery. Failures are drawn from a seeded RNG so a chaos run
//! replays exactly.

#![allow(clippy::disallowed_types, reason = "Locking simple RNG state")]

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use secretchat_core::{Message, PresenceEntry, RoomKey, Timestamp};
use tracing::debug;

use crate::{Backend, BackendError, Subscription};

/// Backend wrapper that randomly injects failures.
///
/// Each failed operation is either `Rejected` or `Unreachable` with equal
/// odds. [`ChaoticBackend::set_offline`] makes every operation fail as
/// `Unreachable` until switched back; [`ChaoticBackend::set_rejecting`] does
/// the same with `Rejected`.
#[derive(Clone)]
pub struct ChaoticBackend<B: Backend> {
    inner: B,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    rng: Arc<Mutex<ChaCha8Rng>>,
    offline: Arc<AtomicBool>,
    rejecting: Arc<AtomicBool>,
    operation_count: Arc<AtomicUsize>,
    failure_count: Arc<AtomicUsize>,
}

impl<B: Backend> ChaoticBackend<B> {
    /// Create a wrapper with a fixed default seed.
    pub fn new(inner: B, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, 0x1234_5678_9ABC_DEF0)
    }

    /// Create with explicit seed for reproducible chaos. `failure_rate` is
    /// clamped to `[0, 1]`.
    pub fn with_seed(inner: B, failure_rate: f64, seed: u64) -> Self {
        Self {
            inner,
            failure_rate: failure_rate.clamp(0.0, 1.0),
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
            offline: Arc::new(AtomicBool::new(false)),
            rejecting: Arc::new(AtomicBool::new(false)),
            operation_count: Arc::new(AtomicUsize::new(0)),
            failure_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Underlying backend (for checking invariants after chaos).
    pub fn inner(&self) -> &B {
        &self.inner
    }

    /// Force every operation to fail as unreachable (or stop doing so).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Returns true while forced offline.
    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    /// Force every operation to be rejected (or stop doing so). Offline
    /// takes precedence.
    pub fn set_rejecting(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::SeqCst);
    }

    /// Total number of operations attempted.
    pub fn operation_count(&self) -> usize {
        self.operation_count.load(Ordering::SeqCst)
    }

    /// Number of operations failed by injection.
    pub fn failure_count(&self) -> usize {
        self.failure_count.load(Ordering::SeqCst)
    }

    /// Decide the fate of one operation. `Err` means inject this failure.
    fn roll(&self, operation: &str) -> Result<(), BackendError> {
        self.operation_count.fetch_add(1, Ordering::SeqCst);

        let failure = if self.is_offline() {
            Some(BackendError::Unreachable(format!("{operation}: backend offline")))
        } else if self.rejecting.load(Ordering::SeqCst) {
            Some(BackendError::Rejected(format!("{operation}: backend rejecting")))
        } else {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            if rng.gen_bool(self.failure_rate) {
                if rng.gen_bool(0.5) {
                    Some(BackendError::Unreachable(format!("{operation}: injected timeout")))
                } else {
                    Some(BackendError::Rejected(format!("{operation}: injected rejection")))
                }
            } else {
                None
            }
        };

        match failure {
            Some(err) => {
                self.failure_count.fetch_add(1, Ordering::SeqCst);
                debug!(operation, error = %err, "injected backend failure");
                Err(err)
            },
            None => Ok(()),
        }
    }
}

impl<B: Backend> Backend for ChaoticBackend<B> {
    async fn fetch_messages(&self, room: &RoomKey) -> Result<Vec<Message>, BackendError> {
        self.roll("fetch_messages")?;
        self.inner.fetch_messages(room).await
    }

    async fn insert_message(&self, message: Message) -> Result<(), BackendError> {
        self.roll("insert_message")?;
        self.inner.insert_message(message).await
    }

    async fn subscribe_inserts(
        &self,
        room: &RoomKey,
    ) -> Result<Subscription<Message>, BackendError> {
        self.roll("subscribe_inserts")?;
        self.inner.subscribe_inserts(room).await
    }

    async fn fetch_presence(
        &self,
        room: &RoomKey,
        active_since: Timestamp,
    ) -> Result<Vec<PresenceEntry>, BackendError> {
        self.roll("fetch_presence")?;
        self.inner.fetch_presence(room, active_since).await
    }

    async fn upsert_presence(
        &self,
        room: &RoomKey,
        username: &str,
        at: Timestamp,
    ) -> Result<(), BackendError> {
        self.roll("upsert_presence")?;
        self.inner.upsert_presence(room, username, at).await
    }

    async fn remove_presence(&self, room: &RoomKey, username: &str) -> Result<(), BackendError> {
        self.roll("remove_presence")?;
        self.inner.remove_presence(room, username).await
    }

    async fn subscribe_presence_changes(
        &self,
        room: &RoomKey,
    ) -> Result<Subscription<()>, BackendError> {
        self.roll("subscribe_presence_changes")?;
        self.inner.subscribe_presence_changes(room).await
    }
}
