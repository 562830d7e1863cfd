//! Simulated environment with a virtual clock and seeded randomness.
//!
//! Time only moves when a test calls [`SimEnv::advance`] or when something
//! sleeps: a sleep jumps the clock to its deadline and yields once. Clones
//! share the clock and RNG, so every client in a simulation sees the same
//! time and draws from one deterministic stream.

#![allow(clippy::disallowed_types, reason = "Locking simple RNG state")]

use std::{
    ops::{Add, Sub},
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use secretchat_core::{Environment, Timestamp};

/// Wall-clock time at which every simulation starts (2023-11-14T22:13:20Z).
pub const SIM_EPOCH: Timestamp = Timestamp::from_millis(1_700_000_000_000);

/// Virtual monotonic instant: time elapsed since the simulation started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimInstant(Duration);

impl SimInstant {
    /// Time elapsed since the simulation started.
    pub fn since_start(self) -> Duration {
        self.0
    }
}

impl Add<Duration> for SimInstant {
    type Output = SimInstant;

    fn add(self, rhs: Duration) -> SimInstant {
        SimInstant(self.0.saturating_add(rhs))
    }
}

impl Sub for SimInstant {
    type Output = Duration;

    fn sub(self, rhs: SimInstant) -> Duration {
        self.0.saturating_sub(rhs.0)
    }
}

/// Deterministic environment for simulation tests.
#[derive(Debug, Clone)]
pub struct SimEnv {
    elapsed_nanos: Arc<AtomicU64>,
    rng: Arc<Mutex<ChaCha8Rng>>,
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::with_seed(0)
    }
}

impl SimEnv {
    /// Environment at time zero whose randomness is fully determined by
    /// `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            elapsed_nanos: Arc::new(AtomicU64::new(0)),
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, duration: Duration) {
        self.elapsed_nanos.fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
    }

    /// Time elapsed since the simulation started.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_nanos.load(Ordering::SeqCst))
    }
}

impl Environment for SimEnv {
    type Instant = SimInstant;

    fn now(&self) -> SimInstant {
        SimInstant(self.elapsed())
    }

    fn wall_clock(&self) -> Timestamp {
        SIM_EPOCH.saturating_add(self.elapsed())
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        let clock = Arc::clone(&self.elapsed_nanos);
        let deadline = (self.elapsed() + duration).as_nanos() as u64;
        async move {
            clock.fetch_max(deadline, Ordering::SeqCst);
            tokio::task::yield_now().await;
        }
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).fill_bytes(buffer);
    }
}
