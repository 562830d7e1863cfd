//! Environment abstraction for deterministic testing.
//!
//! Decouples chat logic from system resources (time, randomness). Enables
//! deterministic simulation (virtual clock, seeded RNG) and production use
//! with real system resources.

use std::{
    ops::{Add, Sub},
    time::Duration,
};

use crate::Timestamp;

/// Abstract environment providing time, randomness, and async sleeping.
///
/// # Invariants
///
/// Implementations MUST guarantee:
///
/// - `now()` never goes backwards
/// - `wall_clock()` is milliseconds since the Unix epoch
/// - Given the same seed, a simulated environment yields the same sequence of
///   random bytes
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    ///
    /// Production environments use `std::time::Instant`, while simulation
    /// environments use virtual time.
    type Instant: Copy
        + Ord
        + Send
        + Sync
        + std::fmt::Debug
        + Add<Duration, Output = Self::Instant>
        + Sub<Output = Duration>;

    /// Current monotonic time. Drives reveal steps and timers.
    fn now(&self) -> Self::Instant;

    /// Current wall-clock time. Stamps messages and presence heartbeats.
    fn wall_clock(&self) -> Timestamp;

    /// Sleeps for the specified duration.
    ///
    /// Only driver code awaits this; state machines take time as input.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    ///
    /// Used to seed reveal simulations.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}
