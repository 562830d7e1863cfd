//! [`Environment`] backed by the host.
//!
//! Monotonic time comes from `std::time::Instant`, timestamps from the system
//! clock, randomness from the OS through `getrandom`, and sleeps from tokio.
//! Runs are therefore not reproducible; use the harness environment for that.

use std::time::{Duration, UNIX_EPOCH};

use secretchat_core::{Environment, Timestamp};

/// Host clocks and OS randomness.
///
/// # Panics
///
/// `random_bytes` panics if the OS RNG fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    #[allow(clippy::disallowed_methods)]
    fn wall_clock(&self) -> Timestamp {
        // A clock set before 1970 reads as the epoch.
        let since_epoch =
            std::time::SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        Timestamp::from_millis(since_epoch.as_millis() as u64)
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS RNG failure is unrecoverable");
    }
}
