//! Application and runtime configuration.

use std::time::Duration;

use secretchat_core::{
    DEFAULT_PREVIEW_LEN, PresenceConfig, RevealConfig,
    presence::{
        DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_PRESENCE_POLL_INTERVAL, DEFAULT_STALENESS_WINDOW,
    },
    reveal::{DEFAULT_REVEAL_DURATION, DEFAULT_REVEAL_STEPS},
};

/// Default interval between runtime ticks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(50);

/// Room behavior configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Heartbeat age limit for the active-user set
    pub staleness_window: Duration,
    /// Fallback presence poll cadence (should be < staleness_window)
    pub presence_poll_interval: Duration,
    /// Own heartbeat cadence (should be < staleness_window / 2)
    pub heartbeat_interval: Duration,
    /// Total reveal animation time
    pub reveal_duration: Duration,
    /// Intermediate reveal steps
    pub reveal_steps: u32,
    /// Ciphertext characters shown while hidden
    pub preview_len: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            staleness_window: DEFAULT_STALENESS_WINDOW,
            presence_poll_interval: DEFAULT_PRESENCE_POLL_INTERVAL,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            reveal_duration: DEFAULT_REVEAL_DURATION,
            reveal_steps: DEFAULT_REVEAL_STEPS,
            preview_len: DEFAULT_PREVIEW_LEN,
        }
    }
}

impl AppConfig {
    /// Reveal settings for the message lifecycle.
    pub fn reveal(&self) -> RevealConfig {
        RevealConfig {
            duration: self.reveal_duration,
            steps: self.reveal_steps,
            preview_len: self.preview_len,
        }
    }

    /// Presence timing settings.
    pub fn presence(&self) -> PresenceConfig {
        PresenceConfig {
            staleness_window: self.staleness_window,
            poll_interval: self.presence_poll_interval,
            heartbeat_interval: self.heartbeat_interval,
        }
    }
}

/// Runtime loop configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Interval between ticks (reveal step resolution)
    pub tick_interval: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { tick_interval: DEFAULT_TICK_INTERVAL }
    }
}
