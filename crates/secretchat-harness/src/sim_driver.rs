//! Simulation driver implementing the Driver trait.
//!
//! `SimDriver` lets tests run the production [`secretchat_app::Runtime`]
//! loop: commands are injected through a [`SimHandle`], and every render is
//! captured as a [`RenderedFrame`] (and optionally checked against an
//! [`InvariantRegistry`]).

#![allow(clippy::disallowed_types, reason = "Synchronous locking operations only")]

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use secretchat_app::{App, Driver, MessageView, UserCommand};
use secretchat_core::Environment;
use tokio::sync::mpsc;

use crate::invariants::{ClientSnapshot, InvariantRegistry, SystemSnapshot};

/// Error type for simulation driver.
#[derive(Debug, Clone)]
pub struct SimDriverError(pub String);

impl std::fmt::Display for SimDriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimDriverError: {}", self.0)
    }
}

impl std::error::Error for SimDriverError {}

/// What a frontend would have drawn at one render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFrame {
    /// Message rows in display order.
    pub messages: Vec<MessageView>,
    /// Active users, sorted.
    pub active_users: Vec<String>,
    /// Transient notice line.
    pub notice: Option<String>,
    /// Degraded-connectivity banner shown.
    pub degraded: bool,
}

impl RenderedFrame {
    fn capture<E: Environment>(app: &App<E>) -> Self {
        Self {
            messages: app.messages(),
            active_users: app.active_users(),
            notice: app.notice().map(str::to_string),
            degraded: app.connectivity().is_degraded(),
        }
    }
}

type Frames = Arc<Mutex<Vec<RenderedFrame>>>;

fn lock(frames: &Frames) -> MutexGuard<'_, Vec<RenderedFrame>> {
    frames.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Simulation driver for deterministic testing.
pub struct SimDriver {
    commands: mpsc::UnboundedReceiver<UserCommand>,
    frames: Frames,
    invariants: Option<InvariantRegistry>,
}

/// Test-side handle of a [`SimDriver`].
///
/// Dropping every handle ends the driver's input, which makes the runtime
/// leave and stop.
#[derive(Clone)]
pub struct SimHandle {
    commands: mpsc::UnboundedSender<UserCommand>,
    frames: Frames,
}

impl SimDriver {
    /// Create a driver and its handle.
    pub fn new() -> (Self, SimHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let frames = Frames::default();
        let driver = Self { commands: rx, frames: Arc::clone(&frames), invariants: None };
        (driver, SimHandle { commands: tx, frames })
    }

    /// Enable invariant checking on every render.
    #[must_use]
    pub fn with_invariants(mut self, registry: InvariantRegistry) -> Self {
        self.invariants = Some(registry);
        self
    }
}

impl SimHandle {
    /// Queue a user command.
    pub fn send(&self, command: UserCommand) {
        // The runtime may already have stopped; nothing left to command then.
        let _ = self.commands.send(command);
    }

    /// Most recent render.
    pub fn last_frame(&self) -> Option<RenderedFrame> {
        lock(&self.frames).last().cloned()
    }

    /// Number of renders so far.
    pub fn frame_count(&self) -> usize {
        lock(&self.frames).len()
    }
}

impl Driver for SimDriver {
    type Error = SimDriverError;

    async fn next_command(&mut self) -> Result<Option<UserCommand>, Self::Error> {
        Ok(self.commands.recv().await)
    }

    fn render<E: Environment>(&mut self, app: &App<E>) -> Result<(), Self::Error> {
        if let Some(registry) = &self.invariants {
            let snapshot = SystemSnapshot::single(ClientSnapshot::from_app(app));
            registry.check_all(&snapshot).map_err(|v| SimDriverError(v.to_string()))?;
        }
        lock(&self.frames).push(RenderedFrame::capture(app));
        Ok(())
    }

    fn stop(&mut self) {
        self.commands.close();
    }
}
