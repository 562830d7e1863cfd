//! Driver trait for abstracting I/O operations.
//!
//! The [`Driver`] trait decouples the application runtime from a specific
//! frontend. Each frontend supplies user commands and draws the [`App`],
//! while the generic [`crate::Runtime`] handles all orchestration.

use std::future::Future;

use secretchat_core::Environment;

use crate::{App, UserCommand};

/// Abstracts user input and rendering for the application runtime.
///
/// Implementations provide platform-specific I/O while the generic
/// [`Runtime`](crate::Runtime) handles orchestration logic. This ensures
/// the same orchestration code runs in the demo binary and in simulation.
///
/// # Implementations
///
/// - **Demo**: Scripted commands, renders through `tracing`
/// - **Simulation**: Queued commands, records every render for assertions
pub trait Driver: Send {
    /// Platform-specific error type.
    type Error: std::error::Error + Send + 'static;

    /// Wait for the next user command.
    ///
    /// Returns `None` once input is exhausted; the runtime then leaves the
    /// room and stops.
    fn next_command(
        &mut self,
    ) -> impl Future<Output = Result<Option<UserCommand>, Self::Error>> + Send;

    /// Render the application state.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    fn render<E: Environment>(&mut self, app: &App<E>) -> Result<(), Self::Error>;

    /// Release frontend resources.
    fn stop(&mut self);
}
