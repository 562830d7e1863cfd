//! Application layer for SecretChat
//!
//! Pure state machine and generic runtime for one client's view of a room,
//! enabling deterministic simulation testing with the same code that runs in
//! production.
//!
//! # Components
//!
//! - [`App`]: Room state machine (join/leave, sending, reveals, presence)
//! - [`Driver`]: Trait for platform-specific input and rendering
//! - [`Runtime`]: Generic orchestration loop executing [`AppAction`]s against
//!   a [`Backend`](secretchat_backend::Backend)
//! - [`SystemEnv`]: Production environment (system clocks, OS randomness)

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod action;
mod app;
mod command;
mod config;
mod driver;
mod event;
mod runtime;
mod state;
mod system_env;

pub use action::AppAction;
pub use app::App;
pub use command::UserCommand;
pub use config::{AppConfig, RuntimeConfig};
pub use driver::Driver;
pub use event::AppEvent;
pub use runtime::Runtime;
pub use state::{Connectivity, Delivery, MessageView, SessionId};
pub use system_env::SystemEnv;
