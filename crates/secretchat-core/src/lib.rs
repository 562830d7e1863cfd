//! SecretChat Core
//!
//! Sans-IO building blocks for the chat reveal client. Nothing in this crate
//! performs I/O or reads a clock: time is an input, and every state machine
//! returns what changed so the caller can render it.
//!
//! # Components
//!
//! - [`Reveal`]: Seeded, finite frame sequence animating ciphertext into text
//! - [`MessageLifecycle`]: Per-message `Hidden -> Revealing -> Revealed` state
//! - [`Revealer`]: Binds lifecycles to reveal runs, one run per message
//! - [`RoomStreamMerger`]: Ordered, duplicate-free merge of history and feed
//! - [`PresenceTracker`]: Active users derived from heartbeats
//! - [`Environment`]: Time and randomness, swappable for simulation

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod env;
pub mod error;
pub mod lifecycle;
pub mod merger;
pub mod message;
pub mod presence;
pub mod registry;
pub mod reveal;
pub mod revealer;
pub mod schedule;

pub use env::Environment;
pub use error::ChatError;
pub use lifecycle::{
    DEFAULT_PREVIEW_LEN, MessageLifecycle, RevealConfig, RevealState, RevealStatus,
};
pub use merger::{InsertOutcome, MergeReport, RoomStreamMerger, SyncState};
pub use message::{Message, MessageId, PresenceEntry, Timestamp};
pub use presence::{PresenceConfig, PresenceTracker};
pub use registry::{RevealRegistry, RevealToken};
pub use reveal::{Reveal, RevealFrame};
pub use revealer::{RevealRequest, Revealer};
pub use schedule::{Scheduler, TaskHandle};
pub use secretchat_crypto::{DECRYPTION_FAILED_TEXT, RoomKey, TransformError};
