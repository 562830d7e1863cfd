//! Deterministic simulation harness for SecretChat.
//!
//! Virtual-time implementations of the Environment and Driver traits, plus a
//! step-by-step cluster that runs several [`App`](secretchat_app::App)s
//! against one backend with full control over the order in which backend
//! results and feed items are delivered.
//!
//! # Invariant Testing
//!
//! The `invariants` module provides behavioral testing through invariant
//! checks. Invariants verify WHAT must be true across all execution paths, not
//! specific scenarios. Use [`InvariantRegistry::standard()`] for the common
//! view invariants.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod cluster;
pub mod invariants;
pub mod sim_driver;
pub mod sim_env;

pub use cluster::{ClientId, DeliveryOrder, SimCluster};
pub use invariants::{
    ClientSnapshot, Invariant, InvariantRegistry, InvariantResult, MessagesOrdered,
    RevealsBounded, RoomConvergence, SystemSnapshot, Violation,
};
pub use sim_driver::{RenderedFrame, SimDriver, SimDriverError, SimHandle};
pub use sim_env::{SIM_EPOCH, SimEnv, SimInstant};
