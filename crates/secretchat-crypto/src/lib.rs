//! SecretChat Transform
//!
//! The keyed obfuscation applied to every chat message before it leaves the
//! composing client. Pure functions with deterministic outputs.
//!
//! # Pipeline
//!
//! ```text
//! plaintext bytes
//!        │
//!        ▼
//! XOR with key[i % key.len()]
//!        │
//!        ▼
//! standard base64 → ciphertext text
//! ```
//!
//! [`invert`] reverses the encoding and re-applies the same XOR, which is its
//! own inverse under an identical key.
//!
//! # Security
//!
//! None. This is obfuscation for display purposes only:
//! - No key exchange: whoever holds the room secret reads and writes the room
//! - No integrity: inverting with the wrong key silently yields garbage bytes
//! - No forward secrecy: one secret covers every message ever sent to a room

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod key;
mod transform;

pub use error::TransformError;
pub use key::{FINGERPRINT_BYTES, RoomKey};
pub use transform::{DECRYPTION_FAILED_TEXT, invert, transform};
