//! Error taxonomy for the chat core.
//!
//! Errors are scoped: transform failures are terminal for one message,
//! backend failures are recoverable for one room. Nothing here is allowed to
//! end the session.

use secretchat_crypto::TransformError;
use thiserror::Error;

/// Errors surfaced by the chat core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// Empty secret key, rejected at the input boundary
    #[error("secret key must not be empty")]
    InvalidKey,

    /// Ciphertext could not be decoded
    #[error("malformed ciphertext: {reason}")]
    MalformedCiphertext {
        /// Decoder failure description
        reason: String,
    },

    /// A write to the backend (insert or presence) was refused or lost
    #[error("delivery failed: {reason}")]
    DeliveryFailure {
        /// Backend failure description
        reason: String,
    },

    /// The backend is unreachable; the view is local-only until it recovers
    #[error("connectivity degraded: {reason}")]
    ConnectivityDegraded {
        /// Backend failure description
        reason: String,
    },
}

impl ChatError {
    /// Returns true if retrying later may succeed.
    ///
    /// Backend failures are transient. Key and ciphertext errors are
    /// properties of the input and never change on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::DeliveryFailure { .. } | Self::ConnectivityDegraded { .. })
    }

    /// Returns true if the error affects the whole room rather than a single
    /// message.
    pub fn is_room_scoped(&self) -> bool {
        matches!(self, Self::DeliveryFailure { .. } | Self::ConnectivityDegraded { .. })
    }
}

impl From<TransformError> for ChatError {
    fn from(err: TransformError) -> Self {
        match err {
            TransformError::InvalidKey => Self::InvalidKey,
            TransformError::MalformedCiphertext { reason } => Self::MalformedCiphertext { reason },
        }
    }
}
