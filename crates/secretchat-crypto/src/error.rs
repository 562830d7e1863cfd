//! Transform error types.

use thiserror::Error;

/// Errors produced by [`crate::transform`] and [`crate::invert`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    /// The secret key is empty.
    ///
    /// Rejected at the input boundary; a validated [`crate::RoomKey`] can never
    /// produce this.
    #[error("secret key must not be empty")]
    InvalidKey,

    /// The ciphertext is not valid base64.
    #[error("malformed ciphertext: {reason}")]
    MalformedCiphertext {
        /// Decoder failure description
        reason: String,
    },
}

impl From<base64::DecodeError> for TransformError {
    fn from(err: base64::DecodeError) -> Self {
        Self::MalformedCiphertext { reason: err.to_string() }
    }
}
