//! Backend error types

use secretchat_core::ChatError;
use thiserror::Error;

/// Failures reported by a [`Backend`](crate::Backend).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The backend refused the operation
    #[error("rejected: {0}")]
    Rejected(String),

    /// The backend could not be reached
    #[error("unreachable: {0}")]
    Unreachable(String),

    /// A stored row could not be encoded or decoded
    #[error("codec error: {0}")]
    Codec(String),
}

impl BackendError {
    /// Returns true if the backend could not be reached at all.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}

impl From<BackendError> for ChatError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Unreachable(reason) => ChatError::ConnectivityDegraded { reason },
            other => ChatError::DeliveryFailure { reason: other.to_string() },
        }
    }
}
