//! Error types for protocol primitives

use thiserror::Error;

/// Protocol result type
pub type Result<T> = std::result::Result<T, Error>;

/// Protocol errors
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid transfer state transition
    #[error("Invalid state transition from {from:?} to {to:?}: {reason}")]
    InvalidStateTransition {
        /// Current state
        from: String,
        /// Target state
        to: String,
        /// Reason for rejection
        reason: String,
    },

    /// Key material could not be decoded
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Signing failed
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Message did not serialize to a JSON object
    #[error("Message is not a JSON object: {0}")]
    NotAnObject(String),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<k256::ecdsa::Error> for Error {
    fn from(e: k256::ecdsa::Error) -> Self {
        Error::Signing(e.to_string())
    }
}
