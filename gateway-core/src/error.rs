//! Error types for the gateway
//!
//! Every protocol, session and ledger error carries the phase it was raised
//! in, so callers can tell which step of a transfer failed.

use chrono::{DateTime, Utc};
use odap_protocol::{Phase, TransferState};
use thiserror::Error;

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Gateway errors
#[derive(Error, Debug)]
pub enum Error {
    /// Message carries an unexpected `messageType`
    #[error("{phase}: wrong message type: expected {expected}, got {actual}")]
    WrongMessageType {
        /// Failing phase
        phase: Phase,
        /// Expected message type
        expected: String,
        /// Received message type
        actual: String,
    },

    /// Message signature did not verify
    #[error("{phase}: {signer} signature verification failed")]
    SignatureInvalid {
        /// Failing phase
        phase: Phase,
        /// Role of the signer (`client` or `server`)
        signer: &'static str,
    },

    /// Request does not continue the session's hash chain
    #[error("{phase}: continuity check failed: {reason}")]
    Continuity {
        /// Failing phase
        phase: Phase,
        /// Reason
        reason: String,
    },

    /// Request for a phase the session has already passed
    #[error("{phase}: continuity check failed: session already {state:?}")]
    Replayed {
        /// Failing phase
        phase: Phase,
        /// Current session state
        state: TransferState,
    },

    /// Sequence number out of order
    #[error("{phase}: sequence number mismatch: expected {expected}, got {actual}")]
    SequenceMismatch {
        /// Failing phase
        phase: Phase,
        /// Expected sequence number
        expected: u64,
        /// Received sequence number
        actual: u64,
    },

    /// Echoed or declared hash differs from the locally computed one
    #[error("{phase}: {field} mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        /// Failing phase
        phase: Phase,
        /// Hash field name
        field: &'static str,
        /// Locally computed hash
        expected: String,
        /// Received hash
        actual: String,
    },

    /// Echoed public key differs from the expected participant
    #[error("{phase}: {role} public key mismatch: expected {expected}, got {actual}")]
    PublicKeyMismatch {
        /// Failing phase
        phase: Phase,
        /// Participant role (`client` or `server`)
        role: &'static str,
        /// Expected key
        expected: String,
        /// Received key
        actual: String,
    },

    /// Asset profile expired
    #[error("{phase}: asset profile expired at {expired_at}")]
    AssetExpired {
        /// Failing phase
        phase: Phase,
        /// Expiration instant
        expired_at: DateTime<Utc>,
    },

    /// DLT not supported by this gateway
    #[error("{phase}: unsupported DLT system {dlt}")]
    UnsupportedDlt {
        /// Failing phase
        phase: Phase,
        /// DLT id
        dlt: String,
    },

    /// Claim missing, malformed, expired or not matching the session
    #[error("{phase}: invalid claim: {reason}")]
    InvalidClaim {
        /// Failing phase
        phase: Phase,
        /// Reason
        reason: String,
    },

    /// Unknown session
    #[error("{phase}: session {session_id} not found")]
    SessionNotFound {
        /// Failing phase
        phase: Phase,
        /// Session ID
        session_id: String,
    },

    /// Session ID already in use
    #[error("Initiation: session {session_id} already exists")]
    DuplicateSession {
        /// Session ID
        session_id: String,
    },

    /// Session lacks a field a prior phase should have set
    #[error("{phase}: session is missing {field}")]
    SessionIncomplete {
        /// Failing phase
        phase: Phase,
        /// Missing field
        field: &'static str,
    },

    /// Forward ledger action failed
    #[error("{phase}: ledger action failed: {source}")]
    Ledger {
        /// Failing phase
        phase: Phase,
        /// Adapter error
        #[source]
        source: ledger_adapters::Error,
    },

    /// Compensating ledger action failed
    #[error("compensation for session {session_id} on {dlt} failed: {source}")]
    Compensation {
        /// Session ID
        session_id: String,
        /// DLT id
        dlt: String,
        /// Adapter error
        #[source]
        source: ledger_adapters::Error,
    },

    /// A phase failed and the revert that followed failed too
    #[error("{cause} (revert also failed: {compensation})")]
    CompensationFailed {
        /// Original failure
        cause: Box<Error>,
        /// Revert failure
        compensation: Box<Error>,
    },

    /// Counterpart unreachable or returned an error status
    #[error("{phase}: transport failure: {reason}")]
    Transport {
        /// Failing phase
        phase: Phase,
        /// Reason
        reason: String,
    },

    /// Counterpart did not answer within the phase deadline
    #[error("{phase}: no response within {millis}ms")]
    Timeout {
        /// Failing phase
        phase: Phase,
        /// Deadline
        millis: u64,
    },

    /// Protocol primitive error (hashing, signing, state machine)
    #[error("Protocol error: {0}")]
    Protocol(#[from] odap_protocol::Error),

    /// Metrics registration error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Phase the error was raised in, if it belongs to one
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Error::WrongMessageType { phase, .. }
            | Error::SignatureInvalid { phase, .. }
            | Error::Continuity { phase, .. }
            | Error::Replayed { phase, .. }
            | Error::SequenceMismatch { phase, .. }
            | Error::HashMismatch { phase, .. }
            | Error::PublicKeyMismatch { phase, .. }
            | Error::AssetExpired { phase, .. }
            | Error::UnsupportedDlt { phase, .. }
            | Error::InvalidClaim { phase, .. }
            | Error::SessionNotFound { phase, .. }
            | Error::SessionIncomplete { phase, .. }
            | Error::Ledger { phase, .. }
            | Error::Transport { phase, .. }
            | Error::Timeout { phase, .. } => Some(*phase),
            Error::DuplicateSession { .. } => Some(Phase::Initiation),
            Error::CompensationFailed { cause, .. } => cause.phase(),
            _ => None,
        }
    }
}
