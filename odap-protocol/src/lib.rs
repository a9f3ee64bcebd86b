//! # ODAP Protocol
//!
//! Wire-level building blocks of the gateway transfer protocol:
//! - Six signed request/ack message pairs (Initiation through Complete)
//! - Canonical JSON hashing used for hash chaining
//! - secp256k1 signatures over the blanked-signature pre-image
//! - The transfer state machine shared by client and server roles
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  State Machine  │ ← Phase ordering, terminal states
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │    Messages     │ ← Typed wire structs, message-type URNs
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │    Canonical    │ ← Sorted-key JSON, SHA-256 chaining tokens
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │  Cryptography   │ ← secp256k1 ECDSA, hex encoding
//! └─────────────────┘
//! ```
//!
//! ## Safety
//!
//! - `#![forbid(unsafe_code)]`: No unsafe operations
//! - Signature verification fails closed
//! - Signing never mutates the caller's message

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    unused_qualifications,
    clippy::all
)]

pub mod canonical;
pub mod crypto;
pub mod error;
pub mod messages;
pub mod state;
pub mod types;

pub use crypto::GatewayKeys;
pub use error::{Error, Result};
pub use messages::*;
pub use state::{Phase, StateMachine, TransferState};
pub use types::*;

/// Protocol version advertised in initialization requests
pub const PROTOCOL_VERSION: &str = "1.0";
