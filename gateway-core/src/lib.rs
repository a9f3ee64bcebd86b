//! # Gateway Core
//!
//! Cross-chain asset transfer between two gateways over the six-phase ODAP
//! handshake. A gateway is both:
//! - **Server**: validates each phase request against its session, performs
//!   the phase's ledger action, and answers with a signed ack
//! - **Client**: drives a transfer, verifies every ack, and locks then
//!   deletes the source asset along the way
//!
//! ## Architecture
//!
//! ```text
//!  Gateway A (client)                         Gateway B (server)
//! ┌──────────────────┐  request (signed)   ┌──────────────────────┐
//! │   Orchestrator   │────────────────────▶│    Phase handlers    │
//! │                  │◀────────────────────│                      │
//! └───┬──────────┬───┘    ack (signed)     └───┬──────────────┬───┘
//!     │          │                             │              │
//! ┌───▼───┐  ┌───▼─────┐                   ┌───▼───┐    ┌─────▼───┐
//! │Session│  │ Ledger  │                   │Session│    │ Ledger  │
//! │ store │  │adapters │                   │ store │    │adapters │
//! └───────┘  └─────────┘                   └───────┘    └─────────┘
//! ```
//!
//! ## Failure model
//!
//! A failed phase reverts its session on the side that detected it: the
//! furthest ledger action on each ledger is compensated once, and the
//! session becomes `Reverted`. A request for a phase the session already
//! passed is rejected without touching the session.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod audit;
pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod metrics;
mod revert;
mod server;
pub mod session;
pub mod store;

pub use audit::{AuditEntry, AuditKind, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use client::{GatewayChannel, LocalChannel, TransferOutcome, TransferRequest};
pub use config::{GatewayConfig, LogConfig};
pub use error::{Error, Result};
pub use gateway::Gateway;
pub use metrics::Metrics;
pub use session::{LedgerActions, PhaseSignatures, SessionData};
pub use store::{InMemorySessionStore, SessionHandle, SessionStore};
