//! # Ledger Adapters
//!
//! Connectivity layer between a gateway and the ledgers it controls:
//! - `LedgerAdapter` trait: lock/unlock/create/delete, each returning a receipt
//! - `AdapterManager`: routes actions to the adapter registered for a DLT id
//! - `InMemoryLedger`: reference adapter with call recording and fault injection
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │           Adapter Manager (DLT router)              │
//! └────────────┬────────────────────────────────────────┘
//!              │
//!     ┌────────┼────────────────┐
//!     │        │                │
//! ┌───▼────┐ ┌─▼──────┐ ┌──────▼──────┐
//! │ FABRIC │ │  BESU  │ │  In-memory  │
//! │Adapter │ │Adapter │ │   ledger    │
//! └────────┘ └────────┘ └─────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod connector;
pub mod error;
pub mod manager;
pub mod memory;
pub mod types;

pub use connector::LedgerAdapter;
pub use error::{Error, Result};
pub use manager::{AdapterManager, Invocation};
pub use memory::InMemoryLedger;
pub use types::*;
