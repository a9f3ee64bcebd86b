//! Error types for ledger adapters

use crate::types::LedgerOperation;
use thiserror::Error;

/// Result type for adapter operations
pub type Result<T> = std::result::Result<T, Error>;

/// Adapter errors
#[derive(Error, Debug)]
pub enum Error {
    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Asset does not exist on the ledger
    #[error("Asset {asset_id} not found on {dlt}")]
    AssetNotFound {
        /// DLT id
        dlt: String,
        /// Asset id
        asset_id: String,
    },

    /// Asset already exists on the ledger
    #[error("Asset {asset_id} already exists on {dlt}")]
    AssetExists {
        /// DLT id
        dlt: String,
        /// Asset id
        asset_id: String,
    },

    /// Asset lock state does not allow the operation
    #[error("Asset {asset_id} on {dlt} cannot be {operation}: {reason}")]
    InvalidAssetState {
        /// DLT id
        dlt: String,
        /// Asset id
        asset_id: String,
        /// Attempted operation
        operation: LedgerOperation,
        /// Reason
        reason: String,
    },

    /// Ledger accepted the call but reported a non-success status
    #[error("Ledger {dlt} rejected {operation} (tx {transaction_id})")]
    Rejected {
        /// DLT id
        dlt: String,
        /// Attempted operation
        operation: LedgerOperation,
        /// Transaction id of the rejected call
        transaction_id: String,
    },

    /// Unsupported adapter
    #[error("No adapter registered for DLT: {0}")]
    UnsupportedAdapter(String),

    /// Receipt could not be (de)serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
