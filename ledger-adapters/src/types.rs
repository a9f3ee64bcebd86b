//! Shared types for ledger adapters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Asset operation performed on a ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerOperation {
    /// Lock (escrow) an asset
    Lock,
    /// Release a previously locked asset
    Unlock,
    /// Create (mint) an asset
    Create,
    /// Delete (burn) an asset
    Delete,
}

impl fmt::Display for LedgerOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerOperation::Lock => write!(f, "LOCK"),
            LedgerOperation::Unlock => write!(f, "UNLOCK"),
            LedgerOperation::Create => write!(f, "CREATE"),
            LedgerOperation::Delete => write!(f, "DELETE"),
        }
    }
}

/// Action requested from an adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerAction {
    /// Lock an asset
    Lock {
        /// Asset id
        asset_id: String,
    },
    /// Unlock an asset
    Unlock {
        /// Asset id
        asset_id: String,
    },
    /// Create an asset
    Create {
        /// Asset id
        asset_id: String,
        /// Asset size
        size: u64,
    },
    /// Delete an asset
    Delete {
        /// Asset id
        asset_id: String,
    },
}

impl LedgerAction {
    /// Operation kind
    pub fn operation(&self) -> LedgerOperation {
        match self {
            LedgerAction::Lock { .. } => LedgerOperation::Lock,
            LedgerAction::Unlock { .. } => LedgerOperation::Unlock,
            LedgerAction::Create { .. } => LedgerOperation::Create,
            LedgerAction::Delete { .. } => LedgerOperation::Delete,
        }
    }

    /// Target asset id
    pub fn asset_id(&self) -> &str {
        match self {
            LedgerAction::Lock { asset_id }
            | LedgerAction::Unlock { asset_id }
            | LedgerAction::Create { asset_id, .. }
            | LedgerAction::Delete { asset_id } => asset_id,
        }
    }
}

/// Receipt status reported by the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReceiptStatus {
    /// Transaction committed
    Success,
    /// Transaction rejected or reverted by the ledger
    Failed,
}

/// Transaction receipt, attached to phase messages as a claim/proof
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    /// Ledger transaction id
    pub transaction_id: String,
    /// Block (or equivalent) the transaction landed in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_reference: Option<String>,
    /// DLT the receipt comes from
    pub dlt_id: String,
    /// Operation performed
    pub operation: LedgerOperation,
    /// Asset touched
    pub asset_id: String,
    /// Outcome
    pub status: ReceiptStatus,
    /// When the ledger recorded the transaction
    pub recorded_at: DateTime<Utc>,
}

impl Receipt {
    /// Whether the ledger reported success
    pub fn is_success(&self) -> bool {
        self.status == ReceiptStatus::Success
    }

    /// Serialize as a claim string for a protocol message
    pub fn to_claim(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a claim string
    pub fn from_claim(claim: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(claim)?)
    }
}
