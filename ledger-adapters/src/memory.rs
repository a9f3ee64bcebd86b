//! In-memory ledger adapter
//!
//! Reference [`LedgerAdapter`] that keeps assets in a map and produces
//! receipts with monotonically increasing block heights. It enforces the
//! usual asset rules (no double create, no locking a locked asset, no
//! delete of a missing asset) and records every call it receives. One-shot
//! fault injection lets callers simulate a ledger that errors or rejects.

use crate::{connector::LedgerAdapter, types::*, Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Asset held by the in-memory ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetRecord {
    /// Asset size
    pub size: u64,
    /// Lock flag
    pub locked: bool,
}

/// Call observed by the in-memory ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerCall {
    /// Operation
    pub operation: LedgerOperation,
    /// Asset id
    pub asset_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fault {
    Error,
    Reject,
}

/// In-memory ledger
#[derive(Debug)]
pub struct InMemoryLedger {
    dlt_id: String,
    assets: Mutex<HashMap<String, AssetRecord>>,
    calls: Mutex<Vec<LedgerCall>>,
    faults: Mutex<HashMap<LedgerOperation, Fault>>,
    height: AtomicU64,
}

impl InMemoryLedger {
    /// Create an empty ledger for `dlt_id`
    pub fn new(dlt_id: impl Into<String>) -> Self {
        Self {
            dlt_id: dlt_id.into(),
            assets: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            faults: Mutex::new(HashMap::new()),
            height: AtomicU64::new(0),
        }
    }

    /// Seed an unlocked asset
    pub fn with_asset(self, asset_id: impl Into<String>, size: u64) -> Self {
        self.assets.lock().insert(
            asset_id.into(),
            AssetRecord {
                size,
                locked: false,
            },
        );
        self
    }

    /// Current state of an asset
    pub fn asset(&self, asset_id: &str) -> Option<AssetRecord> {
        self.assets.lock().get(asset_id).copied()
    }

    /// Every call received so far, in order
    pub fn calls(&self) -> Vec<LedgerCall> {
        self.calls.lock().clone()
    }

    /// Make the next `operation` fail with a connection error
    pub fn fail_next(&self, operation: LedgerOperation) {
        self.faults.lock().insert(operation, Fault::Error);
    }

    /// Make the next `operation` return a receipt with failed status
    pub fn reject_next(&self, operation: LedgerOperation) {
        self.faults.lock().insert(operation, Fault::Reject);
    }

    fn apply<F>(&self, operation: LedgerOperation, asset_id: &str, mutate: F) -> Result<Receipt>
    where
        F: FnOnce(&mut HashMap<String, AssetRecord>) -> Result<()>,
    {
        self.calls.lock().push(LedgerCall {
            operation,
            asset_id: asset_id.to_string(),
        });

        let status = match self.faults.lock().remove(&operation) {
            Some(Fault::Error) => {
                return Err(Error::Connection(format!(
                    "{} unavailable during {}",
                    self.dlt_id, operation
                )))
            }
            Some(Fault::Reject) => ReceiptStatus::Failed,
            None => {
                mutate(&mut self.assets.lock())?;
                ReceiptStatus::Success
            }
        };

        let height = self.height.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Receipt {
            transaction_id: Uuid::new_v4().to_string(),
            block_reference: Some(height.to_string()),
            dlt_id: self.dlt_id.clone(),
            operation,
            asset_id: asset_id.to_string(),
            status,
            recorded_at: Utc::now(),
        })
    }

    fn not_found(&self, asset_id: &str) -> Error {
        Error::AssetNotFound {
            dlt: self.dlt_id.clone(),
            asset_id: asset_id.to_string(),
        }
    }

    fn invalid(&self, asset_id: &str, operation: LedgerOperation, reason: &str) -> Error {
        Error::InvalidAssetState {
            dlt: self.dlt_id.clone(),
            asset_id: asset_id.to_string(),
            operation,
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl LedgerAdapter for InMemoryLedger {
    fn dlt_id(&self) -> &str {
        &self.dlt_id
    }

    async fn lock_asset(&self, asset_id: &str) -> Result<Receipt> {
        self.apply(LedgerOperation::Lock, asset_id, |assets| {
            let record = assets.get_mut(asset_id).ok_or_else(|| self.not_found(asset_id))?;
            if record.locked {
                return Err(self.invalid(asset_id, LedgerOperation::Lock, "already locked"));
            }
            record.locked = true;
            Ok(())
        })
    }

    async fn unlock_asset(&self, asset_id: &str) -> Result<Receipt> {
        self.apply(LedgerOperation::Unlock, asset_id, |assets| {
            let record = assets.get_mut(asset_id).ok_or_else(|| self.not_found(asset_id))?;
            if !record.locked {
                return Err(self.invalid(asset_id, LedgerOperation::Unlock, "not locked"));
            }
            record.locked = false;
            Ok(())
        })
    }

    async fn create_asset(&self, asset_id: &str, size: u64) -> Result<Receipt> {
        self.apply(LedgerOperation::Create, asset_id, |assets| {
            if assets.contains_key(asset_id) {
                return Err(Error::AssetExists {
                    dlt: self.dlt_id.clone(),
                    asset_id: asset_id.to_string(),
                });
            }
            assets.insert(
                asset_id.to_string(),
                AssetRecord {
                    size,
                    locked: false,
                },
            );
            Ok(())
        })
    }

    async fn delete_asset(&self, asset_id: &str) -> Result<Receipt> {
        self.apply(LedgerOperation::Delete, asset_id, |assets| {
            assets
                .remove(asset_id)
                .map(|_| ())
                .ok_or_else(|| self.not_found(asset_id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lock_unlock_cycle() {
        let ledger = InMemoryLedger::new("FABRIC").with_asset("a1", 10);

        let receipt = ledger.lock_asset("a1").await.unwrap();
        assert!(receipt.is_success());
        assert_eq!(receipt.block_reference.as_deref(), Some("1"));
        assert!(ledger.asset("a1").unwrap().locked);

        assert!(ledger.lock_asset("a1").await.is_err());

        ledger.unlock_asset("a1").await.unwrap();
        assert!(!ledger.asset("a1").unwrap().locked);
    }

    #[tokio::test]
    async fn test_create_delete_cycle() {
        let ledger = InMemoryLedger::new("BESU");

        ledger.create_asset("b1", 7).await.unwrap();
        assert_eq!(ledger.asset("b1").unwrap().size, 7);
        assert!(ledger.create_asset("b1", 7).await.is_err());

        ledger.delete_asset("b1").await.unwrap();
        assert!(ledger.asset("b1").is_none());
        assert!(matches!(
            ledger.delete_asset("b1").await,
            Err(Error::AssetNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_fault_injection_is_one_shot() {
        let ledger = InMemoryLedger::new("FABRIC").with_asset("a1", 1);
        ledger.fail_next(LedgerOperation::Lock);

        assert!(matches!(
            ledger.lock_asset("a1").await,
            Err(Error::Connection(_))
        ));
        assert!(!ledger.asset("a1").unwrap().locked);

        assert!(ledger.lock_asset("a1").await.unwrap().is_success());
    }

    #[tokio::test]
    async fn test_rejected_receipt_leaves_state() {
        let ledger = InMemoryLedger::new("FABRIC").with_asset("a1", 1);
        ledger.reject_next(LedgerOperation::Delete);

        let receipt = ledger.delete_asset("a1").await.unwrap();
        assert_eq!(receipt.status, ReceiptStatus::Failed);
        assert!(ledger.asset("a1").is_some());
    }

    #[tokio::test]
    async fn test_calls_recorded() {
        let ledger = InMemoryLedger::new("FABRIC").with_asset("a1", 1);
        let _ = ledger.lock_asset("a1").await;
        let _ = ledger.delete_asset("missing").await;

        let calls = ledger.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].operation, LedgerOperation::Lock);
        assert_eq!(calls[1].asset_id, "missing");
    }
}
