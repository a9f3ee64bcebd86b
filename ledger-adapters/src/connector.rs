//! Ledger adapter interface

use crate::{types::*, Result};
use async_trait::async_trait;

/// Ledger adapter trait
///
/// One implementation per connected DLT. Every operation is a single
/// blocking ledger transaction from the protocol's point of view and
/// returns the receipt that serves as its claim.
#[async_trait]
pub trait LedgerAdapter: Send + Sync {
    /// DLT identifier this adapter serves (e.g. `FABRIC`, `BESU`)
    fn dlt_id(&self) -> &str;

    /// Lock an asset
    async fn lock_asset(&self, asset_id: &str) -> Result<Receipt>;

    /// Unlock an asset
    async fn unlock_asset(&self, asset_id: &str) -> Result<Receipt>;

    /// Create an asset
    async fn create_asset(&self, asset_id: &str, size: u64) -> Result<Receipt>;

    /// Delete an asset
    async fn delete_asset(&self, asset_id: &str) -> Result<Receipt>;
}
