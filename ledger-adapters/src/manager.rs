//! Adapter manager (routes ledger actions to the adapter for each DLT)

use crate::{connector::LedgerAdapter, types::*, Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// Outcome of a routed ledger action
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Receipt returned by the adapter
    pub receipt: Receipt,
    /// Wall-clock duration of the adapter call
    pub duration: Duration,
}

/// Adapter manager
#[derive(Default)]
pub struct AdapterManager {
    /// Adapters by DLT id
    adapters: Arc<RwLock<HashMap<String, Arc<dyn LedgerAdapter>>>>,
}

impl AdapterManager {
    /// Create new manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Register adapter, replacing any previous adapter for the same DLT
    pub async fn register_adapter(&self, adapter: Arc<dyn LedgerAdapter>) {
        let dlt = adapter.dlt_id().to_string();
        let mut adapters = self.adapters.write().await;
        if adapters.insert(dlt.clone(), adapter).is_some() {
            warn!("Replaced ledger adapter for {}", dlt);
        } else {
            info!("Registered ledger adapter for {}", dlt);
        }
    }

    /// Whether an adapter is registered for `dlt`
    pub async fn contains(&self, dlt: &str) -> bool {
        self.adapters.read().await.contains_key(dlt)
    }

    /// Registered DLT ids, sorted
    pub async fn registered_dlts(&self) -> Vec<String> {
        let mut dlts: Vec<String> = self.adapters.read().await.keys().cloned().collect();
        dlts.sort();
        dlts
    }

    /// Run a single action against the adapter for `dlt`.
    ///
    /// A receipt with a non-success status is turned into
    /// [`Error::Rejected`]. No retries are attempted.
    pub async fn invoke(&self, dlt: &str, action: &LedgerAction) -> Result<Invocation> {
        let adapter = self
            .adapters
            .read()
            .await
            .get(dlt)
            .cloned()
            .ok_or_else(|| Error::UnsupportedAdapter(dlt.to_string()))?;

        let start = std::time::Instant::now();
        let result = match action {
            LedgerAction::Lock { asset_id } => adapter.lock_asset(asset_id).await,
            LedgerAction::Unlock { asset_id } => adapter.unlock_asset(asset_id).await,
            LedgerAction::Create { asset_id, size } => adapter.create_asset(asset_id, *size).await,
            LedgerAction::Delete { asset_id } => adapter.delete_asset(asset_id).await,
        };
        let duration = start.elapsed();

        match result {
            Ok(receipt) if receipt.is_success() => {
                info!(
                    "{} {} on {} committed in tx {}",
                    action.operation(),
                    action.asset_id(),
                    dlt,
                    receipt.transaction_id
                );
                Ok(Invocation { receipt, duration })
            }
            Ok(receipt) => {
                error!(
                    "{} {} on {} rejected in tx {}",
                    action.operation(),
                    action.asset_id(),
                    dlt,
                    receipt.transaction_id
                );
                Err(Error::Rejected {
                    dlt: dlt.to_string(),
                    operation: action.operation(),
                    transaction_id: receipt.transaction_id,
                })
            }
            Err(e) => {
                error!(
                    "{} {} on {} failed: {}",
                    action.operation(),
                    action.asset_id(),
                    dlt,
                    e
                );
                Err(e)
            }
        }
    }
}
