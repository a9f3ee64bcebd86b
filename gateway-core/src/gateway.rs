//! Gateway node
//!
//! A `Gateway` plays both protocol roles. As a server it answers phase
//! requests through the `on_*` handlers; as a client it drives a transfer
//! with [`Gateway::transfer`]. Both roles share the session store, the
//! ledger adapters, the audit sink and the metrics registry.

use crate::{
    audit::{AuditEntry, AuditKind, AuditSink, TracingAuditSink},
    config::GatewayConfig,
    metrics::Metrics,
    session::SessionData,
    store::{InMemorySessionStore, SessionStore},
    Error, Result,
};
use ledger_adapters::{AdapterManager, Invocation, LedgerAction, LedgerAdapter, Receipt};
use odap_protocol::{GatewayKeys, Phase};
use std::sync::Arc;
use tracing::{info, warn};

/// Gateway node
pub struct Gateway {
    pub(crate) config: GatewayConfig,
    pub(crate) keys: GatewayKeys,
    pub(crate) sessions: Arc<dyn SessionStore>,
    pub(crate) adapters: Arc<AdapterManager>,
    pub(crate) audit: Arc<dyn AuditSink>,
    pub(crate) metrics: Metrics,
}

impl Gateway {
    /// Create a gateway with an in-memory session store and a tracing audit
    /// sink. The key pair comes from `secret_key_hex` or is generated.
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let keys = match config.secret_key_hex.as_deref() {
            Some(secret) => GatewayKeys::from_secret_hex(secret)?,
            None => GatewayKeys::generate(),
        };

        info!(
            "Gateway {} starting with key {} (DLTs: {})",
            config.name,
            keys.public_key_hex(),
            config.supported_dlts.join(",")
        );

        Ok(Self {
            config,
            keys,
            sessions: Arc::new(InMemorySessionStore::new()),
            adapters: Arc::new(AdapterManager::new()),
            audit: Arc::new(TracingAuditSink),
            metrics: Metrics::new()?,
        })
    }

    /// Replace the key pair
    pub fn with_keys(mut self, keys: GatewayKeys) -> Self {
        self.keys = keys;
        self
    }

    /// Replace the session store
    pub fn with_session_store(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = sessions;
        self
    }

    /// Replace the audit sink
    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Register the adapter for a DLT
    pub async fn register_adapter(&self, adapter: Arc<dyn LedgerAdapter>) {
        self.adapters.register_adapter(adapter).await;
    }

    /// Public key identifying this gateway
    pub fn public_key_hex(&self) -> &str {
        self.keys.public_key_hex()
    }

    /// Configuration
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Metrics
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Session store
    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// Snapshot of a session
    pub async fn session(&self, session_id: &str) -> Option<SessionData> {
        self.sessions.snapshot(session_id).await
    }

    /// Write an audit record for `phase` and advance the session step.
    /// Sink failures are logged only.
    pub(crate) fn audit_phase(&self, session: &mut SessionData, phase: Phase, kind: AuditKind) {
        let entry = AuditEntry {
            session_id: session.id.clone(),
            step: session.step,
            phase,
            operation: format!("{}-{}", kind, phase.operation()),
            nodes: session.nodes(),
        };

        if let Err(e) = self.audit.record(&entry) {
            warn!("Audit write {} failed: {}", entry.key(), e);
        }
        session.step += 1;
    }

    /// Run a forward ledger action for `phase` and record it on the session
    pub(crate) async fn ledger_action(
        &self,
        session: &mut SessionData,
        phase: Phase,
        dlt: &str,
        action: LedgerAction,
    ) -> Result<Receipt> {
        self.audit_phase(session, phase, AuditKind::Exec);
        let operation = action.operation();
        let label = operation.to_string();

        match self.adapters.invoke(dlt, &action).await {
            Ok(Invocation { receipt, duration }) => {
                self.metrics.record_ledger_action(dlt, &label, true);
                self.metrics.record_ledger_duration(dlt, &label, duration);

                let size = match action {
                    LedgerAction::Create { size, .. } => size,
                    _ => session.asset_size,
                };
                session.record_ledger_action(dlt, action.asset_id(), size, operation);
                Ok(receipt)
            }
            Err(source) => {
                self.metrics.record_ledger_action(dlt, &label, false);
                Err(Error::Ledger { phase, source })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use ledger_adapters::{InMemoryLedger, LedgerOperation};

    #[tokio::test]
    async fn test_keys_from_config() {
        let keys = GatewayKeys::generate();
        let config = GatewayConfig {
            secret_key_hex: Some(keys.secret_key_hex()),
            ..Default::default()
        };

        let gateway = Gateway::new(config).unwrap();
        assert_eq!(gateway.public_key_hex(), keys.public_key_hex());
    }

    #[tokio::test]
    async fn test_invalid_secret_key() {
        let config = GatewayConfig {
            secret_key_hex: Some("zz".to_string()),
            ..Default::default()
        };
        assert!(matches!(Gateway::new(config), Err(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn test_audit_failure_still_advances_step() {
        let sink = Arc::new(MemoryAuditSink::new());
        sink.set_failing(true);
        let gateway = Gateway::new(GatewayConfig::default())
            .unwrap()
            .with_audit_sink(sink.clone());

        let mut session = SessionData::new("S1");
        gateway.audit_phase(&mut session, Phase::Commence, AuditKind::Init);
        assert_eq!(session.step, 1);
        assert!(sink.entries().is_empty());
    }

    #[tokio::test]
    async fn test_ledger_action_records_flag() {
        let gateway = Gateway::new(GatewayConfig::default()).unwrap();
        let ledger = Arc::new(InMemoryLedger::new("FABRIC").with_asset("a1", 5));
        gateway.register_adapter(ledger.clone()).await;

        let mut session = SessionData::new("S1");
        session.asset_size = 5;
        let receipt = gateway
            .ledger_action(
                &mut session,
                Phase::Commence,
                "FABRIC",
                LedgerAction::Lock {
                    asset_id: "a1".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(receipt.operation, LedgerOperation::Lock);
        assert!(session.ledger_actions["FABRIC"].locked);
        assert_eq!(session.ledger_actions["FABRIC"].asset_size, 5);
    }

    #[tokio::test]
    async fn test_ledger_failure_is_phase_tagged() {
        let gateway = Gateway::new(GatewayConfig::default()).unwrap();
        let ledger = Arc::new(InMemoryLedger::new("BESU"));
        ledger.fail_next(LedgerOperation::Create);
        gateway.register_adapter(ledger).await;

        let mut session = SessionData::new("S1");
        let err = gateway
            .ledger_action(
                &mut session,
                Phase::CommitFinal,
                "BESU",
                LedgerAction::Create {
                    asset_id: "b1".to_string(),
                    size: 1,
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.phase(), Some(Phase::CommitFinal));
        assert!(!session.has_ledger_actions());
    }
}
