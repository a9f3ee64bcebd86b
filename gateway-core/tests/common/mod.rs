//! Shared fixtures for gateway integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use gateway_core::{
    Error, Gateway, GatewayChannel, GatewayConfig, LocalChannel, MemoryAuditSink, Result,
    TransferRequest,
};
use ledger_adapters::InMemoryLedger;
use odap_protocol::*;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

pub const SOURCE_ASSET: &str = "asset-1";
pub const RECIPIENT_ASSET: &str = "asset-1-besu";
pub const ASSET_SIZE: u64 = 100;

/// Client gateway on FABRIC, server gateway on BESU
pub struct TestEnvironment {
    pub client: Arc<Gateway>,
    pub server: Arc<Gateway>,
    pub client_keys: GatewayKeys,
    pub fabric: Arc<InMemoryLedger>,
    pub besu: Arc<InMemoryLedger>,
    pub client_audit: Arc<MemoryAuditSink>,
    pub server_audit: Arc<MemoryAuditSink>,
}

impl TestEnvironment {
    pub async fn new() -> Self {
        Self::with_config(GatewayConfig::default()).await
    }

    pub async fn with_config(config: GatewayConfig) -> Self {
        Self::build(config, SOURCE_ASSET, ASSET_SIZE).await
    }

    /// Environment whose FABRIC ledger holds `asset_id` instead of the default asset
    pub async fn with_source(asset_id: &str, size: u64) -> Self {
        Self::build(GatewayConfig::default(), asset_id, size).await
    }

    async fn build(config: GatewayConfig, asset_id: &str, size: u64) -> Self {
        let client_keys = GatewayKeys::generate();
        let client_audit = Arc::new(MemoryAuditSink::new());
        let server_audit = Arc::new(MemoryAuditSink::new());

        let client = Gateway::new(GatewayConfig {
            name: "gateway-a".to_string(),
            ..config.clone()
        })
        .unwrap()
        .with_keys(client_keys.clone())
        .with_audit_sink(client_audit.clone());
        let fabric = Arc::new(InMemoryLedger::new("FABRIC").with_asset(asset_id, size));
        client.register_adapter(fabric.clone()).await;

        let server = Gateway::new(GatewayConfig {
            name: "gateway-b".to_string(),
            ..config
        })
        .unwrap()
        .with_audit_sink(server_audit.clone());
        let besu = Arc::new(InMemoryLedger::new("BESU"));
        server.register_adapter(besu.clone()).await;

        Self {
            client: Arc::new(client),
            server: Arc::new(server),
            client_keys,
            fabric,
            besu,
            client_audit,
            server_audit,
        }
    }

    pub fn channel(&self) -> LocalChannel {
        LocalChannel::new(self.server.clone())
    }

    pub fn request(&self, session_id: &str) -> TransferRequest {
        TransferRequest {
            session_id: Some(session_id.to_string()),
            asset_profile: AssetProfile::expiring_at(Utc::now() + ChronoDuration::hours(1)),
            source_dlt: "FABRIC".to_string(),
            recipient_dlt: "BESU".to_string(),
            source_ledger_asset_id: SOURCE_ASSET.to_string(),
            recipient_ledger_asset_id: RECIPIENT_ASSET.to_string(),
            asset_size: ASSET_SIZE,
            recipient_gateway_pubkey: self.server.public_key_hex().to_string(),
            originator_pubkey: self.client.public_key_hex().to_string(),
            beneficiary_pubkey: self.server.public_key_hex().to_string(),
        }
    }

    /// Signed initialization request from the client keys
    pub fn init_request(
        &self,
        session_id: &str,
        expiration: chrono::DateTime<Utc>,
    ) -> TransferInitializationRequest {
        let mut request = TransferInitializationRequest {
            message_type: message_type::INIT_REQUEST.to_string(),
            session_id: session_id.to_string(),
            version: PROTOCOL_VERSION.to_string(),
            sequence_number: 41,
            payload_profile: PayloadProfile {
                asset_profile: AssetProfile::expiring_at(expiration),
                capabilities: None,
            },
            application_profile: String::new(),
            logging_profile: String::new(),
            access_control_profile: String::new(),
            source_gateway_pubkey: self.client_keys.public_key_hex().to_string(),
            source_gateway_dlt_system: "FABRIC".to_string(),
            recipient_gateway_pubkey: self.server.public_key_hex().to_string(),
            recipient_gateway_dlt_system: "BESU".to_string(),
            source_ledger_asset_id: SOURCE_ASSET.to_string(),
            recipient_ledger_asset_id: RECIPIENT_ASSET.to_string(),
            asset_size: ASSET_SIZE,
            max_retries: 5,
            max_timeout: 0,
            backup_gateways_allowed: Vec::new(),
            client_signature: String::new(),
        };
        self.client_keys.sign_message(&mut request).unwrap();
        request
    }
}

/// Channel that forwards to a server gateway, with hooks to stop, delay or
/// tamper with a phase and to keep the requests it saw
pub struct ScriptedChannel {
    inner: LocalChannel,
    halt_at: Option<Phase>,
    delay_at: Option<(Phase, Duration)>,
    tamper_at: Option<Phase>,
    sent: Mutex<Vec<Phase>>,
    commence: Mutex<Option<TransferCommenceRequest>>,
    lock_evidence: Mutex<Option<LockEvidenceRequest>>,
}

impl ScriptedChannel {
    pub fn new(inner: LocalChannel) -> Self {
        Self {
            inner,
            halt_at: None,
            delay_at: None,
            tamper_at: None,
            sent: Mutex::new(Vec::new()),
            commence: Mutex::new(None),
            lock_evidence: Mutex::new(None),
        }
    }

    /// Fail the round trip for `phase` without reaching the server
    pub fn halt_at(mut self, phase: Phase) -> Self {
        self.halt_at = Some(phase);
        self
    }

    /// Sleep before forwarding `phase`
    pub fn delay_at(mut self, phase: Phase, delay: Duration) -> Self {
        self.delay_at = Some((phase, delay));
        self
    }

    /// Flip one byte of the server signature on the `phase` ack
    pub fn tamper_at(mut self, phase: Phase) -> Self {
        self.tamper_at = Some(phase);
        self
    }

    /// Phases forwarded to the server, in order
    pub fn sent(&self) -> Vec<Phase> {
        self.sent.lock().clone()
    }

    /// Last commence request seen
    pub fn commence_request(&self) -> Option<TransferCommenceRequest> {
        self.commence.lock().clone()
    }

    /// Last lock evidence request seen
    pub fn lock_evidence_request(&self) -> Option<LockEvidenceRequest> {
        self.lock_evidence.lock().clone()
    }

    async fn gate(&self, phase: Phase) -> Result<()> {
        if let Some((at, delay)) = self.delay_at {
            if at == phase {
                tokio::time::sleep(delay).await;
            }
        }
        if self.halt_at == Some(phase) {
            return Err(Error::Transport {
                phase,
                reason: "connection reset".to_string(),
            });
        }
        self.sent.lock().push(phase);
        Ok(())
    }

    fn tamper<A: OdapMessage>(&self, mut ack: A) -> A {
        if self.tamper_at == Some(A::PHASE) {
            let mut signature = ack.signature().as_bytes().to_vec();
            signature[0] = if signature[0] == b'0' { b'1' } else { b'0' };
            ack.set_signature(String::from_utf8(signature).unwrap());
        }
        ack
    }
}

#[async_trait]
impl GatewayChannel for ScriptedChannel {
    async fn transfer_initialization(
        &self,
        request: TransferInitializationRequest,
    ) -> Result<TransferInitializationResponse> {
        self.gate(Phase::Initiation).await?;
        let ack = self.inner.transfer_initialization(request).await?;
        Ok(self.tamper(ack))
    }

    async fn transfer_commence(
        &self,
        request: TransferCommenceRequest,
    ) -> Result<TransferCommenceResponse> {
        *self.commence.lock() = Some(request.clone());
        self.gate(Phase::Commence).await?;
        let ack = self.inner.transfer_commence(request).await?;
        Ok(self.tamper(ack))
    }

    async fn lock_evidence(&self, request: LockEvidenceRequest) -> Result<LockEvidenceResponse> {
        *self.lock_evidence.lock() = Some(request.clone());
        self.gate(Phase::LockEvidence).await?;
        let ack = self.inner.lock_evidence(request).await?;
        Ok(self.tamper(ack))
    }

    async fn commit_preparation(
        &self,
        request: CommitPreparationRequest,
    ) -> Result<CommitPreparationResponse> {
        self.gate(Phase::CommitPreparation).await?;
        let ack = self.inner.commit_preparation(request).await?;
        Ok(self.tamper(ack))
    }

    async fn commit_final(&self, request: CommitFinalRequest) -> Result<CommitFinalResponse> {
        self.gate(Phase::CommitFinal).await?;
        let ack = self.inner.commit_final(request).await?;
        Ok(self.tamper(ack))
    }

    async fn transfer_complete(
        &self,
        request: TransferCompleteRequest,
    ) -> Result<TransferCompleteResponse> {
        self.gate(Phase::Complete).await?;
        let ack = self.inner.transfer_complete(request).await?;
        Ok(self.tamper(ack))
    }
}
