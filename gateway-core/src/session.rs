//! Per-transfer session data
//!
//! One `SessionData` exists per transfer on each gateway. It is created
//! when initialization succeeds and then updated by exactly one phase per
//! round trip. It holds the hash chain, the participant identities, the
//! retained signatures, the claims, and the ledger actions taken so far.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use ledger_adapters::{LedgerAction, LedgerOperation, Receipt};
use odap_protocol::{AssetProfile, PayloadProfile, Phase, StateMachine, TransferState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ledger actions taken on one DLT for a session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerActions {
    /// Asset acted upon
    pub asset_id: String,
    /// Asset size, kept to re-create a deleted asset
    pub asset_size: u64,
    /// Asset locked and not yet released
    #[serde(rename = "isAssetLocked")]
    pub locked: bool,
    /// Asset created
    #[serde(rename = "isAssetCreated")]
    pub created: bool,
    /// Asset deleted
    #[serde(rename = "isAssetDeleted")]
    pub deleted: bool,
}

impl LedgerActions {
    /// Single compensating action for the furthest completed step:
    /// deleted, then locked, then created.
    pub fn compensation(&self) -> Option<LedgerAction> {
        let asset_id = self.asset_id.clone();
        if self.deleted {
            Some(LedgerAction::Create {
                asset_id,
                size: self.asset_size,
            })
        } else if self.locked {
            Some(LedgerAction::Unlock { asset_id })
        } else if self.created {
            Some(LedgerAction::Delete { asset_id })
        } else {
            None
        }
    }

    /// Forget every action
    pub fn clear(&mut self) {
        self.locked = false;
        self.created = false;
        self.deleted = false;
    }

    /// Whether any action is recorded
    pub fn any(&self) -> bool {
        self.locked || self.created || self.deleted
    }
}

/// Client and server signatures retained for one phase
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseSignatures {
    /// Request signature
    pub client: Option<String>,
    /// Ack signature
    pub server: Option<String>,
}

/// Session data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    /// Session ID
    pub id: String,
    /// Audit step counter
    pub step: u64,
    /// Transfer state
    pub state: StateMachine,
    /// Protocol version
    pub version: String,
    /// Last sequence number seen
    pub last_sequence_number: u64,

    // Asset
    /// Asset profile from initialization
    pub asset_profile: Option<AssetProfile>,
    /// Payload profile from initialization
    pub payload_profile: Option<PayloadProfile>,
    /// Asset id on the source ledger
    pub source_ledger_asset_id: Option<String>,
    /// Asset id on the recipient ledger
    pub recipient_ledger_asset_id: Option<String>,
    /// Asset size
    pub asset_size: u64,
    /// Retries advertised by the client
    pub max_retries: u32,
    /// Round-trip timeout advertised by the client (ms)
    pub max_timeout: u64,
    /// Backup gateways allowed by the client
    pub allowed_source_backup_gateways: Vec<String>,

    // Hash chain
    /// Hash of the initialization request
    pub initialization_request_hash: Option<String>,
    /// Hash of the initialization ack
    pub initialization_response_hash: Option<String>,
    /// Hash of the commence request
    pub commence_req_hash: Option<String>,
    /// Hash of the commence ack
    pub commence_ack_hash: Option<String>,
    /// Hash of the lock evidence request
    pub lock_evidence_req_hash: Option<String>,
    /// Hash of the lock evidence ack
    pub lock_evidence_ack_hash: Option<String>,
    /// Hash of the commit preparation request
    pub commit_prepare_req_hash: Option<String>,
    /// Hash of the commit preparation ack
    pub commit_prepare_ack_hash: Option<String>,
    /// Hash of the commit final request
    pub commit_final_req_hash: Option<String>,
    /// Hash of the commit final ack
    pub commit_final_ack_hash: Option<String>,
    /// Hash of the transfer complete request
    pub transfer_complete_req_hash: Option<String>,
    /// Hash of the transfer complete ack
    pub transfer_complete_ack_hash: Option<String>,

    // Participants
    /// Client identity key (from commence onward)
    pub client_identity_pubkey: Option<String>,
    /// Server identity key (from commence onward)
    pub server_identity_pubkey: Option<String>,
    /// Client gateway key declared at initialization
    pub source_gateway_pubkey: Option<String>,
    /// Server gateway key declared at initialization
    pub recipient_gateway_pubkey: Option<String>,
    /// Client DLT system
    pub client_dlt_system: Option<String>,
    /// Server DLT system
    pub server_dlt_system: Option<String>,
    /// Asset originator
    pub originator_pubkey: Option<String>,
    /// Asset beneficiary
    pub beneficiary_pubkey: Option<String>,

    /// Signatures by phase
    pub signatures: BTreeMap<Phase, PhaseSignatures>,

    // Claims
    /// Lock receipt from the source ledger
    pub lock_evidence_claim: Option<String>,
    /// Delete receipt from the source ledger
    pub commit_final_claim: Option<String>,
    /// Create receipt from the recipient ledger
    pub commit_acknowledgement_claim: Option<String>,

    /// Ledger actions by DLT id
    pub ledger_actions: BTreeMap<String, LedgerActions>,
    /// Compensations performed
    pub rollback_actions_performed: Vec<String>,
    /// Receipts of compensations performed
    pub rollback_proofs: Vec<Receipt>,

    /// Creation time
    pub created_at: Option<DateTime<Utc>>,
    /// Time of the last accepted message
    pub last_message_received_at: Option<DateTime<Utc>>,
}

impl SessionData {
    /// Empty session
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// Current transfer state
    pub fn state(&self) -> TransferState {
        self.state.current()
    }

    /// Audit node descriptor: `<source key>-><recipient key>`
    pub fn nodes(&self) -> String {
        format!(
            "{}->{}",
            self.source_gateway_pubkey.as_deref().unwrap_or("?"),
            self.recipient_gateway_pubkey.as_deref().unwrap_or("?")
        )
    }

    /// Retained signatures for a phase
    pub fn signatures_mut(&mut self, phase: Phase) -> &mut PhaseSignatures {
        self.signatures.entry(phase).or_default()
    }

    /// Record a forward ledger action
    pub fn record_ledger_action(
        &mut self,
        dlt: &str,
        asset_id: &str,
        asset_size: u64,
        operation: LedgerOperation,
    ) {
        let actions = self.ledger_actions.entry(dlt.to_string()).or_default();
        actions.asset_id = asset_id.to_string();
        actions.asset_size = asset_size;
        match operation {
            LedgerOperation::Lock => actions.locked = true,
            LedgerOperation::Unlock => actions.locked = false,
            LedgerOperation::Create => actions.created = true,
            LedgerOperation::Delete => actions.deleted = true,
        }
    }

    /// Whether any ledger has an uncompensated action
    pub fn has_ledger_actions(&self) -> bool {
        self.ledger_actions.values().any(LedgerActions::any)
    }
}

/// Borrow a field a prior phase must have set
pub(crate) fn require<'a>(
    value: &'a Option<String>,
    phase: Phase,
    field: &'static str,
) -> Result<&'a str> {
    value
        .as_deref()
        .ok_or(Error::SessionIncomplete { phase, field })
}
