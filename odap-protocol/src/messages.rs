//! Wire messages, one request/ack pair per phase
//!
//! Field names follow the ODAP JSON wire format. Requests are signed by the
//! client gateway (`clientSignature`), acks by the server gateway
//! (`serverSignature`). Each message after the first references the hash of
//! the message that logically preceded it.

use crate::{state::Phase, types::PayloadProfile};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Message type constants
pub mod message_type {
    /// Initialization request
    pub const INIT_REQUEST: &str = "urn:ietf:odap:msgtype:init-transfer-msg";
    /// Initialization ack
    pub const INIT_RESPONSE: &str = "urn:ietf:odap:msgtype:init-transfer-ack-msg";
    /// Commence request
    pub const COMMENCE_REQUEST: &str = "urn:ietf:odap:msgtype:transfer-commence-msg";
    /// Commence ack
    pub const COMMENCE_RESPONSE: &str = "urn:ietf:odap:msgtype:transfer-commence-ack-msg";
    /// Lock evidence request
    pub const LOCK_EVIDENCE_REQUEST: &str = "urn:ietf:odap:msgtype:lock-evidence-req-msg";
    /// Lock evidence ack
    pub const LOCK_EVIDENCE_RESPONSE: &str = "urn:ietf:odap:msgtype:lock-evidence-ack-msg";
    /// Commit preparation request
    pub const COMMIT_PREPARE_REQUEST: &str = "urn:ietf:odap:msgtype:commit-prepare-msg";
    /// Commit preparation ack (shared with commit final)
    pub const COMMIT_PREPARE_RESPONSE: &str = "urn:ietf:odap:msgtype:commit-ack-msg";
    /// Commit final request
    pub const COMMIT_FINAL_REQUEST: &str = "urn:ietf:odap:msgtype:commit-final-msg";
    /// Commit final ack (shared with commit preparation)
    pub const COMMIT_FINAL_RESPONSE: &str = "urn:ietf:odap:msgtype:commit-ack-msg";
    /// Transfer complete request
    pub const TRANSFER_COMPLETE_REQUEST: &str =
        "urn:ietf:odap:msgtype:commit-transfer-complete-msg";
    /// Transfer complete ack
    pub const TRANSFER_COMPLETE_RESPONSE: &str =
        "urn:ietf:odap:msgtype:commit-transfer-complete-ack-msg";
}

/// Common accessors over every wire message
pub trait OdapMessage: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Expected `messageType` value
    const MESSAGE_TYPE: &'static str;
    /// Phase the message belongs to
    const PHASE: Phase;
    /// JSON name of the signature field, blanked when signing
    const SIGNATURE_FIELD: &'static str;

    /// Declared message type
    fn message_type(&self) -> &str;
    /// Session identifier
    fn session_id(&self) -> &str;
    /// Sequence number
    fn sequence_number(&self) -> u64;
    /// Hex signature
    fn signature(&self) -> &str;
    /// Replace the signature
    fn set_signature(&mut self, signature: String);
}

/// Client-to-server request
pub trait PhaseRequest: OdapMessage {
    /// Ack type answering this request
    type Ack: PhaseAck;

    /// Public key of the sending (client) gateway
    fn client_pubkey(&self) -> &str;
    /// Public key of the receiving (server) gateway
    fn server_pubkey(&self) -> &str;
}

/// Server-to-client acknowledgement
pub trait PhaseAck: OdapMessage {
    /// Echoed hash of the request being acknowledged
    fn request_hash(&self) -> &str;
    /// Echoed client public key, if the ack carries one
    fn client_pubkey(&self) -> Option<&str>;
    /// Public key of the acknowledging (server) gateway
    fn server_pubkey(&self) -> &str;
}

macro_rules! odap_message {
    ($ty:ty, $message_type:expr, $phase:expr, $sig:ident, $sig_field:literal) => {
        impl OdapMessage for $ty {
            const MESSAGE_TYPE: &'static str = $message_type;
            const PHASE: Phase = $phase;
            const SIGNATURE_FIELD: &'static str = $sig_field;

            fn message_type(&self) -> &str {
                &self.message_type
            }

            fn session_id(&self) -> &str {
                &self.session_id
            }

            fn sequence_number(&self) -> u64 {
                self.sequence_number
            }

            fn signature(&self) -> &str {
                &self.$sig
            }

            fn set_signature(&mut self, signature: String) {
                self.$sig = signature;
            }
        }
    };
}

macro_rules! phase_request {
    ($ty:ty, $ack:ty, $client:ident, $server:ident) => {
        impl PhaseRequest for $ty {
            type Ack = $ack;

            fn client_pubkey(&self) -> &str {
                &self.$client
            }

            fn server_pubkey(&self) -> &str {
                &self.$server
            }
        }
    };
}

macro_rules! phase_ack {
    ($ty:ty, $hash:ident) => {
        impl PhaseAck for $ty {
            fn request_hash(&self) -> &str {
                &self.$hash
            }

            fn client_pubkey(&self) -> Option<&str> {
                Some(&self.client_identity_pubkey)
            }

            fn server_pubkey(&self) -> &str {
                &self.server_identity_pubkey
            }
        }
    };
}

// =========================================================================
// PHASE 1: TRANSFER INITIALIZATION
// =========================================================================

/// Transfer initialization request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferInitializationRequest {
    /// Message type
    pub message_type: String,
    /// Session ID chosen by the client gateway
    #[serde(rename = "sessionID")]
    pub session_id: String,
    /// Protocol version
    pub version: String,
    /// Sequence number (random start)
    pub sequence_number: u64,
    /// Payload profile (carries the asset profile)
    pub payload_profile: PayloadProfile,
    /// Application profile
    pub application_profile: String,
    /// Logging profile
    pub logging_profile: String,
    /// Access control profile
    pub access_control_profile: String,
    /// Client gateway public key
    pub source_gateway_pubkey: String,
    /// Client gateway DLT system
    pub source_gateway_dlt_system: String,
    /// Server gateway public key
    pub recipient_gateway_pubkey: String,
    /// Server gateway DLT system
    pub recipient_gateway_dlt_system: String,
    /// Asset identifier on the source ledger
    #[serde(rename = "sourceLedgerAssetID")]
    pub source_ledger_asset_id: String,
    /// Asset identifier on the recipient ledger
    #[serde(rename = "recipientLedgerAssetID")]
    pub recipient_ledger_asset_id: String,
    /// Asset size (used to create and re-create the asset)
    pub asset_size: u64,
    /// Maximum retries the client is willing to perform
    pub max_retries: u32,
    /// Maximum round-trip timeout in milliseconds
    pub max_timeout: u64,
    /// Backup gateways the client allows
    #[serde(default)]
    pub backup_gateways_allowed: Vec<String>,
    /// Client signature
    pub client_signature: String,
}

/// Transfer initialization ack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferInitializationResponse {
    /// Message type
    pub message_type: String,
    /// Session ID
    #[serde(rename = "sessionID")]
    pub session_id: String,
    /// Echoed sequence number
    pub sequence_number: u64,
    /// Hash of the initialization request
    pub initial_request_message_hash: String,
    /// Time the server processed the request
    pub timestamp: DateTime<Utc>,
    /// Server gateway public key
    pub server_identity_pubkey: String,
    /// Server signature
    pub server_signature: String,
}

odap_message!(
    TransferInitializationRequest,
    message_type::INIT_REQUEST,
    Phase::Initiation,
    client_signature,
    "clientSignature"
);
odap_message!(
    TransferInitializationResponse,
    message_type::INIT_RESPONSE,
    Phase::Initiation,
    server_signature,
    "serverSignature"
);
phase_request!(
    TransferInitializationRequest,
    TransferInitializationResponse,
    source_gateway_pubkey,
    recipient_gateway_pubkey
);

impl PhaseAck for TransferInitializationResponse {
    fn request_hash(&self) -> &str {
        &self.initial_request_message_hash
    }

    fn client_pubkey(&self) -> Option<&str> {
        None
    }

    fn server_pubkey(&self) -> &str {
        &self.server_identity_pubkey
    }
}

// =========================================================================
// PHASE 2: TRANSFER COMMENCE
// =========================================================================

/// Transfer commence request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferCommenceRequest {
    /// Message type
    pub message_type: String,
    /// Session ID
    #[serde(rename = "sessionID")]
    pub session_id: String,
    /// Sequence number
    pub sequence_number: u64,
    /// Asset originator public key
    pub originator_pubkey: String,
    /// Asset beneficiary public key
    pub beneficiary_pubkey: String,
    /// Sender DLT system
    pub sender_dlt_system: String,
    /// Recipient DLT system
    pub recipient_dlt_system: String,
    /// Client gateway public key
    pub client_identity_pubkey: String,
    /// Server gateway public key
    pub server_identity_pubkey: String,
    /// Hash of the asset profile sent at initialization
    pub hash_asset_profile: String,
    /// Hash of the initialization ack
    pub hash_prev_message: String,
    /// Client signature
    pub client_signature: String,
}

/// Transfer commence ack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferCommenceResponse {
    /// Message type
    pub message_type: String,
    /// Session ID
    #[serde(rename = "sessionID")]
    pub session_id: String,
    /// Echoed sequence number
    pub sequence_number: u64,
    /// Client gateway public key
    pub client_identity_pubkey: String,
    /// Server gateway public key
    pub server_identity_pubkey: String,
    /// Hash of the commence request
    pub hash_commence_request: String,
    /// Server signature
    pub server_signature: String,
}

odap_message!(
    TransferCommenceRequest,
    message_type::COMMENCE_REQUEST,
    Phase::Commence,
    client_signature,
    "clientSignature"
);
odap_message!(
    TransferCommenceResponse,
    message_type::COMMENCE_RESPONSE,
    Phase::Commence,
    server_signature,
    "serverSignature"
);
phase_request!(
    TransferCommenceRequest,
    TransferCommenceResponse,
    client_identity_pubkey,
    server_identity_pubkey
);
phase_ack!(TransferCommenceResponse, hash_commence_request);

// =========================================================================
// PHASE 3: LOCK EVIDENCE
// =========================================================================

/// Lock evidence request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockEvidenceRequest {
    /// Message type
    pub message_type: String,
    /// Session ID
    #[serde(rename = "sessionID")]
    pub session_id: String,
    /// Sequence number
    pub sequence_number: u64,
    /// Client gateway public key
    pub client_identity_pubkey: String,
    /// Server gateway public key
    pub server_identity_pubkey: String,
    /// Receipt of the source-ledger lock, as JSON
    pub lock_evidence_claim: String,
    /// Instant after which the claim is no longer valid
    pub lock_evidence_expiration: DateTime<Utc>,
    /// Hash of the commence ack
    pub hash_commence_ack_request: String,
    /// Client signature
    pub client_signature: String,
}

/// Lock evidence ack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockEvidenceResponse {
    /// Message type
    pub message_type: String,
    /// Session ID
    #[serde(rename = "sessionID")]
    pub session_id: String,
    /// Echoed sequence number
    pub sequence_number: u64,
    /// Client gateway public key
    pub client_identity_pubkey: String,
    /// Server gateway public key
    pub server_identity_pubkey: String,
    /// Hash of the lock evidence request
    pub hash_lock_evidence_request: String,
    /// Server signature
    pub server_signature: String,
}

odap_message!(
    LockEvidenceRequest,
    message_type::LOCK_EVIDENCE_REQUEST,
    Phase::LockEvidence,
    client_signature,
    "clientSignature"
);
odap_message!(
    LockEvidenceResponse,
    message_type::LOCK_EVIDENCE_RESPONSE,
    Phase::LockEvidence,
    server_signature,
    "serverSignature"
);
phase_request!(
    LockEvidenceRequest,
    LockEvidenceResponse,
    client_identity_pubkey,
    server_identity_pubkey
);
phase_ack!(LockEvidenceResponse, hash_lock_evidence_request);

// =========================================================================
// PHASE 4: COMMIT PREPARATION
// =========================================================================

/// Commit preparation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitPreparationRequest {
    /// Message type
    pub message_type: String,
    /// Session ID
    #[serde(rename = "sessionID")]
    pub session_id: String,
    /// Sequence number
    pub sequence_number: u64,
    /// Client gateway public key
    pub client_identity_pubkey: String,
    /// Server gateway public key
    pub server_identity_pubkey: String,
    /// Hash of the lock evidence ack
    pub hash_lock_evidence_ack: String,
    /// Client signature
    pub client_signature: String,
}

/// Commit preparation ack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitPreparationResponse {
    /// Message type
    pub message_type: String,
    /// Session ID
    #[serde(rename = "sessionID")]
    pub session_id: String,
    /// Echoed sequence number
    pub sequence_number: u64,
    /// Client gateway public key
    pub client_identity_pubkey: String,
    /// Server gateway public key
    pub server_identity_pubkey: String,
    /// Hash of the commit preparation request
    pub hash_commit_prep: String,
    /// Server signature
    pub server_signature: String,
}

odap_message!(
    CommitPreparationRequest,
    message_type::COMMIT_PREPARE_REQUEST,
    Phase::CommitPreparation,
    client_signature,
    "clientSignature"
);
odap_message!(
    CommitPreparationResponse,
    message_type::COMMIT_PREPARE_RESPONSE,
    Phase::CommitPreparation,
    server_signature,
    "serverSignature"
);
phase_request!(
    CommitPreparationRequest,
    CommitPreparationResponse,
    client_identity_pubkey,
    server_identity_pubkey
);
phase_ack!(CommitPreparationResponse, hash_commit_prep);

// =========================================================================
// PHASE 5: COMMIT FINAL
// =========================================================================

/// Commit final request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitFinalRequest {
    /// Message type
    pub message_type: String,
    /// Session ID
    #[serde(rename = "sessionID")]
    pub session_id: String,
    /// Sequence number
    pub sequence_number: u64,
    /// Client gateway public key
    pub client_identity_pubkey: String,
    /// Server gateway public key
    pub server_identity_pubkey: String,
    /// Receipt of the source-ledger delete, as JSON
    pub commit_final_claim: String,
    /// Hash of the commit preparation ack
    pub hash_commit_prepare_ack: String,
    /// Client signature
    pub client_signature: String,
}

/// Commit final ack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitFinalResponse {
    /// Message type
    pub message_type: String,
    /// Session ID
    #[serde(rename = "sessionID")]
    pub session_id: String,
    /// Echoed sequence number
    pub sequence_number: u64,
    /// Client gateway public key
    pub client_identity_pubkey: String,
    /// Server gateway public key
    pub server_identity_pubkey: String,
    /// Receipt of the recipient-ledger create, as JSON
    pub commit_acknowledgement_claim: String,
    /// Hash of the commit final request
    pub hash_commit_final: String,
    /// Server signature
    pub server_signature: String,
}

odap_message!(
    CommitFinalRequest,
    message_type::COMMIT_FINAL_REQUEST,
    Phase::CommitFinal,
    client_signature,
    "clientSignature"
);
odap_message!(
    CommitFinalResponse,
    message_type::COMMIT_FINAL_RESPONSE,
    Phase::CommitFinal,
    server_signature,
    "serverSignature"
);
phase_request!(
    CommitFinalRequest,
    CommitFinalResponse,
    client_identity_pubkey,
    server_identity_pubkey
);
phase_ack!(CommitFinalResponse, hash_commit_final);

// =========================================================================
// PHASE 6: TRANSFER COMPLETE
// =========================================================================

/// Transfer complete request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferCompleteRequest {
    /// Message type
    pub message_type: String,
    /// Session ID
    #[serde(rename = "sessionID")]
    pub session_id: String,
    /// Sequence number
    pub sequence_number: u64,
    /// Client gateway public key
    pub client_identity_pubkey: String,
    /// Server gateway public key
    pub server_identity_pubkey: String,
    /// Hash of the commit final ack
    pub hash_commit_final_ack: String,
    /// Hash of the commence request
    pub hash_transfer_commence: String,
    /// Client signature
    pub client_signature: String,
}

/// Transfer complete ack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferCompleteResponse {
    /// Message type
    pub message_type: String,
    /// Session ID
    #[serde(rename = "sessionID")]
    pub session_id: String,
    /// Echoed sequence number
    pub sequence_number: u64,
    /// Client gateway public key
    pub client_identity_pubkey: String,
    /// Server gateway public key
    pub server_identity_pubkey: String,
    /// Hash of the transfer complete request
    pub hash_transfer_complete: String,
    /// Server signature
    pub server_signature: String,
}

odap_message!(
    TransferCompleteRequest,
    message_type::TRANSFER_COMPLETE_REQUEST,
    Phase::Complete,
    client_signature,
    "clientSignature"
);
odap_message!(
    TransferCompleteResponse,
    message_type::TRANSFER_COMPLETE_RESPONSE,
    Phase::Complete,
    server_signature,
    "serverSignature"
);
phase_request!(
    TransferCompleteRequest,
    TransferCompleteResponse,
    client_identity_pubkey,
    server_identity_pubkey
);
phase_ack!(TransferCompleteResponse, hash_transfer_complete);
