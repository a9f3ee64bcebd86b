//! Client orchestrator
//!
//! Drives the six phases from the initiating gateway. Each ack is checked
//! before anything depends on it: message type, session id and sequence
//! echo, then the echoed request hash, the echoed participant keys, and
//! finally the server signature. The source asset is locked after the
//! commence ack and deleted after the commit preparation ack. Any failure
//! reverts the local session before the error is returned.

mod channel;

pub use channel::{Dispatch, GatewayChannel, LocalChannel};

use crate::{
    audit::AuditKind,
    gateway::Gateway,
    server::{check_claim, check_message_type},
    session::{require, SessionData},
    store::SessionHandle,
    Error, Result,
};
use chrono::{Duration as ChronoDuration, Utc};
use ledger_adapters::{LedgerAction, LedgerOperation, Receipt};
use odap_protocol::{
    canonical::{canonical_hash, message_hash},
    crypto::verify_message,
    message_type, AssetProfile, CommitFinalRequest, CommitPreparationRequest, LockEvidenceRequest,
    OdapMessage, PayloadProfile, Phase, PhaseAck, PhaseRequest, TransferCommenceRequest,
    TransferCompleteRequest, TransferInitializationRequest,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Transfer to drive from this gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    /// Session id to use; a UUID is generated when unset
    #[serde(default)]
    pub session_id: Option<String>,
    /// Asset profile
    pub asset_profile: AssetProfile,
    /// DLT holding the asset (served by this gateway)
    pub source_dlt: String,
    /// DLT receiving the asset (served by the counterpart)
    pub recipient_dlt: String,
    /// Asset id on the source DLT
    pub source_ledger_asset_id: String,
    /// Asset id on the recipient DLT
    pub recipient_ledger_asset_id: String,
    /// Asset size
    pub asset_size: u64,
    /// Counterpart gateway key
    pub recipient_gateway_pubkey: String,
    /// Asset originator
    pub originator_pubkey: String,
    /// Asset beneficiary
    pub beneficiary_pubkey: String,
}

/// Completed transfer
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    /// Session ID
    pub session_id: String,
    /// Final session state on this gateway
    pub session: SessionData,
}

/// Verified round trip
struct Acked<A> {
    request_hash: String,
    ack: A,
    ack_hash: String,
}

/// Check an ack against the request it answers
pub(crate) fn verify_ack<R: PhaseRequest>(
    request: &R,
    request_hash: &str,
    ack: &R::Ack,
) -> Result<()> {
    let phase = R::PHASE;
    check_message_type(ack)?;

    if ack.session_id() != request.session_id() {
        return Err(Error::Continuity {
            phase,
            reason: format!(
                "ack for session {}, expected {}",
                ack.session_id(),
                request.session_id()
            ),
        });
    }
    if ack.sequence_number() != request.sequence_number() {
        return Err(Error::SequenceMismatch {
            phase,
            expected: request.sequence_number(),
            actual: ack.sequence_number(),
        });
    }
    if ack.request_hash() != request_hash {
        return Err(Error::HashMismatch {
            phase,
            field: "requestHash",
            expected: request_hash.to_string(),
            actual: ack.request_hash().to_string(),
        });
    }
    if let Some(client) = ack.client_pubkey() {
        if client != request.client_pubkey() {
            return Err(Error::PublicKeyMismatch {
                phase,
                role: "client",
                expected: request.client_pubkey().to_string(),
                actual: client.to_string(),
            });
        }
    }
    if ack.server_pubkey() != request.server_pubkey() {
        return Err(Error::PublicKeyMismatch {
            phase,
            role: "server",
            expected: request.server_pubkey().to_string(),
            actual: ack.server_pubkey().to_string(),
        });
    }
    if !verify_message(ack, request.server_pubkey()) {
        return Err(Error::SignatureInvalid {
            phase,
            signer: "server",
        });
    }
    Ok(())
}

fn claim_of(phase: Phase, receipt: &Receipt) -> Result<String> {
    receipt
        .to_claim()
        .map_err(|source| Error::Ledger { phase, source })
}

impl Gateway {
    /// Drive a full transfer against the gateway behind `channel`.
    ///
    /// The local session exists from the moment the initialization ack is
    /// verified. If a later phase fails, the session is reverted and the
    /// phase's error is returned.
    pub async fn transfer(
        &self,
        request: TransferRequest,
        channel: &dyn GatewayChannel,
    ) -> Result<TransferOutcome> {
        if !self.config.supports(&request.recipient_dlt) {
            return Err(Error::UnsupportedDlt {
                phase: Phase::Initiation,
                dlt: request.recipient_dlt,
            });
        }
        if !self.adapters.contains(&request.source_dlt).await {
            return Err(Error::UnsupportedDlt {
                phase: Phase::Initiation,
                dlt: request.source_dlt,
            });
        }

        let handle = self.initiate(&request, channel).await?;
        let mut session = handle.lock().await;
        match self.drive(&mut session, &request, channel).await {
            Ok(()) => {
                self.sessions.save(&session).await?;
                info!("Session {}: transfer completed", session.id);
                Ok(TransferOutcome {
                    session_id: session.id.clone(),
                    session: session.clone(),
                })
            }
            Err(err) => Err(self.unwind(&mut session, err).await),
        }
    }

    async fn initiate(
        &self,
        request: &TransferRequest,
        channel: &dyn GatewayChannel,
    ) -> Result<SessionHandle> {
        let phase = Phase::Initiation;
        let message = TransferInitializationRequest {
            message_type: message_type::INIT_REQUEST.to_string(),
            session_id: request
                .session_id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            version: self.config.protocol_version.clone(),
            sequence_number: u64::from(rand::random::<u32>()),
            payload_profile: PayloadProfile {
                asset_profile: request.asset_profile.clone(),
                capabilities: None,
            },
            application_profile: String::new(),
            logging_profile: String::new(),
            access_control_profile: String::new(),
            source_gateway_pubkey: self.public_key_hex().to_string(),
            source_gateway_dlt_system: request.source_dlt.clone(),
            recipient_gateway_pubkey: request.recipient_gateway_pubkey.clone(),
            recipient_gateway_dlt_system: request.recipient_dlt.clone(),
            source_ledger_asset_id: request.source_ledger_asset_id.clone(),
            recipient_ledger_asset_id: request.recipient_ledger_asset_id.clone(),
            asset_size: request.asset_size,
            max_retries: self.config.max_retries,
            max_timeout: self.config.phase_timeout_ms.unwrap_or_default(),
            backup_gateways_allowed: self.config.backup_gateways.clone(),
            client_signature: String::new(),
        };

        let (message, request_hash, ack) = self.signed_exchange(message, channel).await?;

        let mut session = SessionData::new(message.session_id.clone());
        session.version = message.version.clone();
        session.last_sequence_number = message.sequence_number;
        session.asset_profile = Some(request.asset_profile.clone());
        session.payload_profile = Some(message.payload_profile.clone());
        session.source_ledger_asset_id = Some(message.source_ledger_asset_id.clone());
        session.recipient_ledger_asset_id = Some(message.recipient_ledger_asset_id.clone());
        session.asset_size = message.asset_size;
        session.max_retries = message.max_retries;
        session.max_timeout = message.max_timeout;
        session.allowed_source_backup_gateways = message.backup_gateways_allowed.clone();
        session.source_gateway_pubkey = Some(message.source_gateway_pubkey.clone());
        session.recipient_gateway_pubkey = Some(message.recipient_gateway_pubkey.clone());
        session.client_dlt_system = Some(message.source_gateway_dlt_system.clone());
        session.server_dlt_system = Some(message.recipient_gateway_dlt_system.clone());
        session.last_message_received_at = Some(Utc::now());

        session.initialization_request_hash = Some(request_hash);
        session.initialization_response_hash = Some(message_hash(&ack)?);
        let signatures = session.signatures_mut(phase);
        signatures.client = Some(message.signature().to_string());
        signatures.server = Some(ack.signature().to_string());

        self.audit_phase(&mut session, phase, AuditKind::Done);
        self.audit_phase(&mut session, phase, AuditKind::Ack);

        info!(
            "Session {}: initialized with {}",
            session.id, request.recipient_gateway_pubkey
        );
        self.sessions.create(session).await
    }

    async fn drive(
        &self,
        session: &mut SessionData,
        request: &TransferRequest,
        channel: &dyn GatewayChannel,
    ) -> Result<()> {
        let client_key = self.public_key_hex().to_string();
        let server_key = request.recipient_gateway_pubkey.clone();

        // Phase 2: commence, then lock the source asset
        let profile = session
            .asset_profile
            .as_ref()
            .ok_or(Error::SessionIncomplete {
                phase: Phase::Commence,
                field: "assetProfile",
            })?;
        let commence = TransferCommenceRequest {
            message_type: message_type::COMMENCE_REQUEST.to_string(),
            session_id: session.id.clone(),
            sequence_number: session.last_sequence_number + 1,
            originator_pubkey: request.originator_pubkey.clone(),
            beneficiary_pubkey: request.beneficiary_pubkey.clone(),
            sender_dlt_system: request.source_dlt.clone(),
            recipient_dlt_system: request.recipient_dlt.clone(),
            client_identity_pubkey: client_key.clone(),
            server_identity_pubkey: server_key.clone(),
            hash_asset_profile: canonical_hash(profile)?,
            hash_prev_message: require(
                &session.initialization_response_hash,
                Phase::Commence,
                "initializationResponseHash",
            )?
            .to_string(),
            client_signature: String::new(),
        };
        session.originator_pubkey = Some(request.originator_pubkey.clone());
        session.beneficiary_pubkey = Some(request.beneficiary_pubkey.clone());
        session.client_identity_pubkey = Some(client_key.clone());
        session.server_identity_pubkey = Some(server_key.clone());

        let acked = self.round_trip(session, commence, channel).await?;
        let commence_req_hash = acked.request_hash.clone();
        session.commence_req_hash = Some(acked.request_hash);
        session.commence_ack_hash = Some(acked.ack_hash.clone());

        let receipt = self
            .ledger_action(
                session,
                Phase::Commence,
                &request.source_dlt,
                LedgerAction::Lock {
                    asset_id: request.source_ledger_asset_id.clone(),
                },
            )
            .await?;
        let lock_claim = claim_of(Phase::Commence, &receipt)?;
        session.lock_evidence_claim = Some(lock_claim.clone());

        // Phase 3: lock evidence
        let lock = LockEvidenceRequest {
            message_type: message_type::LOCK_EVIDENCE_REQUEST.to_string(),
            session_id: session.id.clone(),
            sequence_number: session.last_sequence_number + 1,
            client_identity_pubkey: client_key.clone(),
            server_identity_pubkey: server_key.clone(),
            lock_evidence_claim: lock_claim,
            lock_evidence_expiration: Utc::now()
                + ChronoDuration::seconds(self.config.lock_evidence_validity_secs),
            hash_commence_ack_request: acked.ack_hash,
            client_signature: String::new(),
        };
        let acked = self.round_trip(session, lock, channel).await?;
        session.lock_evidence_req_hash = Some(acked.request_hash);
        session.lock_evidence_ack_hash = Some(acked.ack_hash.clone());

        // Phase 4: commit preparation, then delete the source asset
        let prepare = CommitPreparationRequest {
            message_type: message_type::COMMIT_PREPARE_REQUEST.to_string(),
            session_id: session.id.clone(),
            sequence_number: session.last_sequence_number + 1,
            client_identity_pubkey: client_key.clone(),
            server_identity_pubkey: server_key.clone(),
            hash_lock_evidence_ack: acked.ack_hash,
            client_signature: String::new(),
        };
        let acked = self.round_trip(session, prepare, channel).await?;
        session.commit_prepare_req_hash = Some(acked.request_hash);
        session.commit_prepare_ack_hash = Some(acked.ack_hash.clone());

        let receipt = self
            .ledger_action(
                session,
                Phase::CommitPreparation,
                &request.source_dlt,
                LedgerAction::Delete {
                    asset_id: request.source_ledger_asset_id.clone(),
                },
            )
            .await?;
        let final_claim = claim_of(Phase::CommitPreparation, &receipt)?;
        session.commit_final_claim = Some(final_claim.clone());

        // Phase 5: commit final; the ack carries the recipient's create receipt
        let commit = CommitFinalRequest {
            message_type: message_type::COMMIT_FINAL_REQUEST.to_string(),
            session_id: session.id.clone(),
            sequence_number: session.last_sequence_number + 1,
            client_identity_pubkey: client_key.clone(),
            server_identity_pubkey: server_key.clone(),
            commit_final_claim: final_claim,
            hash_commit_prepare_ack: acked.ack_hash,
            client_signature: String::new(),
        };
        let acked = self.round_trip(session, commit, channel).await?;
        check_claim(
            Phase::CommitFinal,
            &acked.ack.commit_acknowledgement_claim,
            LedgerOperation::Create,
            &request.recipient_dlt,
            &request.recipient_ledger_asset_id,
        )?;
        session.commit_acknowledgement_claim = Some(acked.ack.commit_acknowledgement_claim);
        session.commit_final_req_hash = Some(acked.request_hash);
        session.commit_final_ack_hash = Some(acked.ack_hash.clone());

        // Phase 6: transfer complete
        let complete = TransferCompleteRequest {
            message_type: message_type::TRANSFER_COMPLETE_REQUEST.to_string(),
            session_id: session.id.clone(),
            sequence_number: session.last_sequence_number + 1,
            client_identity_pubkey: client_key,
            server_identity_pubkey: server_key,
            hash_commit_final_ack: acked.ack_hash,
            hash_transfer_commence: commence_req_hash,
            client_signature: String::new(),
        };
        let acked = self.round_trip(session, complete, channel).await?;
        session.transfer_complete_req_hash = Some(acked.request_hash);
        session.transfer_complete_ack_hash = Some(acked.ack_hash);

        Ok(())
    }

    /// One phase: send `request`, verify the ack, and advance `session`
    async fn round_trip<R: Dispatch>(
        &self,
        session: &mut SessionData,
        request: R,
        channel: &dyn GatewayChannel,
    ) -> Result<Acked<R::Ack>> {
        let phase = R::PHASE;
        self.audit_phase(session, phase, AuditKind::Init);

        let (request, request_hash, ack) = self.signed_exchange(request, channel).await?;

        let signatures = session.signatures_mut(phase);
        signatures.client = Some(request.signature().to_string());
        signatures.server = Some(ack.signature().to_string());
        session.last_sequence_number = request.sequence_number();
        session.last_message_received_at = Some(Utc::now());

        let ack_hash = message_hash(&ack)?;
        session.state.transition(phase.reached_state())?;
        self.audit_phase(session, phase, AuditKind::Done);

        Ok(Acked {
            request_hash,
            ack,
            ack_hash,
        })
    }

    /// Sign, send and verify. Returns the signed request, its hash and the
    /// verified ack.
    async fn signed_exchange<R: Dispatch>(
        &self,
        mut request: R,
        channel: &dyn GatewayChannel,
    ) -> Result<(R, String, R::Ack)> {
        let phase = R::PHASE;
        let result = async move {
            self.keys.sign_message(&mut request)?;
            let request_hash = message_hash(&request)?;
            let ack = self.exchange(request.clone(), channel).await?;
            verify_ack(&request, &request_hash, &ack)?;
            Ok::<_, Error>((request, request_hash, ack))
        }
        .await;

        self.metrics
            .record_phase("client", &phase.to_string(), result.is_ok());
        if let Err(e) = &result {
            warn!("{} round trip failed: {}", phase, e);
        }
        result
    }

    /// Send over the channel, under the configured deadline if any
    async fn exchange<R: Dispatch>(
        &self,
        request: R,
        channel: &dyn GatewayChannel,
    ) -> Result<R::Ack> {
        let phase = R::PHASE;
        let call = request.dispatch(channel);
        let result = match self.config.phase_timeout_ms {
            Some(millis) => tokio::time::timeout(Duration::from_millis(millis), call)
                .await
                .map_err(|_| Error::Timeout { phase, millis })?,
            None => call.await,
        };

        result.map_err(|e| match e {
            Error::Transport { .. } | Error::Timeout { .. } => e,
            other => Error::Transport {
                phase,
                reason: other.to_string(),
            },
        })
    }
}
