//! Transfer initialization (phase 1)

use super::{check_message_type, check_request_signature};
use crate::{audit::AuditKind, gateway::Gateway, session::SessionData, Error, Result};
use chrono::Utc;
use odap_protocol::{
    canonical::message_hash, message_type, OdapMessage, Phase, TransferInitializationRequest,
    TransferInitializationResponse,
};
use tracing::{info, warn};

/// Phases after initiation, each taking the next sequence number
const FOLLOWING_PHASES: u64 = 5;

impl Gateway {
    /// Handle a transfer initialization request.
    ///
    /// Creates the session on success. A rejected initialization leaves no
    /// session behind, so there is nothing to revert.
    pub async fn on_transfer_initialization(
        &self,
        request: TransferInitializationRequest,
    ) -> Result<TransferInitializationResponse> {
        let phase = Phase::Initiation;
        let result = self.open_session(&request).await;
        self.metrics
            .record_phase("server", &phase.to_string(), result.is_ok());

        match &result {
            Ok(_) => info!(
                "Session {}: initialized ({} -> {})",
                request.session_id,
                request.source_gateway_dlt_system,
                request.recipient_gateway_dlt_system
            ),
            Err(e) => warn!("Session {}: initialization rejected: {}", request.session_id, e),
        }
        result
    }

    async fn open_session(
        &self,
        request: &TransferInitializationRequest,
    ) -> Result<TransferInitializationResponse> {
        let phase = Phase::Initiation;
        check_message_type(request)?;
        check_request_signature(request)?;

        if request.sequence_number > u64::MAX - FOLLOWING_PHASES {
            return Err(Error::Continuity {
                phase,
                reason: format!(
                    "sequence number {} leaves no room for the remaining phases",
                    request.sequence_number
                ),
            });
        }

        if request.recipient_gateway_pubkey != self.public_key_hex() {
            return Err(Error::PublicKeyMismatch {
                phase,
                role: "server",
                expected: self.public_key_hex().to_string(),
                actual: request.recipient_gateway_pubkey.clone(),
            });
        }

        for dlt in [
            &request.source_gateway_dlt_system,
            &request.recipient_gateway_dlt_system,
        ] {
            if !self.config.supports(dlt) {
                return Err(Error::UnsupportedDlt {
                    phase,
                    dlt: dlt.clone(),
                });
            }
        }

        let asset_profile = &request.payload_profile.asset_profile;
        let now = Utc::now();
        if asset_profile.is_expired_at(now) {
            return Err(Error::AssetExpired {
                phase,
                expired_at: asset_profile.expiration_date,
            });
        }

        if self.sessions.open(&request.session_id).await.is_some() {
            return Err(Error::DuplicateSession {
                session_id: request.session_id.clone(),
            });
        }

        let mut session = SessionData::new(request.session_id.clone());
        session.version = request.version.clone();
        session.last_sequence_number = request.sequence_number;
        session.asset_profile = Some(asset_profile.clone());
        session.payload_profile = Some(request.payload_profile.clone());
        session.source_ledger_asset_id = Some(request.source_ledger_asset_id.clone());
        session.recipient_ledger_asset_id = Some(request.recipient_ledger_asset_id.clone());
        session.asset_size = request.asset_size;
        session.max_retries = request.max_retries;
        session.max_timeout = request.max_timeout;
        session.allowed_source_backup_gateways = request.backup_gateways_allowed.clone();
        session.source_gateway_pubkey = Some(request.source_gateway_pubkey.clone());
        session.recipient_gateway_pubkey = Some(request.recipient_gateway_pubkey.clone());
        session.client_dlt_system = Some(request.source_gateway_dlt_system.clone());
        session.server_dlt_system = Some(request.recipient_gateway_dlt_system.clone());
        session.last_message_received_at = Some(now);

        let request_hash = message_hash(request)?;
        let mut ack = TransferInitializationResponse {
            message_type: message_type::INIT_RESPONSE.to_string(),
            session_id: request.session_id.clone(),
            sequence_number: request.sequence_number,
            initial_request_message_hash: request_hash.clone(),
            timestamp: now,
            server_identity_pubkey: self.public_key_hex().to_string(),
            server_signature: String::new(),
        };
        self.keys.sign_message(&mut ack)?;

        session.initialization_request_hash = Some(request_hash);
        session.initialization_response_hash = Some(message_hash(&ack)?);
        let signatures = session.signatures_mut(phase);
        signatures.client = Some(request.signature().to_string());
        signatures.server = Some(ack.signature().to_string());

        self.audit_phase(&mut session, phase, AuditKind::Done);
        self.audit_phase(&mut session, phase, AuditKind::Ack);

        // Loses the race if another request created the id meanwhile
        self.sessions.create(session).await?;
        Ok(ack)
    }
}
