//! Lock evidence (phase 3)

use super::{check_claim, check_message_type, check_request_signature};
use crate::{
    gateway::Gateway,
    session::{require, SessionData},
    Error, Result,
};
use chrono::Utc;
use ledger_adapters::LedgerOperation;
use odap_protocol::{
    canonical::message_hash, message_type, LockEvidenceRequest, LockEvidenceResponse, Phase,
};

impl Gateway {
    /// Handle a lock evidence request.
    ///
    /// The claim must be a successful lock receipt for the source asset on
    /// the client's ledger, and must not have expired.
    pub async fn on_lock_evidence(
        &self,
        request: LockEvidenceRequest,
    ) -> Result<LockEvidenceResponse> {
        let handle = self
            .sessions
            .open_for(&request.session_id, Phase::LockEvidence)
            .await?;
        let mut session = handle.lock().await;
        let mut working = session.clone();
        let result = self.lock_evidence(&request, &mut working);
        self.conclude(&mut session, working, result).await
    }

    fn lock_evidence(
        &self,
        request: &LockEvidenceRequest,
        session: &mut SessionData,
    ) -> Result<LockEvidenceResponse> {
        let phase = Phase::LockEvidence;
        check_message_type(request)?;
        check_request_signature(request)?;
        self.check_continuity(
            session,
            request,
            "commenceAckHash",
            &session.commence_ack_hash,
            &request.hash_commence_ack_request,
        )?;

        if request.lock_evidence_expiration <= Utc::now() {
            return Err(Error::InvalidClaim {
                phase,
                reason: format!(
                    "lock evidence expired at {}",
                    request.lock_evidence_expiration
                ),
            });
        }

        check_claim(
            phase,
            &request.lock_evidence_claim,
            LedgerOperation::Lock,
            require(&session.client_dlt_system, phase, "clientDltSystem")?,
            require(&session.source_ledger_asset_id, phase, "sourceLedgerAssetId")?,
        )?;
        session.lock_evidence_claim = Some(request.lock_evidence_claim.clone());

        let request_hash = message_hash(request)?;
        let ack = LockEvidenceResponse {
            message_type: message_type::LOCK_EVIDENCE_RESPONSE.to_string(),
            session_id: request.session_id.clone(),
            sequence_number: request.sequence_number,
            client_identity_pubkey: request.client_identity_pubkey.clone(),
            server_identity_pubkey: self.public_key_hex().to_string(),
            hash_lock_evidence_request: request_hash.clone(),
            server_signature: String::new(),
        };

        let (ack, ack_hash) = self.accept(session, request, ack)?;
        session.lock_evidence_req_hash = Some(request_hash);
        session.lock_evidence_ack_hash = Some(ack_hash);
        Ok(ack)
    }
}
