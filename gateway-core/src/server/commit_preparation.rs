//! Commit preparation (phase 4)

use super::{check_message_type, check_request_signature};
use crate::{gateway::Gateway, session::SessionData, Result};
use odap_protocol::{
    canonical::message_hash, message_type, CommitPreparationRequest, CommitPreparationResponse,
    Phase,
};

impl Gateway {
    /// Handle a commit preparation request
    pub async fn on_commit_preparation(
        &self,
        request: CommitPreparationRequest,
    ) -> Result<CommitPreparationResponse> {
        let handle = self
            .sessions
            .open_for(&request.session_id, Phase::CommitPreparation)
            .await?;
        let mut session = handle.lock().await;
        let mut working = session.clone();
        let result = self.commit_preparation(&request, &mut working);
        self.conclude(&mut session, working, result).await
    }

    fn commit_preparation(
        &self,
        request: &CommitPreparationRequest,
        session: &mut SessionData,
    ) -> Result<CommitPreparationResponse> {
        check_message_type(request)?;
        check_request_signature(request)?;
        self.check_continuity(
            session,
            request,
            "lockEvidenceAckHash",
            &session.lock_evidence_ack_hash,
            &request.hash_lock_evidence_ack,
        )?;

        let request_hash = message_hash(request)?;
        let ack = CommitPreparationResponse {
            message_type: message_type::COMMIT_PREPARE_RESPONSE.to_string(),
            session_id: request.session_id.clone(),
            sequence_number: request.sequence_number,
            client_identity_pubkey: request.client_identity_pubkey.clone(),
            server_identity_pubkey: self.public_key_hex().to_string(),
            hash_commit_prep: request_hash.clone(),
            server_signature: String::new(),
        };

        let (ack, ack_hash) = self.accept(session, request, ack)?;
        session.commit_prepare_req_hash = Some(request_hash);
        session.commit_prepare_ack_hash = Some(ack_hash);
        Ok(ack)
    }
}
