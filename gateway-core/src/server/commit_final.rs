//! Commit final (phase 5)
//!
//! The only phase with a server-side ledger action: once the client proves
//! the source asset is deleted, the asset is created on the recipient
//! ledger and the receipt goes back as the commit acknowledgement claim.

use super::{check_claim, check_message_type, check_request_signature};
use crate::{
    gateway::Gateway,
    session::{require, SessionData},
    Error, Result,
};
use ledger_adapters::{LedgerAction, LedgerOperation};
use odap_protocol::{
    canonical::message_hash, message_type, CommitFinalRequest, CommitFinalResponse, Phase,
};

impl Gateway {
    /// Handle a commit final request
    pub async fn on_commit_final(&self, request: CommitFinalRequest) -> Result<CommitFinalResponse> {
        let handle = self
            .sessions
            .open_for(&request.session_id, Phase::CommitFinal)
            .await?;
        let mut session = handle.lock().await;
        let mut working = session.clone();
        let result = self.commit_final(&request, &mut working).await;
        self.conclude(&mut session, working, result).await
    }

    async fn commit_final(
        &self,
        request: &CommitFinalRequest,
        session: &mut SessionData,
    ) -> Result<CommitFinalResponse> {
        let phase = Phase::CommitFinal;
        check_message_type(request)?;
        check_request_signature(request)?;
        self.check_continuity(
            session,
            request,
            "commitPrepareAckHash",
            &session.commit_prepare_ack_hash,
            &request.hash_commit_prepare_ack,
        )?;

        check_claim(
            phase,
            &request.commit_final_claim,
            LedgerOperation::Delete,
            require(&session.client_dlt_system, phase, "clientDltSystem")?,
            require(&session.source_ledger_asset_id, phase, "sourceLedgerAssetId")?,
        )?;
        session.commit_final_claim = Some(request.commit_final_claim.clone());

        let server_dlt = require(&session.server_dlt_system, phase, "serverDltSystem")?.to_string();
        let asset_id =
            require(&session.recipient_ledger_asset_id, phase, "recipientLedgerAssetId")?
                .to_string();
        let size = session.asset_size;
        let receipt = self
            .ledger_action(
                session,
                phase,
                &server_dlt,
                LedgerAction::Create { asset_id, size },
            )
            .await?;
        let claim = receipt
            .to_claim()
            .map_err(|source| Error::Ledger { phase, source })?;
        session.commit_acknowledgement_claim = Some(claim.clone());

        let request_hash = message_hash(request)?;
        let ack = CommitFinalResponse {
            message_type: message_type::COMMIT_FINAL_RESPONSE.to_string(),
            session_id: request.session_id.clone(),
            sequence_number: request.sequence_number,
            client_identity_pubkey: request.client_identity_pubkey.clone(),
            server_identity_pubkey: self.public_key_hex().to_string(),
            commit_acknowledgement_claim: claim,
            hash_commit_final: request_hash.clone(),
            server_signature: String::new(),
        };

        let (ack, ack_hash) = self.accept(session, request, ack)?;
        session.commit_final_req_hash = Some(request_hash);
        session.commit_final_ack_hash = Some(ack_hash);
        Ok(ack)
    }
}
