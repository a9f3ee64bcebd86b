//! Transfer complete (phase 6)

use super::{check_message_type, check_request_signature};
use crate::{
    gateway::Gateway,
    session::{require, SessionData},
    Error, Result,
};
use odap_protocol::{
    canonical::message_hash, message_type, Phase, TransferCompleteRequest,
    TransferCompleteResponse,
};

impl Gateway {
    /// Handle a transfer complete request
    pub async fn on_transfer_complete(
        &self,
        request: TransferCompleteRequest,
    ) -> Result<TransferCompleteResponse> {
        let handle = self
            .sessions
            .open_for(&request.session_id, Phase::Complete)
            .await?;
        let mut session = handle.lock().await;
        let mut working = session.clone();
        let result = self.transfer_complete(&request, &mut working);
        self.conclude(&mut session, working, result).await
    }

    fn transfer_complete(
        &self,
        request: &TransferCompleteRequest,
        session: &mut SessionData,
    ) -> Result<TransferCompleteResponse> {
        let phase = Phase::Complete;
        check_message_type(request)?;
        check_request_signature(request)?;
        self.check_continuity(
            session,
            request,
            "commitFinalAckHash",
            &session.commit_final_ack_hash,
            &request.hash_commit_final_ack,
        )?;

        let commence = require(&session.commence_req_hash, phase, "commenceReqHash")?;
        if request.hash_transfer_commence != commence {
            return Err(Error::HashMismatch {
                phase,
                field: "hashTransferCommence",
                expected: commence.to_string(),
                actual: request.hash_transfer_commence.clone(),
            });
        }

        let request_hash = message_hash(request)?;
        let ack = TransferCompleteResponse {
            message_type: message_type::TRANSFER_COMPLETE_RESPONSE.to_string(),
            session_id: request.session_id.clone(),
            sequence_number: request.sequence_number,
            client_identity_pubkey: request.client_identity_pubkey.clone(),
            server_identity_pubkey: self.public_key_hex().to_string(),
            hash_transfer_complete: request_hash.clone(),
            server_signature: String::new(),
        };

        let (ack, ack_hash) = self.accept(session, request, ack)?;
        session.transfer_complete_req_hash = Some(request_hash);
        session.transfer_complete_ack_hash = Some(ack_hash);
        Ok(ack)
    }
}
