//! Transfer commence (phase 2)

use super::{check_message_type, check_request_signature};
use crate::{
    gateway::Gateway,
    session::{require, SessionData},
    Error, Result,
};
use odap_protocol::{
    canonical::{canonical_hash, message_hash},
    message_type, Phase, TransferCommenceRequest, TransferCommenceResponse,
};

impl Gateway {
    /// Handle a transfer commence request
    pub async fn on_transfer_commence(
        &self,
        request: TransferCommenceRequest,
    ) -> Result<TransferCommenceResponse> {
        let handle = self
            .sessions
            .open_for(&request.session_id, Phase::Commence)
            .await?;
        let mut session = handle.lock().await;
        let mut working = session.clone();
        let result = self.commence(&request, &mut working);
        self.conclude(&mut session, working, result).await
    }

    fn commence(
        &self,
        request: &TransferCommenceRequest,
        session: &mut SessionData,
    ) -> Result<TransferCommenceResponse> {
        let phase = Phase::Commence;
        check_message_type(request)?;
        check_request_signature(request)?;
        self.check_continuity(
            session,
            request,
            "initializationResponseHash",
            &session.initialization_response_hash,
            &request.hash_prev_message,
        )?;

        let profile = session
            .asset_profile
            .as_ref()
            .ok_or(Error::SessionIncomplete {
                phase,
                field: "assetProfile",
            })?;
        let expected = canonical_hash(profile)?;
        if request.hash_asset_profile != expected {
            return Err(Error::HashMismatch {
                phase,
                field: "hashAssetProfile",
                expected,
                actual: request.hash_asset_profile.clone(),
            });
        }

        let client_dlt = require(&session.client_dlt_system, phase, "clientDltSystem")?;
        let server_dlt = require(&session.server_dlt_system, phase, "serverDltSystem")?;
        if request.sender_dlt_system != client_dlt || request.recipient_dlt_system != server_dlt {
            return Err(Error::Continuity {
                phase,
                reason: format!(
                    "DLT pair {} -> {} differs from initialization ({} -> {})",
                    request.sender_dlt_system, request.recipient_dlt_system, client_dlt, server_dlt
                ),
            });
        }

        session.originator_pubkey = Some(request.originator_pubkey.clone());
        session.beneficiary_pubkey = Some(request.beneficiary_pubkey.clone());
        session.client_identity_pubkey = Some(request.client_identity_pubkey.clone());
        session.server_identity_pubkey = Some(request.server_identity_pubkey.clone());

        let request_hash = message_hash(request)?;
        let ack = TransferCommenceResponse {
            message_type: message_type::COMMENCE_RESPONSE.to_string(),
            session_id: request.session_id.clone(),
            sequence_number: request.sequence_number,
            client_identity_pubkey: request.client_identity_pubkey.clone(),
            server_identity_pubkey: self.public_key_hex().to_string(),
            hash_commence_request: request_hash.clone(),
            server_signature: String::new(),
        };

        let (ack, ack_hash) = self.accept(session, request, ack)?;
        session.commence_req_hash = Some(request_hash);
        session.commence_ack_hash = Some(ack_hash);
        Ok(ack)
    }
}
