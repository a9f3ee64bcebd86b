//! Server-side phase handlers
//!
//! Every handler checks, in order: message type, client signature,
//! continuity with the session (state, sequence number, previous hash,
//! participant keys), then the phase's own rules. The work happens on a
//! copy of the session that replaces the stored one only when the ack is
//! built. Any failure reverts the session, except a request for a phase the
//! session has already passed, which is rejected without touching it.

mod commence;
mod commit_final;
mod commit_preparation;
mod complete;
mod initiation;
mod lock_evidence;

use crate::{
    audit::AuditKind,
    gateway::Gateway,
    session::{require, SessionData},
    Error, Result,
};
use chrono::Utc;
use ledger_adapters::{LedgerOperation, Receipt};
use odap_protocol::{
    canonical::message_hash, crypto::verify_message, OdapMessage, Phase, PhaseAck, PhaseRequest,
};
use tracing::{info, warn};

/// Reject a message whose `messageType` is not the one for its phase
pub(crate) fn check_message_type<M: OdapMessage>(message: &M) -> Result<()> {
    if message.message_type() != M::MESSAGE_TYPE {
        return Err(Error::WrongMessageType {
            phase: M::PHASE,
            expected: M::MESSAGE_TYPE.to_string(),
            actual: message.message_type().to_string(),
        });
    }
    Ok(())
}

/// Verify a request against the client key it carries
pub(crate) fn check_request_signature<R: PhaseRequest>(request: &R) -> Result<()> {
    if !verify_message(request, request.client_pubkey()) {
        return Err(Error::SignatureInvalid {
            phase: R::PHASE,
            signer: "client",
        });
    }
    Ok(())
}

/// Parse a claim as a successful receipt for `operation` on `asset_id`
pub(crate) fn check_claim(
    phase: Phase,
    claim: &str,
    operation: LedgerOperation,
    dlt: &str,
    asset_id: &str,
) -> Result<Receipt> {
    if claim.trim().is_empty() {
        return Err(Error::InvalidClaim {
            phase,
            reason: "claim is empty".to_string(),
        });
    }

    let receipt = Receipt::from_claim(claim).map_err(|e| Error::InvalidClaim {
        phase,
        reason: format!("claim is not a receipt: {}", e),
    })?;

    let mismatch = if receipt.operation != operation {
        Some(format!("expected {} receipt, got {}", operation, receipt.operation))
    } else if receipt.dlt_id != dlt {
        Some(format!("receipt from {}, expected {}", receipt.dlt_id, dlt))
    } else if receipt.asset_id != asset_id {
        Some(format!("receipt for {}, expected {}", receipt.asset_id, asset_id))
    } else if !receipt.is_success() {
        Some(format!("transaction {} did not succeed", receipt.transaction_id))
    } else {
        None
    };

    match mismatch {
        Some(reason) => Err(Error::InvalidClaim { phase, reason }),
        None => Ok(receipt),
    }
}

impl Gateway {
    /// Check that `request` continues `session`.
    ///
    /// `previous` is the stored hash of the prior ack under `field`, and
    /// `claimed` is what the request says that hash is.
    pub(crate) fn check_continuity<R: PhaseRequest>(
        &self,
        session: &SessionData,
        request: &R,
        field: &'static str,
        previous: &Option<String>,
        claimed: &str,
    ) -> Result<()> {
        let phase = R::PHASE;
        let state = session.state();

        if state.has_passed(phase) {
            return Err(Error::Replayed { phase, state });
        }
        if Some(state) != phase.required_state() {
            return Err(Error::Continuity {
                phase,
                reason: format!("session is {:?}", state),
            });
        }

        let expected = session
            .last_sequence_number
            .checked_add(1)
            .ok_or_else(|| Error::Continuity {
                phase,
                reason: format!(
                    "sequence number {} has no successor",
                    session.last_sequence_number
                ),
            })?;
        if request.sequence_number() != expected {
            return Err(Error::SequenceMismatch {
                phase,
                expected,
                actual: request.sequence_number(),
            });
        }

        let previous = require(previous, phase, field)?;
        if previous != claimed {
            return Err(Error::HashMismatch {
                phase,
                field,
                expected: previous.to_string(),
                actual: claimed.to_string(),
            });
        }

        let client = require(&session.source_gateway_pubkey, phase, "sourceGatewayPubkey")?;
        if request.client_pubkey() != client {
            return Err(Error::PublicKeyMismatch {
                phase,
                role: "client",
                expected: client.to_string(),
                actual: request.client_pubkey().to_string(),
            });
        }
        if request.server_pubkey() != self.public_key_hex() {
            return Err(Error::PublicKeyMismatch {
                phase,
                role: "server",
                expected: self.public_key_hex().to_string(),
                actual: request.server_pubkey().to_string(),
            });
        }

        Ok(())
    }

    /// Sign `ack`, record both signatures, and move `session` to the
    /// phase's state. Returns the signed ack and its hash.
    pub(crate) fn accept<R: PhaseRequest>(
        &self,
        session: &mut SessionData,
        request: &R,
        mut ack: R::Ack,
    ) -> Result<(R::Ack, String)> {
        let phase = R::PHASE;
        self.keys.sign_message(&mut ack)?;
        let ack_hash = message_hash(&ack)?;

        let signatures = session.signatures_mut(phase);
        signatures.client = Some(request.signature().to_string());
        signatures.server = Some(ack.signature().to_string());

        session.last_sequence_number = request.sequence_number();
        session.last_message_received_at = Some(Utc::now());
        session.state.transition(phase.reached_state())?;

        Ok((ack, ack_hash))
    }

    /// Commit the working copy on success, revert on failure
    pub(crate) async fn conclude<A: PhaseAck>(
        &self,
        session: &mut SessionData,
        mut working: SessionData,
        result: Result<A>,
    ) -> Result<A> {
        let phase = A::PHASE;
        match result {
            Ok(ack) => {
                self.audit_phase(&mut working, phase, AuditKind::Done);
                self.audit_phase(&mut working, phase, AuditKind::Ack);
                *session = working;
                self.sessions.save(session).await?;
                self.metrics.record_phase("server", &phase.to_string(), true);
                info!(
                    "Session {}: {} acknowledged, now {:?}",
                    session.id,
                    phase,
                    session.state()
                );
                Ok(ack)
            }
            Err(err) => {
                // Ledger actions that did happen must stay visible to revert
                session.ledger_actions = working.ledger_actions;
                self.metrics.record_phase("server", &phase.to_string(), false);
                Err(self.abort(session, err).await)
            }
        }
    }

    /// Revert after a failed phase and return the error to surface
    pub(crate) async fn abort(&self, session: &mut SessionData, cause: Error) -> Error {
        let stale = cause
            .phase()
            .is_some_and(|phase| phase != Phase::Initiation && session.state().has_passed(phase));
        if stale {
            warn!("Session {}: rejected without revert: {}", session.id, cause);
            return cause;
        }

        self.unwind(session, cause).await
    }
}
