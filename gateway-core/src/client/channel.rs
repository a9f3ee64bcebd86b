//! Request/response channel to a counterpart gateway

use crate::{gateway::Gateway, Error, Result};
use async_trait::async_trait;
use odap_protocol::{
    CommitFinalRequest, CommitFinalResponse, CommitPreparationRequest, CommitPreparationResponse,
    LockEvidenceRequest, LockEvidenceResponse, Phase, PhaseRequest, TransferCommenceRequest,
    TransferCommenceResponse, TransferCompleteRequest, TransferCompleteResponse,
    TransferInitializationRequest, TransferInitializationResponse,
};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

/// One round trip per phase to the server gateway
#[async_trait]
pub trait GatewayChannel: Send + Sync {
    /// Send a transfer initialization request
    async fn transfer_initialization(
        &self,
        request: TransferInitializationRequest,
    ) -> Result<TransferInitializationResponse>;

    /// Send a transfer commence request
    async fn transfer_commence(
        &self,
        request: TransferCommenceRequest,
    ) -> Result<TransferCommenceResponse>;

    /// Send a lock evidence request
    async fn lock_evidence(&self, request: LockEvidenceRequest) -> Result<LockEvidenceResponse>;

    /// Send a commit preparation request
    async fn commit_preparation(
        &self,
        request: CommitPreparationRequest,
    ) -> Result<CommitPreparationResponse>;

    /// Send a commit final request
    async fn commit_final(&self, request: CommitFinalRequest) -> Result<CommitFinalResponse>;

    /// Send a transfer complete request
    async fn transfer_complete(
        &self,
        request: TransferCompleteRequest,
    ) -> Result<TransferCompleteResponse>;
}

/// Request that knows which channel call carries it
#[async_trait]
pub trait Dispatch: PhaseRequest {
    /// Send over `channel`
    async fn dispatch(self, channel: &dyn GatewayChannel) -> Result<Self::Ack>;
}

macro_rules! dispatch {
    ($request:ty, $call:ident) => {
        #[async_trait]
        impl Dispatch for $request {
            async fn dispatch(self, channel: &dyn GatewayChannel) -> Result<Self::Ack> {
                channel.$call(self).await
            }
        }
    };
}

dispatch!(TransferInitializationRequest, transfer_initialization);
dispatch!(TransferCommenceRequest, transfer_commence);
dispatch!(LockEvidenceRequest, lock_evidence);
dispatch!(CommitPreparationRequest, commit_preparation);
dispatch!(CommitFinalRequest, commit_final);
dispatch!(TransferCompleteRequest, transfer_complete);

/// In-process channel to a server gateway.
///
/// Messages go through a JSON encode/decode on the way in and out, as they
/// would over the network. A rejection by the server comes back as a
/// transport failure.
#[derive(Clone)]
pub struct LocalChannel {
    server: Arc<Gateway>,
}

impl LocalChannel {
    /// Channel to `server`
    pub fn new(server: Arc<Gateway>) -> Self {
        Self { server }
    }

    /// Server gateway
    pub fn server(&self) -> &Arc<Gateway> {
        &self.server
    }
}

fn wire<T: Serialize, U: DeserializeOwned>(phase: Phase, message: &T) -> Result<U> {
    serde_json::to_string(message)
        .and_then(|json| serde_json::from_str(&json))
        .map_err(|e| Error::Transport {
            phase,
            reason: format!("malformed message: {}", e),
        })
}

fn rejected(phase: Phase, err: Error) -> Error {
    Error::Transport {
        phase,
        reason: format!("counterpart rejected request: {}", err),
    }
}

#[async_trait]
impl GatewayChannel for LocalChannel {
    async fn transfer_initialization(
        &self,
        request: TransferInitializationRequest,
    ) -> Result<TransferInitializationResponse> {
        let phase = Phase::Initiation;
        let ack = self
            .server
            .on_transfer_initialization(wire(phase, &request)?)
            .await
            .map_err(|e| rejected(phase, e))?;
        wire(phase, &ack)
    }

    async fn transfer_commence(
        &self,
        request: TransferCommenceRequest,
    ) -> Result<TransferCommenceResponse> {
        let phase = Phase::Commence;
        let ack = self
            .server
            .on_transfer_commence(wire(phase, &request)?)
            .await
            .map_err(|e| rejected(phase, e))?;
        wire(phase, &ack)
    }

    async fn lock_evidence(&self, request: LockEvidenceRequest) -> Result<LockEvidenceResponse> {
        let phase = Phase::LockEvidence;
        let ack = self
            .server
            .on_lock_evidence(wire(phase, &request)?)
            .await
            .map_err(|e| rejected(phase, e))?;
        wire(phase, &ack)
    }

    async fn commit_preparation(
        &self,
        request: CommitPreparationRequest,
    ) -> Result<CommitPreparationResponse> {
        let phase = Phase::CommitPreparation;
        let ack = self
            .server
            .on_commit_preparation(wire(phase, &request)?)
            .await
            .map_err(|e| rejected(phase, e))?;
        wire(phase, &ack)
    }

    async fn commit_final(&self, request: CommitFinalRequest) -> Result<CommitFinalResponse> {
        let phase = Phase::CommitFinal;
        let ack = self
            .server
            .on_commit_final(wire(phase, &request)?)
            .await
            .map_err(|e| rejected(phase, e))?;
        wire(phase, &ack)
    }

    async fn transfer_complete(
        &self,
        request: TransferCompleteRequest,
    ) -> Result<TransferCompleteResponse> {
        let phase = Phase::Complete;
        let ack = self
            .server
            .on_transfer_complete(wire(phase, &request)?)
            .await
            .map_err(|e| rejected(phase, e))?;
        wire(phase, &ack)
    }
}
