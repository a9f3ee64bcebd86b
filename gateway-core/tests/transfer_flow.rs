//! End-to-end transfers between a client and a server gateway

mod common;

use chrono::{Duration as ChronoDuration, Utc};
use common::*;
use gateway_core::{Error, GatewayConfig, SessionData, SessionStore};
use ledger_adapters::LedgerOperation;
use odap_protocol::{
    message_type, LockEvidenceRequest, Phase, TransferCommenceRequest, TransferState,
};
use std::collections::BTreeSet;
use std::time::Duration;

fn chain(session: &SessionData) -> Vec<(&'static str, Option<&String>)> {
    vec![
        ("initializationRequestHash", session.initialization_request_hash.as_ref()),
        ("initializationResponseHash", session.initialization_response_hash.as_ref()),
        ("commenceReqHash", session.commence_req_hash.as_ref()),
        ("commenceAckHash", session.commence_ack_hash.as_ref()),
        ("lockEvidenceReqHash", session.lock_evidence_req_hash.as_ref()),
        ("lockEvidenceAckHash", session.lock_evidence_ack_hash.as_ref()),
        ("commitPrepareReqHash", session.commit_prepare_req_hash.as_ref()),
        ("commitPrepareAckHash", session.commit_prepare_ack_hash.as_ref()),
        ("commitFinalReqHash", session.commit_final_req_hash.as_ref()),
        ("commitFinalAckHash", session.commit_final_ack_hash.as_ref()),
        ("transferCompleteReqHash", session.transfer_complete_req_hash.as_ref()),
        ("transferCompleteAckHash", session.transfer_complete_ack_hash.as_ref()),
    ]
}

fn operations(ledger: &ledger_adapters::InMemoryLedger) -> Vec<LedgerOperation> {
    ledger.calls().into_iter().map(|call| call.operation).collect()
}

#[tokio::test]
async fn test_successful_transfer() {
    let env = TestEnvironment::new().await;

    let outcome = env
        .client
        .transfer(env.request("S1"), &env.channel())
        .await
        .expect("transfer should succeed");
    assert_eq!(outcome.session_id, "S1");

    let client = env.client.session("S1").await.unwrap();
    let server = env.server.session("S1").await.unwrap();

    assert_eq!(client.state(), TransferState::Completed);
    assert_eq!(server.state(), TransferState::Completed);
    assert!(client.step >= 12, "client step {}", client.step);
    assert!(server.step >= 12, "server step {}", server.step);
    assert!(client.rollback_actions_performed.is_empty());
    assert!(server.rollback_actions_performed.is_empty());

    // Asset moved from FABRIC to BESU
    assert!(env.fabric.asset(SOURCE_ASSET).is_none());
    let created = env.besu.asset(RECIPIENT_ASSET).expect("asset created on BESU");
    assert_eq!(created.size, ASSET_SIZE);
    assert!(!created.locked);
    assert_eq!(
        operations(&env.fabric),
        vec![LedgerOperation::Lock, LedgerOperation::Delete]
    );
    assert_eq!(operations(&env.besu), vec![LedgerOperation::Create]);

    // Both sides hold the same hash chain
    for ((field, ours), (_, theirs)) in chain(&client).into_iter().zip(chain(&server)) {
        assert!(ours.is_some(), "client missing {}", field);
        assert_eq!(ours, theirs, "{} differs between gateways", field);
    }
    assert_eq!(client.signatures, server.signatures);
    assert_eq!(client.signatures.len(), Phase::ALL.len());

    for audit in [&env.client_audit, &env.server_audit] {
        let phases: BTreeSet<Phase> = audit.entries_for("S1").iter().map(|e| e.phase).collect();
        assert_eq!(phases.len(), Phase::ALL.len());
    }
}

#[tokio::test]
async fn test_generated_session_id() {
    let env = TestEnvironment::new().await;
    let mut request = env.request("unused");
    request.session_id = None;

    let outcome = env
        .client
        .transfer(request, &env.channel())
        .await
        .unwrap();
    assert!(uuid::Uuid::parse_str(&outcome.session_id).is_ok());
    assert!(env.server.session(&outcome.session_id).await.is_some());
}

#[tokio::test]
async fn test_expired_asset_rejected_at_initiation() {
    let env = TestEnvironment::new().await;
    let mut request = env.request("S1");
    request.asset_profile.expiration_date = Utc::now() - ChronoDuration::seconds(1);

    let err = env
        .client
        .transfer(request, &env.channel())
        .await
        .unwrap_err();
    assert_eq!(err.phase(), Some(Phase::Initiation));

    assert_eq!(env.client.sessions().len().await, 0);
    assert_eq!(env.server.sessions().len().await, 0);
    assert!(env.fabric.calls().is_empty());
}

#[tokio::test]
async fn test_server_rejects_expired_profile_directly() {
    let env = TestEnvironment::new().await;
    let request = env.init_request("S1", Utc::now() - ChronoDuration::minutes(5));

    let err = env.server.on_transfer_initialization(request).await.unwrap_err();
    assert!(matches!(err, Error::AssetExpired { .. }), "{}", err);
    assert!(env.server.session("S1").await.is_none());
}

#[tokio::test]
async fn test_unsupported_recipient_dlt() {
    let env = TestEnvironment::new().await;
    let mut request = env.request("S1");
    request.recipient_dlt = "CORDA".to_string();

    let channel = ScriptedChannel::new(env.channel());
    let err = env.client.transfer(request, &channel).await.unwrap_err();
    assert!(matches!(
        err,
        Error::UnsupportedDlt {
            phase: Phase::Initiation,
            ..
        }
    ));
    assert!(channel.sent().is_empty(), "nothing should reach the server");
}

#[tokio::test]
async fn test_source_dlt_without_adapter() {
    let env = TestEnvironment::new().await;
    let mut request = env.request("S1");
    request.source_dlt = "BESU".to_string();

    let err = env
        .client
        .transfer(request, &env.channel())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedDlt { .. }), "{}", err);
    assert_eq!(env.server.sessions().len().await, 0);
}

#[tokio::test]
async fn test_tampered_lock_evidence_ack() {
    let env = TestEnvironment::new().await;
    let channel = ScriptedChannel::new(env.channel()).tamper_at(Phase::LockEvidence);

    let err = env
        .client
        .transfer(env.request("S1"), &channel)
        .await
        .unwrap_err();
    assert!(
        matches!(err, Error::SignatureInvalid { signer: "server", .. }),
        "{}",
        err
    );
    assert_eq!(err.phase(), Some(Phase::LockEvidence));

    // Client released its lock
    let client = env.client.session("S1").await.unwrap();
    assert_eq!(client.state(), TransferState::Reverted);
    assert_eq!(
        operations(&env.fabric),
        vec![LedgerOperation::Lock, LedgerOperation::Unlock]
    );
    assert!(!env.fabric.asset(SOURCE_ASSET).unwrap().locked);
    assert_eq!(client.rollback_proofs.len(), 1);

    // Server acknowledged lock evidence and heard nothing further
    let server = env.server.session("S1").await.unwrap();
    assert_eq!(server.state(), TransferState::Locked);
    assert!(!channel.sent().contains(&Phase::CommitPreparation));
}

#[tokio::test]
async fn test_replayed_commence_rejected_without_mutation() {
    let env = TestEnvironment::new().await;
    let channel = ScriptedChannel::new(env.channel()).halt_at(Phase::CommitPreparation);

    let err = env
        .client
        .transfer(env.request("S1"), &channel)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Transport { .. }), "{}", err);

    let before = env.server.session("S1").await.unwrap();
    assert_eq!(before.state(), TransferState::Locked);

    let replay = channel.commence_request().expect("commence was sent");
    let err = env.server.on_transfer_commence(replay).await.unwrap_err();
    assert!(
        matches!(
            err,
            Error::Replayed {
                phase: Phase::Commence,
                ..
            }
        ),
        "{}",
        err
    );

    let after = env.server.session("S1").await.unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_recipient_create_failure_reverts_both_sides() {
    let env = TestEnvironment::new().await;
    env.besu.fail_next(LedgerOperation::Create);

    let err = env
        .client
        .transfer(env.request("S1"), &env.channel())
        .await
        .unwrap_err();
    assert_eq!(err.phase(), Some(Phase::CommitFinal));

    let server = env.server.session("S1").await.unwrap();
    assert_eq!(server.state(), TransferState::Reverted);
    assert!(env.besu.asset(RECIPIENT_ASSET).is_none());

    // Source asset restored from the recorded deletion
    let client = env.client.session("S1").await.unwrap();
    assert_eq!(client.state(), TransferState::Reverted);
    let restored = env.fabric.asset(SOURCE_ASSET).expect("source asset re-created");
    assert_eq!(restored.size, ASSET_SIZE);
    assert_eq!(
        operations(&env.fabric),
        vec![
            LedgerOperation::Lock,
            LedgerOperation::Delete,
            LedgerOperation::Create
        ]
    );
    assert_eq!(client.rollback_actions_performed.len(), 1);
}

#[tokio::test]
async fn test_source_lock_failure() {
    let env = TestEnvironment::new().await;
    env.fabric.fail_next(LedgerOperation::Lock);
    let channel = ScriptedChannel::new(env.channel());

    let err = env
        .client
        .transfer(env.request("S1"), &channel)
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            Error::Ledger {
                phase: Phase::Commence,
                ..
            }
        ),
        "{}",
        err
    );

    let client = env.client.session("S1").await.unwrap();
    assert_eq!(client.state(), TransferState::Reverted);
    assert_eq!(operations(&env.fabric), vec![LedgerOperation::Lock]);
    assert_eq!(channel.sent(), vec![Phase::Initiation, Phase::Commence]);

    let server = env.server.session("S1").await.unwrap();
    assert_eq!(server.state(), TransferState::Commenced);
}

#[tokio::test]
async fn test_concurrent_duplicate_commence() {
    let env = TestEnvironment::new().await;
    let channel = ScriptedChannel::new(env.channel()).halt_at(Phase::Commence);

    env.client
        .transfer(env.request("S1"), &channel)
        .await
        .unwrap_err();
    let request = channel.commence_request().unwrap();

    let (first, second) = tokio::join!(
        env.server.on_transfer_commence(request.clone()),
        env.server.on_transfer_commence(request)
    );

    let accepted = [&first, &second].iter().filter(|r| r.is_ok()).count();
    assert_eq!(accepted, 1, "exactly one commence should win");
    let rejected = if first.is_err() { first } else { second };
    assert!(matches!(rejected, Err(Error::Replayed { .. })));

    let server = env.server.session("S1").await.unwrap();
    assert_eq!(server.state(), TransferState::Commenced);
}

#[tokio::test]
async fn test_phase_timeout_reverts() {
    let env = TestEnvironment::with_config(GatewayConfig {
        phase_timeout_ms: Some(50),
        ..GatewayConfig::default()
    })
    .await;
    let channel = ScriptedChannel::new(env.channel())
        .delay_at(Phase::LockEvidence, Duration::from_millis(500));

    let err = env
        .client
        .transfer(env.request("S1"), &channel)
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            Error::Timeout {
                phase: Phase::LockEvidence,
                millis: 50
            }
        ),
        "{}",
        err
    );

    let client = env.client.session("S1").await.unwrap();
    assert_eq!(client.state(), TransferState::Reverted);
    assert!(!env.fabric.asset(SOURCE_ASSET).unwrap().locked);
}

#[tokio::test]
async fn test_audit_failure_does_not_abort() {
    let env = TestEnvironment::new().await;
    env.client_audit.set_failing(true);
    env.server_audit.set_failing(true);

    env.client
        .transfer(env.request("S1"), &env.channel())
        .await
        .expect("audit failures are not fatal");

    let client = env.client.session("S1").await.unwrap();
    assert_eq!(client.state(), TransferState::Completed);
    assert!(client.step >= 12);
    assert!(env.client_audit.entries().is_empty());
}

#[tokio::test]
async fn test_duplicate_session_id_rejected() {
    let env = TestEnvironment::new().await;
    env.client
        .transfer(env.request("S1"), &env.channel())
        .await
        .unwrap();

    let request = env.init_request("S1", Utc::now() + ChronoDuration::hours(1));
    let err = env.server.on_transfer_initialization(request).await.unwrap_err();
    assert!(matches!(err, Error::DuplicateSession { .. }), "{}", err);

    let server = env.server.session("S1").await.unwrap();
    assert_eq!(server.state(), TransferState::Completed);
}

#[tokio::test]
async fn test_initialization_for_another_gateway_rejected() {
    let env = TestEnvironment::new().await;
    let mut request = env.init_request("S1", Utc::now() + ChronoDuration::hours(1));
    request.recipient_gateway_pubkey = env.client_keys.public_key_hex().to_string();
    env.client_keys.sign_message(&mut request).unwrap();

    let err = env.server.on_transfer_initialization(request).await.unwrap_err();
    assert!(
        matches!(err, Error::PublicKeyMismatch { role: "server", .. }),
        "{}",
        err
    );
}

#[tokio::test]
async fn test_unknown_session_rejected() {
    let env = TestEnvironment::new().await;
    let channel = ScriptedChannel::new(env.channel()).halt_at(Phase::Commence);
    env.client
        .transfer(env.request("S1"), &channel)
        .await
        .unwrap_err();

    let mut request = channel.commence_request().unwrap();
    request.session_id = "S2".to_string();
    let err = env.server.on_transfer_commence(request).await.unwrap_err();
    assert!(matches!(err, Error::SessionNotFound { .. }), "{}", err);
}

#[tokio::test]
async fn test_initialization_at_sequence_ceiling_rejected() {
    let env = TestEnvironment::new().await;
    let expiration = Utc::now() + ChronoDuration::hours(1);

    let mut request = env.init_request("S1", expiration);
    request.sequence_number = u64::MAX;
    env.client_keys.sign_message(&mut request).unwrap();
    let err = env
        .server
        .on_transfer_initialization(request)
        .await
        .unwrap_err();
    assert!(
        matches!(err, Error::Continuity { phase: Phase::Initiation, .. }),
        "{}",
        err
    );
    assert!(env.server.session("S1").await.is_none());

    let mut request = env.init_request("S2", expiration);
    request.sequence_number = u64::MAX - 5;
    env.client_keys.sign_message(&mut request).unwrap();
    env.server.on_transfer_initialization(request).await.unwrap();
}

/// Run a transfer whose `phase` request never reaches the server, leaving
/// the server session one phase behind the client
async fn undelivered(phase: Phase) -> (TestEnvironment, ScriptedChannel) {
    let env = TestEnvironment::new().await;
    let channel = ScriptedChannel::new(env.channel()).halt_at(phase);
    let err = env
        .client
        .transfer(env.request("S1"), &channel)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Transport { .. }), "{}", err);
    (env, channel)
}

async fn undelivered_commence() -> (TestEnvironment, TransferCommenceRequest) {
    let (env, channel) = undelivered(Phase::Commence).await;
    let request = channel.commence_request().unwrap();
    assert_eq!(
        env.server.session("S1").await.unwrap().state(),
        TransferState::Initialized
    );
    (env, request)
}

async fn undelivered_lock_evidence() -> (TestEnvironment, LockEvidenceRequest) {
    let (env, channel) = undelivered(Phase::LockEvidence).await;
    let request = channel.lock_evidence_request().unwrap();
    assert_eq!(
        env.server.session("S1").await.unwrap().state(),
        TransferState::Commenced
    );
    (env, request)
}

async fn assert_server_reverted(env: &TestEnvironment) {
    let server = env.server.session("S1").await.unwrap();
    assert_eq!(server.state(), TransferState::Reverted);
    assert!(env.besu.calls().is_empty());
}

#[tokio::test]
async fn test_commence_with_wrong_message_type_reverts_server() {
    let (env, mut request) = undelivered_commence().await;
    request.message_type = message_type::LOCK_EVIDENCE_REQUEST.to_string();
    env.client_keys.sign_message(&mut request).unwrap();

    let err = env.server.on_transfer_commence(request).await.unwrap_err();
    assert!(
        matches!(err, Error::WrongMessageType { phase: Phase::Commence, .. }),
        "{}",
        err
    );
    assert_server_reverted(&env).await;
}

#[tokio::test]
async fn test_commence_with_bad_signature_reverts_server() {
    let (env, mut request) = undelivered_commence().await;
    request.hash_prev_message = "00".to_string();

    let err = env.server.on_transfer_commence(request).await.unwrap_err();
    assert!(
        matches!(err, Error::SignatureInvalid { signer: "client", .. }),
        "{}",
        err
    );
    assert_server_reverted(&env).await;
}

#[tokio::test]
async fn test_commence_with_wrong_previous_hash_reverts_server() {
    let (env, mut request) = undelivered_commence().await;
    request.hash_prev_message = "00".to_string();
    env.client_keys.sign_message(&mut request).unwrap();

    let err = env.server.on_transfer_commence(request).await.unwrap_err();
    assert!(
        matches!(
            err,
            Error::HashMismatch {
                field: "initializationResponseHash",
                ..
            }
        ),
        "{}",
        err
    );
    assert_server_reverted(&env).await;
}

#[tokio::test]
async fn test_commence_out_of_sequence_reverts_server() {
    let (env, mut request) = undelivered_commence().await;
    let expected = request.sequence_number;
    request.sequence_number += 5;
    env.client_keys.sign_message(&mut request).unwrap();

    let err = env.server.on_transfer_commence(request).await.unwrap_err();
    match err {
        Error::SequenceMismatch {
            expected: e,
            actual,
            ..
        } => {
            assert_eq!(e, expected);
            assert_eq!(actual, expected + 5);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_server_reverted(&env).await;
}

#[tokio::test]
async fn test_commence_with_wrong_profile_hash_reverts_server() {
    let (env, mut request) = undelivered_commence().await;
    request.hash_asset_profile = "ab".repeat(32);
    env.client_keys.sign_message(&mut request).unwrap();

    let err = env.server.on_transfer_commence(request).await.unwrap_err();
    assert!(
        matches!(
            err,
            Error::HashMismatch {
                field: "hashAssetProfile",
                ..
            }
        ),
        "{}",
        err
    );
    assert_server_reverted(&env).await;
}

#[tokio::test]
async fn test_lock_evidence_with_empty_claim_reverts_server() {
    let (env, mut request) = undelivered_lock_evidence().await;
    request.lock_evidence_claim = String::new();
    env.client_keys.sign_message(&mut request).unwrap();

    let err = env.server.on_lock_evidence(request).await.unwrap_err();
    assert!(
        matches!(err, Error::InvalidClaim { phase: Phase::LockEvidence, .. }),
        "{}",
        err
    );
    assert_server_reverted(&env).await;
}

#[tokio::test]
async fn test_lock_evidence_past_expiration_reverts_server() {
    let (env, mut request) = undelivered_lock_evidence().await;
    request.lock_evidence_expiration = Utc::now() - ChronoDuration::seconds(1);
    env.client_keys.sign_message(&mut request).unwrap();

    let err = env.server.on_lock_evidence(request).await.unwrap_err();
    assert!(
        matches!(err, Error::InvalidClaim { ref reason, .. } if reason.contains("expired")),
        "{}",
        err
    );
    assert_server_reverted(&env).await;
}

#[tokio::test]
async fn test_lock_evidence_with_wrong_commence_hash_reverts_server() {
    let (env, mut request) = undelivered_lock_evidence().await;
    request.hash_commence_ack_request = "00".to_string();
    env.client_keys.sign_message(&mut request).unwrap();

    let err = env.server.on_lock_evidence(request).await.unwrap_err();
    assert!(
        matches!(
            err,
            Error::HashMismatch {
                field: "commenceAckHash",
                ..
            }
        ),
        "{}",
        err
    );
    assert_server_reverted(&env).await;
}
