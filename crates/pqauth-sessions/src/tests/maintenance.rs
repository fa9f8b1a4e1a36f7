//! Pruning tests.

use super::helpers::*;
use crate::*;
use pqauth_crypto::lookup_digest;
use pqauth_storage::{column_families::*, MemoryStorage, Storage};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_prune_removes_expired_sessions_and_tombstones() {
    let harness = create_test_service_with_config(ServiceConfig {
        session_ttl_ms: 1,
        ..ServiceConfig::default()
    });
    let (credential, response) = issue_test_session(&harness.service).await;
    let unknown = "cd".repeat(32);
    harness.service.revoke(&unknown).await.unwrap();
    assert_eq!(harness.storage.len(CF_SESSIONS).await.unwrap(), 2);
    assert_eq!(harness.storage.len(CF_SESSIONS_BY_KEY).await.unwrap(), 1);

    tokio::time::sleep(Duration::from_millis(20)).await;

    let report = harness.service.prune_expired().await.unwrap();
    assert_eq!(report.sessions, 2);
    assert_eq!(report.index_entries, 1);
    assert_eq!(report.baselines, 0);
    assert_eq!(harness.storage.len(CF_SESSIONS).await.unwrap(), 0);
    assert_eq!(harness.storage.len(CF_SESSIONS_BY_KEY).await.unwrap(), 0);

    // the credential is still live, so its baseline stays
    assert_eq!(harness.scorer.baseline_samples(&credential.key_id), 1);

    let err = harness
        .service
        .validate_session(&response.session_token)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::SessionInvalid));

    assert_eq!(
        harness.service.prune_expired().await.unwrap(),
        PruneReport::default()
    );
}

#[tokio::test]
async fn test_prune_keeps_unexpired_records() {
    let harness = create_test_service();
    let (first, second) = (
        issue_test_session(&harness.service).await.1,
        issue_test_session(&harness.service).await.1,
    );
    harness.service.revoke(&first.session_token).await.unwrap();
    harness.service.revoke(&"cd".repeat(32)).await.unwrap();

    let report = harness.service.prune_expired().await.unwrap();
    assert_eq!(report, PruneReport::default());
    assert_eq!(harness.storage.len(CF_SESSIONS).await.unwrap(), 3);
    assert_eq!(harness.storage.len(CF_REVOCATION_SHARES).await.unwrap(), 4);

    // a revoked session stays revoked until it would have expired
    let stored: Session = harness
        .storage
        .get(CF_SESSIONS, &lookup_digest(&first.session_token))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.state, SessionState::Revoked);
    assert!(harness
        .service
        .validate_session(&second.session_token)
        .await
        .is_ok());
}

#[tokio::test]
async fn test_prune_forgets_baselines_of_expired_credentials() {
    let harness = create_test_service_with_config(ServiceConfig {
        credential_ttl_ms: 500,
        ..ServiceConfig::default()
    });
    let (credential, _) = issue_test_session(&harness.service).await;
    assert_eq!(harness.scorer.baseline_samples(&credential.key_id), 1);

    tokio::time::sleep(Duration::from_millis(600)).await;

    let report = harness.service.prune_expired().await.unwrap();
    assert_eq!(report.baselines, 1);
    assert_eq!(harness.scorer.baseline_samples(&credential.key_id), 0);

    let info = harness
        .service
        .get_credential(&credential.key_id)
        .await
        .unwrap();
    assert_eq!(info.state, CredentialState::Expired);
}

#[tokio::test]
async fn test_prune_drops_seal_shares_past_retention() {
    let harness = create_test_service_with_config(ServiceConfig {
        seal_retention_ms: 1,
        ..ServiceConfig::default()
    });
    let (_, response) = issue_test_session(&harness.service).await;
    let revoked = harness
        .service
        .revoke(&response.session_token)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;

    let report = harness.service.prune_expired().await.unwrap();
    assert_eq!(report.seal_shares, 2);
    assert_eq!(harness.storage.len(CF_REVOCATION_SHARES).await.unwrap(), 0);

    let events = harness.audit.of_type(AuditEventType::SessionRevoked).await;
    let entry: RevocationLogEntry =
        serde_json::from_value(events[0].payload["entry"].clone()).unwrap();
    assert!(!harness
        .service
        .verify_revocation(&entry, &revoked.artifact)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_spawned_pruner_bounds_tombstones() {
    let storage = Arc::new(MemoryStorage::new());
    let service = Arc::new(CredentialService::new(
        Arc::clone(&storage),
        ServiceConfig {
            session_ttl_ms: 1,
            ..ServiceConfig::default()
        },
    ));
    for i in 0..16u8 {
        service.revoke(&hex::encode([i; 32])).await.unwrap();
    }
    assert_eq!(storage.len(CF_SESSIONS).await.unwrap(), 16);

    let pruner = spawn_pruner(Arc::clone(&service), Duration::from_millis(10));
    tokio::time::sleep(Duration::from_millis(100)).await;
    pruner.abort();

    assert_eq!(storage.len(CF_SESSIONS).await.unwrap(), 0);
}
