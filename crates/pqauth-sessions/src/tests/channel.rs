//! Key exchange against a credential's ML-KEM key.

use super::helpers::*;
use crate::*;
use pqauth_crypto::{
    AccessGate, AllowAllGate, CryptoError, DenyAllGate, KemPublicKey, KeyCapabilities,
};

/// Approves custody recovery but nothing else
struct RecoverOnlyGate;

impl AccessGate for RecoverOnlyGate {
    fn authorize(&self, capability: KeyCapabilities, purpose: &str) -> pqauth_crypto::Result<()> {
        if capability == KeyCapabilities::RECOVER {
            Ok(())
        } else {
            Err(CryptoError::AccessDenied {
                purpose: purpose.to_string(),
            })
        }
    }
}

fn public_key(credential: &GenerateCredentialResponse) -> KemPublicKey {
    KemPublicKey::from_bytes(&hex::decode(&credential.public_key).unwrap()).unwrap()
}

#[tokio::test]
async fn test_channel_roundtrip() {
    let harness = create_test_service();
    let credential = issue_test_credential(&harness.service).await;

    let (ciphertext, mut initiator) =
        open_channel(&public_key(&credential), &credential.key_id).unwrap();
    let mut responder = harness
        .service
        .establish_channel(&credential.key_id, &ciphertext, &AllowAllGate)
        .await
        .unwrap();

    let sealed = initiator.seal(b"metrics please").unwrap();
    assert_eq!(responder.open(&sealed).unwrap(), b"metrics please");

    let reply = responder.seal(b"here you go").unwrap();
    assert_eq!(initiator.open(&reply).unwrap(), b"here you go");
}

#[tokio::test]
async fn test_channel_requires_gate_approval() {
    let harness = create_test_service();
    let credential = issue_test_credential(&harness.service).await;
    let (ciphertext, _) = open_channel(&public_key(&credential), &credential.key_id).unwrap();

    let err = harness
        .service
        .establish_channel(&credential.key_id, &ciphertext, &DenyAllGate)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::AccessDenied(_)));

    let err = harness
        .service
        .establish_channel(&credential.key_id, &ciphertext, &RecoverOnlyGate)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::AccessDenied(_)));
}

#[tokio::test]
async fn test_channel_bound_to_key_id() {
    let harness = create_test_service();
    let credential = issue_test_credential(&harness.service).await;
    let other = issue_test_credential(&harness.service).await;

    // encapsulated to the right key but derived under the wrong identifier
    let (ciphertext, mut initiator) =
        open_channel(&public_key(&credential), &other.key_id).unwrap();
    let mut responder = harness
        .service
        .establish_channel(&credential.key_id, &ciphertext, &AllowAllGate)
        .await
        .unwrap();

    let sealed = initiator.seal(b"hello").unwrap();
    assert!(responder.open(&sealed).is_err());
}

#[tokio::test]
async fn test_channel_unavailable_after_credential_revocation() {
    let harness = create_test_service();
    let credential = issue_test_credential(&harness.service).await;
    let (ciphertext, _) = open_channel(&public_key(&credential), &credential.key_id).unwrap();

    harness
        .service
        .revoke_credential(&credential.key_id)
        .await
        .unwrap();

    let err = harness
        .service
        .establish_channel(&credential.key_id, &ciphertext, &AllowAllGate)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::CredentialUnavailable));
}
