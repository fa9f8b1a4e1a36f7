//! Cross-checks against the PQClean ML-KEM-768 and ML-DSA-65 implementations.

use pqauth_crypto::{kem, signature, KemCiphertext, KemPublicKey, KemSecretKey, Signature};
use pqauth_crypto::{SignaturePublicKey, SignatureSecretKey};
use pqcrypto_mldsa::mldsa65;
use pqcrypto_mlkem::mlkem768;
use pqcrypto_traits::kem::{
    Ciphertext as _, PublicKey as _, SecretKey as _, SharedSecret as _,
};
use pqcrypto_traits::sign::{
    DetachedSignature as _, PublicKey as _, SecretKey as _,
};

#[test]
fn test_encapsulate_to_reference_key() {
    let (pk, sk) = mlkem768::keypair();
    let public_key = KemPublicKey::from_bytes(pk.as_bytes()).unwrap();

    let (ct, ss) = kem::encapsulate(&public_key).unwrap();

    let reference_ct = mlkem768::Ciphertext::from_bytes(ct.as_bytes()).unwrap();
    let reference_ss = mlkem768::decapsulate(&reference_ct, &sk);
    assert_eq!(reference_ss.as_bytes(), ss.as_bytes());
}

#[test]
fn test_decapsulate_reference_ciphertext() {
    let keypair = kem::generate_keypair().unwrap();
    let reference_pk = mlkem768::PublicKey::from_bytes(keypair.public_key().as_bytes()).unwrap();

    let (reference_ss, reference_ct) = mlkem768::encapsulate(&reference_pk);

    let ct = KemCiphertext::from_bytes(reference_ct.as_bytes()).unwrap();
    let ss = kem::decapsulate(&ct, keypair.secret_key()).unwrap();
    assert_eq!(ss.as_bytes(), reference_ss.as_bytes());
}

#[test]
fn test_reference_secret_key_decapsulates() {
    let (pk, sk) = mlkem768::keypair();
    let public_key = KemPublicKey::from_bytes(pk.as_bytes()).unwrap();
    let secret_key = KemSecretKey::from_bytes(sk.as_bytes()).unwrap();

    let (ct, ss) = kem::encapsulate(&public_key).unwrap();
    assert_eq!(kem::decapsulate(&ct, &secret_key).unwrap(), ss);
}

#[test]
fn test_reference_verifies_our_signature() {
    let keypair = signature::generate_keypair().unwrap();
    let message = b"a1b2c3:1700000000000";

    let sig = signature::sign(message, keypair.secret_key()).unwrap();

    let reference_pk = mldsa65::PublicKey::from_bytes(keypair.public_key().as_bytes()).unwrap();
    let reference_sig = mldsa65::DetachedSignature::from_bytes(sig.as_bytes()).unwrap();
    assert!(mldsa65::verify_detached_signature(&reference_sig, message, &reference_pk).is_ok());
    assert!(mldsa65::verify_detached_signature(&reference_sig, b"other", &reference_pk).is_err());
}

#[test]
fn test_we_verify_reference_signature() {
    let (pk, sk) = mldsa65::keypair();
    let message = b"a1b2c3:1700000000000";
    let reference_sig = mldsa65::detached_sign(message, &sk);

    let public_key = SignaturePublicKey::from_bytes(pk.as_bytes()).unwrap();
    let sig = Signature::from_bytes(reference_sig.as_bytes());
    assert!(signature::verify(message, &sig, &public_key));
    assert!(!signature::verify(b"other", &sig, &public_key));
}

#[test]
fn test_reference_secret_key_signs() {
    let (pk, sk) = mldsa65::keypair();
    let secret_key = SignatureSecretKey::from_bytes(sk.as_bytes()).unwrap();

    let sig = signature::sign(b"message", &secret_key).unwrap();

    let reference_sig = mldsa65::DetachedSignature::from_bytes(sig.as_bytes()).unwrap();
    assert!(mldsa65::verify_detached_signature(&reference_sig, b"message", &pk).is_ok());
}
