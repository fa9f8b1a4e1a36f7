//! Encryption operations using XChaCha20-Poly1305.

use crate::{constants::*, errors::*, utils::random_array};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Encrypt data using XChaCha20-Poly1305 AEAD
///
/// # Arguments
///
/// * `key` - 32-byte encryption key
/// * `plaintext` - Data to encrypt
/// * `nonce` - 24-byte nonce (MUST be unique per key)
/// * `aad` - Associated authenticated data (not encrypted, but authenticated)
///
/// # Returns
///
/// Ciphertext with 16-byte authentication tag appended
pub fn encrypt(
    key: &[u8; SYMMETRIC_KEY_SIZE],
    plaintext: &[u8],
    nonce: &[u8; NONCE_SIZE],
    aad: &[u8],
) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(key.into());
    let xnonce = XNonce::from_slice(nonce);

    let payload = Payload {
        msg: plaintext,
        aad,
    };

    cipher
        .encrypt(xnonce, payload)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))
}

/// Decrypt data using XChaCha20-Poly1305 AEAD
///
/// # Arguments
///
/// * `key` - 32-byte encryption key
/// * `ciphertext` - Data to decrypt (includes 16-byte tag at end)
/// * `nonce` - 24-byte nonce (same as used for encryption)
/// * `aad` - Associated authenticated data (same as used for encryption)
pub fn decrypt(
    key: &[u8; SYMMETRIC_KEY_SIZE],
    ciphertext: &[u8],
    nonce: &[u8; NONCE_SIZE],
    aad: &[u8],
) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(key.into());
    let xnonce = XNonce::from_slice(nonce);

    let payload = Payload {
        msg: ciphertext,
        aad,
    };

    cipher
        .decrypt(xnonce, payload)
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
}

/// A secret encrypted at rest under a wrapping key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedSecret {
    /// Random XChaCha20 nonce
    pub nonce: [u8; NONCE_SIZE],
    /// Ciphertext with tag
    pub ciphertext: Vec<u8>,
}

/// Build the AAD binding a wrapped KEM secret key to its credential.
fn kem_wrap_aad(key_id: &str) -> Vec<u8> {
    let mut aad = Vec::with_capacity(DOMAIN_KEM_WRAP_AAD.len() + key_id.len());
    aad.extend_from_slice(DOMAIN_KEM_WRAP_AAD.as_bytes());
    aad.extend_from_slice(key_id.as_bytes());
    aad
}

/// Wrap a KEM secret key for storage.
///
/// AAD: "pqauth:kem-wrap:v1" || key_id
pub fn wrap_kem_secret(
    wrapping_key: &[u8; SYMMETRIC_KEY_SIZE],
    secret_key: &[u8],
    key_id: &str,
) -> Result<WrappedSecret> {
    let nonce = random_array::<NONCE_SIZE>()?;
    let ciphertext = encrypt(wrapping_key, secret_key, &nonce, &kem_wrap_aad(key_id))?;
    Ok(WrappedSecret { nonce, ciphertext })
}

/// Unwrap a KEM secret key previously sealed by [`wrap_kem_secret`].
pub fn unwrap_kem_secret(
    wrapping_key: &[u8; SYMMETRIC_KEY_SIZE],
    wrapped: &WrappedSecret,
    key_id: &str,
) -> Result<Zeroizing<Vec<u8>>> {
    decrypt(
        wrapping_key,
        &wrapped.ciphertext,
        &wrapped.nonce,
        &kem_wrap_aad(key_id),
    )
    .map(Zeroizing::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = [42u8; 32];
        let nonce = [1u8; NONCE_SIZE];
        let plaintext = b"hello world";
        let aad = b"additional data";

        let ciphertext = encrypt(&key, plaintext, &nonce, aad).unwrap();
        let decrypted = decrypt(&key, &ciphertext, &nonce, aad).unwrap();

        assert_eq!(plaintext.as_slice(), decrypted.as_slice());
    }

    #[test]
    fn test_decrypt_with_wrong_key() {
        let nonce = [1u8; NONCE_SIZE];
        let ciphertext = encrypt(&[42u8; 32], b"secret", &nonce, b"").unwrap();
        assert!(decrypt(&[43u8; 32], &ciphertext, &nonce, b"").is_err());
    }

    #[test]
    fn test_decrypt_with_wrong_aad() {
        let key = [42u8; 32];
        let nonce = [1u8; NONCE_SIZE];
        let ciphertext = encrypt(&key, b"secret", &nonce, b"aad1").unwrap();
        assert!(decrypt(&key, &ciphertext, &nonce, b"aad2").is_err());
    }

    #[test]
    fn test_ciphertext_includes_tag() {
        let ciphertext = encrypt(&[42u8; 32], b"test", &[1u8; NONCE_SIZE], b"").unwrap();
        assert_eq!(ciphertext.len(), 4 + TAG_SIZE);
    }

    #[test]
    fn test_wrap_kem_secret_binds_key_id() {
        let wrapping_key = [7u8; 32];
        let secret = vec![9u8; KEM_SECRET_KEY_SIZE];

        let wrapped = wrap_kem_secret(&wrapping_key, &secret, "key-a").unwrap();
        let unwrapped = unwrap_kem_secret(&wrapping_key, &wrapped, "key-a").unwrap();
        assert_eq!(unwrapped.as_slice(), secret.as_slice());

        assert!(unwrap_kem_secret(&wrapping_key, &wrapped, "key-b").is_err());
    }

    #[test]
    fn test_wrap_uses_fresh_nonces() {
        let wrapping_key = [7u8; 32];
        let a = wrap_kem_secret(&wrapping_key, b"same", "key").unwrap();
        let b = wrap_kem_secret(&wrapping_key, b"same", "key").unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }
}
