//! Key derivation using HKDF-SHA256.

use crate::{constants::*, errors::*, kem::SharedSecret};
use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroizing;

/// Derive a 32-byte key using HKDF-SHA256
pub fn hkdf_derive_32(ikm: &[u8], info: &[u8]) -> Result<Zeroizing<[u8; 32]>> {
    let hkdf = Hkdf::<Sha256>::new(None, ikm);
    let mut key = Zeroizing::new([0u8; 32]);
    hkdf.expand(info, key.as_mut())
        .map_err(|_| CryptoError::HkdfError)?;
    Ok(key)
}

/// Derive the symmetric channel key from a KEM shared secret.
///
/// Formula: channel_key = HKDF(shared_secret, "pqauth:channel:v1" || key_id)
pub fn derive_channel_key(
    shared_secret: &SharedSecret,
    key_id: &str,
) -> Result<Zeroizing<[u8; SYMMETRIC_KEY_SIZE]>> {
    let mut info = Vec::with_capacity(DOMAIN_CHANNEL_KEY.len() + key_id.len());
    info.extend_from_slice(DOMAIN_CHANNEL_KEY.as_bytes());
    info.extend_from_slice(key_id.as_bytes());
    hkdf_derive_32(shared_secret.as_bytes(), &info)
}
