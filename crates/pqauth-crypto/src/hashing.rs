//! Lookup digests (SHA-256), log-sealing tags (keyed BLAKE3) and constant-time comparison.

use crate::constants::*;
use blake3::Hasher as Blake3Hasher;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Keyed BLAKE3 tag over `data`, bound to the log-sealing domain.
pub fn seal_tag(key: &[u8; SYMMETRIC_KEY_SIZE], data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake3Hasher::new_keyed(key);
    hasher.update(DOMAIN_LOG_SEAL.as_bytes());
    hasher.update(data);
    hasher.finalize().into()
}

/// Digest under which a bearer secret (api key, session token) is stored.
///
/// Stores only ever see this digest, so a dump of the store does not reveal usable
/// credentials.
pub fn lookup_digest(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(DOMAIN_LOOKUP_DIGEST.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Securely compare two byte slices in constant time
///
/// Length mismatch returns false immediately; lengths are public in every caller.
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
