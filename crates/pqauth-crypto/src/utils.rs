//! Common utility functions for pqauth cryptographic operations.

use crate::errors::{CryptoError, Result};
use rand::rngs::OsRng;
use rand::RngCore;
use std::time::{SystemTime, UNIX_EPOCH};
use zeroize::Zeroizing;

/// Returns the current Unix timestamp in milliseconds.
///
/// A clock set before the Unix epoch reads as zero rather than panicking; callers comparing
/// against client timestamps will then reject everything, which is the safe failure.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Fill `buf` from the operating system random source.
pub fn fill_random(buf: &mut [u8]) -> Result<()> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| CryptoError::EntropyUnavailable(e.to_string()))
}

/// Draw a fixed-size array from the operating system random source.
pub fn random_array<const N: usize>() -> Result<[u8; N]> {
    let mut out = [0u8; N];
    fill_random(&mut out)?;
    Ok(out)
}

/// Draw `len` random bytes and hex-encode them.
///
/// Used for API keys, key identifiers and session tokens.
pub fn random_hex(len: usize) -> Result<String> {
    let mut bytes = Zeroizing::new(vec![0u8; len]);
    fill_random(&mut bytes)?;
    Ok(hex::encode(&*bytes))
}
