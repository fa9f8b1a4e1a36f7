//! Cryptographic constants and domain separation strings.
//!
//! Sizes follow FIPS 203 (ML-KEM-768) and FIPS 204 (ML-DSA-65). Domain separation strings use
//! the `pqauth:{purpose}:v{version}` format and MUST NOT change once data has been sealed.

/// Algorithm tag advertised for the key encapsulation mechanism
pub const KEM_ALGORITHM: &str = "ML-KEM-768";

/// Algorithm tag advertised for the signature scheme
pub const SIGNATURE_ALGORITHM: &str = "ML-DSA-65";

/// ML-KEM-768 encapsulation (public) key size in bytes
pub const KEM_PUBLIC_KEY_SIZE: usize = 1184;

/// ML-KEM-768 decapsulation (secret) key size in bytes
pub const KEM_SECRET_KEY_SIZE: usize = 2400;

/// ML-KEM-768 ciphertext size in bytes
pub const KEM_CIPHERTEXT_SIZE: usize = 1088;

/// Size of the KEM shared secret in bytes
pub const KEM_SHARED_SECRET_SIZE: usize = 32;

/// ML-DSA-65 verification (public) key size in bytes
pub const SIGNATURE_PUBLIC_KEY_SIZE: usize = 1952;

/// ML-DSA-65 signing (secret) key size in bytes
pub const SIGNATURE_SECRET_KEY_SIZE: usize = 4032;

/// ML-DSA-65 signature size in bytes
pub const SIGNATURE_SIZE: usize = 3309;

/// Hard cap on rejection-sampling iterations during signing
pub const MAX_SIGNING_ATTEMPTS: u32 = 1024;

/// Maximum length of an ML-DSA context string
pub const MAX_CONTEXT_SIZE: usize = 255;

/// Size of seeds drawn from the OS random source
pub const SEED_SIZE: usize = 32;

/// Size of XChaCha20-Poly1305 nonces in bytes (192 bits)
pub const NONCE_SIZE: usize = 24;

/// Size of XChaCha20-Poly1305 authentication tags in bytes (128 bits)
pub const TAG_SIZE: usize = 16;

/// Size of symmetric keys (wrapping keys, channel keys, sealing keys)
pub const SYMMETRIC_KEY_SIZE: usize = 32;

/// Largest secret accepted by the secret-sharing field (bytes)
pub const MAX_SHARED_SECRET_SIZE: usize = 64;

/// Encoded size of a field element (ceil(521 / 8))
pub const FIELD_ELEMENT_SIZE: usize = 66;

/// Default custody threshold (3 of 5)
pub const CUSTODY_THRESHOLD: u8 = 3;

/// Default number of custody shares
pub const CUSTODY_TOTAL_SHARES: u8 = 5;

/// Domain separation for channel keys derived from a KEM shared secret
/// Format: "pqauth:channel:v1" || key_id
pub const DOMAIN_CHANNEL_KEY: &str = "pqauth:channel:v1";

/// AAD prefix for KEM secret keys wrapped at rest
/// Format: "pqauth:kem-wrap:v1" || key_id
pub const DOMAIN_KEM_WRAP_AAD: &str = "pqauth:kem-wrap:v1";

/// Context for BLAKE3 keyed tags sealing forensic log entries
pub const DOMAIN_LOG_SEAL: &str = "pqauth:log-seal:v1";

/// Domain separation for lookup digests of bearer secrets (api keys, session tokens)
pub const DOMAIN_LOOKUP_DIGEST: &str = "pqauth:lookup:v1";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants_are_correct_sizes() {
        assert_eq!(KEM_PUBLIC_KEY_SIZE, 384 * 3 + 32);
        assert_eq!(KEM_SECRET_KEY_SIZE, 768 * 3 + 96);
        assert_eq!(KEM_CIPHERTEXT_SIZE, 32 * (10 * 3 + 4));
        assert_eq!(SIGNATURE_PUBLIC_KEY_SIZE, 32 + 32 * 6 * 10);
        assert_eq!(SIGNATURE_SIZE, 48 + 32 * 5 * 20 + 55 + 6);
        assert_eq!(NONCE_SIZE, 24);
        assert_eq!(TAG_SIZE, 16);
    }

    #[test]
    fn test_domain_strings_follow_format() {
        for domain in [
            DOMAIN_CHANNEL_KEY,
            DOMAIN_KEM_WRAP_AAD,
            DOMAIN_LOG_SEAL,
            DOMAIN_LOOKUP_DIGEST,
        ] {
            assert!(domain.starts_with("pqauth:"));
            assert!(domain.ends_with(":v1"));
        }
    }

    #[test]
    fn test_custody_threshold_is_valid() {
        let threshold = CUSTODY_THRESHOLD;
        let total = CUSTODY_TOTAL_SHARES;
        assert!(threshold >= 2);
        assert!(threshold <= total, "Threshold must be <= total shares");
    }
}
