//! Cryptographic error types.

use thiserror::Error;

/// Cryptographic operation errors
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The operating system random source could not supply entropy
    #[error("Entropy unavailable: {0}")]
    EntropyUnavailable(String),

    /// Invalid key size
    #[error("Invalid key size: expected {expected}, got {actual}")]
    InvalidKeySize {
        /// Expected key size in bytes
        expected: usize,
        /// Actual key size in bytes
        actual: usize,
    },

    /// Encapsulation key failed the modulus check
    #[error("Invalid public key encoding")]
    InvalidPublicKey,

    /// Decapsulation key failed the embedded hash check
    #[error("Invalid secret key encoding")]
    InvalidSecretKey,

    /// Ciphertext has the wrong length
    #[error("Invalid ciphertext size: expected {expected}, got {actual}")]
    InvalidCiphertext {
        /// Expected ciphertext size in bytes
        expected: usize,
        /// Actual ciphertext size in bytes
        actual: usize,
    },

    /// Signature context string exceeds 255 bytes
    #[error("Signature context too long: {0} bytes")]
    ContextTooLong(usize),

    /// Rejection sampling did not converge within the attempt budget
    #[error("Signing exhausted after {attempts} attempts")]
    SigningExhausted {
        /// Number of attempts performed
        attempts: u32,
    },

    /// Invalid nonce size
    #[error("Invalid nonce size: expected {expected}, got {actual}")]
    InvalidNonceSize {
        /// Expected nonce size in bytes
        expected: usize,
        /// Actual nonce size in bytes
        actual: usize,
    },

    /// Encryption failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption failed
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// HKDF error
    #[error("HKDF error: insufficient output length")]
    HkdfError,

    /// Threshold parameters outside `2 <= k <= n <= 255`
    #[error("Invalid threshold: k={threshold}, n={total}")]
    InvalidThreshold {
        /// Requested threshold
        threshold: usize,
        /// Requested share count
        total: usize,
    },

    /// Secret is empty
    #[error("Secret must not be empty")]
    EmptySecret,

    /// Secret does not fit in the sharing field
    #[error("Secret too large: {size} bytes (max {max})")]
    SecretTooLarge {
        /// Secret size in bytes
        size: usize,
        /// Maximum supported size in bytes
        max: usize,
    },

    /// Too few, duplicated or inconsistent shares
    #[error("Share quorum not met: {0}")]
    ShareQuorum(String),

    /// Reconstructed value is not a well-formed secret
    #[error("Reconstructed secret is malformed")]
    MalformedSecret,

    /// Share encoding could not be parsed
    #[error("Invalid share encoding: {0}")]
    InvalidShareEncoding(String),

    /// Capability gate refused access to secret key material
    #[error("Access to secret key denied for {purpose}")]
    AccessDenied {
        /// What the secret was requested for
        purpose: String,
    },

    /// Invalid input data
    #[error("Invalid input data: {0}")]
    InvalidInput(String),
}

/// Result type for cryptographic operations
pub type Result<T> = std::result::Result<T, CryptoError>;
