//! # pqauth-crypto
//!
//! Post-quantum primitives for the pqauth credential pipeline.
//!
//! - [`kem`]: ML-KEM-768 key encapsulation with implicit rejection
//! - [`signature`]: ML-DSA-65 hedged signatures with a bounded rejection loop
//! - [`shamir`]: threshold secret sharing over GF(2^521 - 1)
//! - [`keys`]: capability-gated secret key handles
//! - AEAD wrapping, HKDF channel keys, keyed BLAKE3 sealing and lookup digests
//!
//! ## Security Properties
//!
//! - All sensitive material is zeroized after use
//! - Secret-dependent comparisons and selections are constant-time
//! - No unsafe code
//! - Strict domain separation for all key derivations

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod constants;
pub mod derivation;
pub mod encryption;
pub mod errors;
pub mod hashing;
pub mod kem;
pub mod keys;
pub mod shamir;
pub mod signature;
pub mod utils;
mod xof;

pub use channel::{ChannelRole, SecureChannel};
pub use constants::*;
pub use derivation::*;
pub use encryption::*;
pub use errors::{CryptoError, Result};
pub use hashing::*;
pub use kem::{KemCiphertext, KemKeyPair, KemPublicKey, KemSecretKey, SharedSecret};
pub use keys::*;
pub use shamir::{FieldElement, SecretShare};
pub use signature::{Signature, SignatureKeyPair, SignaturePublicKey, SignatureSecretKey};
pub use utils::current_timestamp_ms;
