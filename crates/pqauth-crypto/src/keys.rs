//! Capability-gated secret key handles.
//!
//! Secret key bytes never leave a [`SecretKeyHandle`]. Each use names the capability it needs
//! and a human-readable purpose; the handle checks its own capability set and then asks an
//! [`AccessGate`] (a hardware key store, a biometric prompt, an operator policy) to approve.

use crate::{
    errors::*,
    kem::{self, KemCiphertext, KemSecretKey, SharedSecret},
    shamir::{self, SecretShare},
    signature::{self, Signature, SignatureSecretKey},
};
use bitflags::bitflags;
use zeroize::Zeroizing;

bitflags! {
    /// Operations a secret key handle may be used for
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct KeyCapabilities: u32 {
        /// Decapsulate KEM ciphertexts
        const DECAPSULATE = 0b0000_0001;
        /// Produce signatures
        const SIGN = 0b0000_0010;
        /// Reconstruct custody secrets from shares
        const RECOVER = 0b0000_0100;
    }
}

/// Approves or refuses a use of secret key material.
pub trait AccessGate: Send + Sync {
    /// Authorize `capability` for `purpose`; refusals return [`CryptoError::AccessDenied`].
    fn authorize(&self, capability: KeyCapabilities, purpose: &str) -> Result<()>;
}

/// Gate that approves every request
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllGate;

impl AccessGate for AllowAllGate {
    fn authorize(&self, _capability: KeyCapabilities, _purpose: &str) -> Result<()> {
        Ok(())
    }
}

/// Gate that refuses every request
#[derive(Debug, Default, Clone, Copy)]
pub struct DenyAllGate;

impl AccessGate for DenyAllGate {
    fn authorize(&self, _capability: KeyCapabilities, purpose: &str) -> Result<()> {
        Err(CryptoError::AccessDenied {
            purpose: purpose.to_string(),
        })
    }
}

/// Zeroizing owner of secret key bytes plus the capabilities they may be used for.
pub struct SecretKeyHandle {
    bytes: Zeroizing<Vec<u8>>,
    capabilities: KeyCapabilities,
}

impl SecretKeyHandle {
    /// Take ownership of `bytes`.
    pub fn new(bytes: Zeroizing<Vec<u8>>, capabilities: KeyCapabilities) -> Self {
        Self {
            bytes,
            capabilities,
        }
    }

    /// Capabilities granted to this handle
    pub fn capabilities(&self) -> KeyCapabilities {
        self.capabilities
    }

    /// Run `f` over the secret bytes once the handle and the gate allow `capability`.
    pub fn with_secret<T>(
        &self,
        gate: &dyn AccessGate,
        capability: KeyCapabilities,
        purpose: &str,
        f: impl FnOnce(&[u8]) -> Result<T>,
    ) -> Result<T> {
        if !self.capabilities.contains(capability) {
            return Err(CryptoError::AccessDenied {
                purpose: purpose.to_string(),
            });
        }
        gate.authorize(capability, purpose)?;
        f(&self.bytes)
    }

    /// Decapsulate `ciphertext` with the held ML-KEM key.
    pub fn decapsulate(
        &self,
        gate: &dyn AccessGate,
        ciphertext: &KemCiphertext,
    ) -> Result<SharedSecret> {
        self.with_secret(gate, KeyCapabilities::DECAPSULATE, "decapsulate", |bytes| {
            let secret_key = KemSecretKey::from_bytes(bytes)?;
            kem::decapsulate(ciphertext, &secret_key)
        })
    }

    /// Sign `message` with the held ML-DSA key.
    pub fn sign(&self, gate: &dyn AccessGate, message: &[u8]) -> Result<Signature> {
        self.with_secret(gate, KeyCapabilities::SIGN, "sign", |bytes| {
            let secret_key = SignatureSecretKey::from_bytes(bytes)?;
            signature::sign(message, &secret_key)
        })
    }
}

impl std::fmt::Debug for SecretKeyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretKeyHandle")
            .field("bytes", &"[REDACTED]")
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

/// Reconstruct a custody secret after the gate approves recovery.
pub fn recover_secret(
    gate: &dyn AccessGate,
    shares: &[SecretShare],
    purpose: &str,
) -> Result<Zeroizing<Vec<u8>>> {
    gate.authorize(KeyCapabilities::RECOVER, purpose)?;
    shamir::reconstruct(shares)
}
