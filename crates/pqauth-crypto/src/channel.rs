//! Authenticated message channel keyed from a KEM exchange.
//!
//! Each side holds a [`SecureChannel`] built from the same channel key. Nonces are derived from
//! a direction byte and a monotonically increasing counter, so a key never sees a repeated
//! nonce while the counter is below `u64::MAX`.

use crate::{constants::*, encryption, errors::*};
use zeroize::Zeroizing;

/// Which side of the exchange a channel endpoint represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRole {
    /// The party that encapsulated against the credential's public key
    Initiator,
    /// The credential holder that decapsulated
    Responder,
}

impl ChannelRole {
    fn direction(self) -> u8 {
        match self {
            ChannelRole::Initiator => 0x01,
            ChannelRole::Responder => 0x02,
        }
    }

    fn peer(self) -> Self {
        match self {
            ChannelRole::Initiator => ChannelRole::Responder,
            ChannelRole::Responder => ChannelRole::Initiator,
        }
    }
}

/// One endpoint of a KEM-keyed XChaCha20-Poly1305 channel.
pub struct SecureChannel {
    key: Zeroizing<[u8; SYMMETRIC_KEY_SIZE]>,
    role: ChannelRole,
    send_counter: u64,
    recv_counter: u64,
}

impl std::fmt::Debug for SecureChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureChannel")
            .field("key", &"[REDACTED]")
            .field("role", &self.role)
            .field("send_counter", &self.send_counter)
            .field("recv_counter", &self.recv_counter)
            .finish()
    }
}

impl SecureChannel {
    /// Create an endpoint from a derived channel key.
    pub fn new(key: Zeroizing<[u8; SYMMETRIC_KEY_SIZE]>, role: ChannelRole) -> Self {
        Self {
            key,
            role,
            send_counter: 0,
            recv_counter: 0,
        }
    }

    fn nonce(direction: u8, counter: u64) -> [u8; NONCE_SIZE] {
        let mut nonce = [0u8; NONCE_SIZE];
        nonce[0] = direction;
        nonce[NONCE_SIZE - 8..].copy_from_slice(&counter.to_be_bytes());
        nonce
    }

    /// Encrypt the next outbound message.
    pub fn seal(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let counter = self.send_counter;
        self.send_counter = counter
            .checked_add(1)
            .ok_or_else(|| CryptoError::EncryptionFailed("channel counter exhausted".into()))?;
        let nonce = Self::nonce(self.role.direction(), counter);
        encryption::encrypt(&self.key, plaintext, &nonce, &counter.to_be_bytes())
    }

    /// Decrypt the next inbound message. Messages must arrive in order.
    pub fn open(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let counter = self.recv_counter;
        let nonce = Self::nonce(self.role.peer().direction(), counter);
        let plaintext = encryption::decrypt(&self.key, ciphertext, &nonce, &counter.to_be_bytes())?;
        self.recv_counter = counter + 1;
        Ok(plaintext)
    }
}
