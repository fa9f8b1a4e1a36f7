//! Custody-backed key exchange with a credential's ML-KEM key.

use crate::{errors::*, traits::*, types::*, validation};
use pqauth_crypto::{
    current_timestamp_ms, derive_channel_key, kem, recover_secret, unwrap_kem_secret,
    AccessGate, ChannelRole, KemCiphertext, KemPublicKey, KeyCapabilities, SecretKeyHandle,
    SecretShare, SecureChannel, SYMMETRIC_KEY_SIZE,
};
use pqauth_policy::PolicyEngine;
use pqauth_storage::{column_families::*, Storage};
use tracing::debug;
use zeroize::Zeroizing;

use super::CredentialService;

impl<S: Storage, P: PolicyEngine, A: AuditSink> CredentialService<S, P, A> {
    /// Stored custody shares of a credential's wrapping key, in share order
    pub(super) async fn load_custody_shares(&self, key_id: &str) -> Result<Vec<SecretShare>> {
        let entries: Vec<(Vec<u8>, Vec<u8>)> = self
            .storage
            .get_by_prefix(CF_CUSTODY_SHARES, &key_id)
            .await?;
        entries
            .iter()
            .map(|(_, bytes)| SecretShare::from_bytes(bytes).map_err(AuthError::from))
            .collect()
    }

    /// Responder side of a channel opened with [`open_channel`].
    ///
    /// Recovers the wrapping key from custody and decapsulates `ciphertext`; both steps are
    /// approved by `gate`.
    pub async fn establish_channel(
        &self,
        key_id: &str,
        ciphertext: &KemCiphertext,
        gate: &dyn AccessGate,
    ) -> Result<SecureChannel> {
        validation::key_id(key_id)?;
        let now = current_timestamp_ms();

        let credential = self
            .load_credential(key_id)
            .await?
            .filter(|c| {
                matches!(
                    c.effective_state(now),
                    CredentialState::Issued | CredentialState::Active
                )
            })
            .ok_or(AuthError::CredentialUnavailable)?;

        let shares = self.load_custody_shares(key_id).await?;
        let recovered = recover_secret(gate, &shares, "establish_channel")?;
        if recovered.len() != SYMMETRIC_KEY_SIZE {
            return Err(AuthError::Internal(
                "custody secret has unexpected length".to_string(),
            ));
        }
        let mut wrapping_key = Zeroizing::new([0u8; SYMMETRIC_KEY_SIZE]);
        wrapping_key.copy_from_slice(&recovered);
        drop(recovered);

        let secret_key = unwrap_kem_secret(&wrapping_key, &credential.wrapped_kem_secret, key_id)?;
        let handle = SecretKeyHandle::new(secret_key, KeyCapabilities::DECAPSULATE);
        let shared_secret = handle.decapsulate(gate, ciphertext)?;
        let channel_key = derive_channel_key(&shared_secret, key_id)?;

        debug!(key_id = %key_id, "Channel established");
        Ok(SecureChannel::new(channel_key, ChannelRole::Responder))
    }
}

/// Initiator side: encapsulate against a credential's public key.
///
/// Send the returned ciphertext to the credential holder, who answers with
/// [`CredentialService::establish_channel`].
pub fn open_channel(
    public_key: &KemPublicKey,
    key_id: &str,
) -> Result<(KemCiphertext, SecureChannel)> {
    let (ciphertext, shared_secret) = kem::encapsulate(public_key)?;
    let channel_key = derive_channel_key(&shared_secret, key_id)?;
    Ok((ciphertext, SecureChannel::new(channel_key, ChannelRole::Initiator)))
}
