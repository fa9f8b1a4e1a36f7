//! Session and credential revocation, and sealing of revocation log entries.

use crate::{errors::*, traits::*, types::*, validation};
use pqauth_crypto::{
    constant_time_compare, current_timestamp_ms, lookup_digest, seal_tag, shamir,
    utils::random_array, CryptoError, SecretShare, SYMMETRIC_KEY_SIZE,
};
use pqauth_policy::PolicyEngine;
use pqauth_storage::{column_families::*, traits::deserialize_value, BatchExt, Storage};
use serde_json::json;
use tracing::{debug, info};
use zeroize::Zeroizing;

use super::{CredentialService, MAX_CAS_ATTEMPTS};

const SEAL_THRESHOLD: u8 = 2;
const SEAL_SHARES: u8 = 3;

impl<S: Storage, P: PolicyEngine, A: AuditSink> CredentialService<S, P, A> {
    pub(crate) async fn revoke_internal(&self, session_token: &str) -> Result<RevokeResponse> {
        validation::session_token(session_token)?;
        let now = current_timestamp_ms();
        let token_digest = lookup_digest(session_token);

        let newly_revoked = self.revoke_session_digest(&token_digest, now).await?;

        let entry = RevocationLogEntry {
            event: "SESSION_REVOKED".to_string(),
            session_token: format!("{}...", &session_token[..8]),
            timestamp: now,
            reason: "USER_REQUEST".to_string(),
        };
        let (artifact, custody) = seal_entry(&entry)?;

        // The log only ever carries the tag; the shares completing the key stay in custody
        let mut batch = self.storage.batch();
        for share in &custody {
            let record = SealShare {
                sealed_at: now,
                share: share.to_bytes().to_vec(),
            };
            batch.put(CF_REVOCATION_SHARES, &(artifact.tag.as_str(), share.x), &record)?;
        }
        batch.commit().await?;
        drop(custody);

        info!(
            session = %entry.session_token,
            newly_revoked,
            "Session revoked"
        );
        self.audit(
            AuditEventType::SessionRevoked,
            json!({
                "entry": entry,
                "tag": artifact.tag,
            }),
        )
        .await;

        Ok(RevokeResponse {
            message: "Session revoked successfully".to_string(),
            artifact,
        })
    }

    /// Move the session under `token_digest` to `Revoked`.
    ///
    /// Unknown digests receive a revoked tombstone so the token can never be issued later.
    /// Returns `false` when the session was already revoked.
    pub(super) async fn revoke_session_digest(&self, token_digest: &str, now: u64) -> Result<bool> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let current: Option<Session> = self.storage.get(CF_SESSIONS, &token_digest).await?;
            match current {
                None => {
                    let tombstone =
                        Session::tombstone(token_digest.to_string(), now, self.config.session_ttl_ms);
                    if self
                        .storage
                        .put_if_absent(CF_SESSIONS, &token_digest, &tombstone)
                        .await?
                    {
                        return Ok(true);
                    }
                }
                Some(session) if session.state == SessionState::Revoked => return Ok(false),
                Some(session) => {
                    let mut revoked = session.clone();
                    revoked.state = SessionState::Revoked;
                    revoked.revoked_at = Some(now);
                    if self
                        .storage
                        .compare_and_swap(CF_SESSIONS, &token_digest, Some(&session), Some(&revoked))
                        .await?
                    {
                        return Ok(true);
                    }
                }
            }
        }
        Err(AuthError::Internal("session update contended".to_string()))
    }

    /// Check a revocation log entry against its artifact and the custody shares kept for it.
    ///
    /// Returns `Ok(false)` when the entry was altered, the artifact belongs to another entry, or
    /// the custody shares are no longer retained.
    pub async fn verify_revocation(
        &self,
        entry: &RevocationLogEntry,
        artifact: &RevocationArtifact,
    ) -> Result<bool> {
        let stored: Vec<(Vec<u8>, SealShare)> = self
            .storage
            .get_by_prefix(CF_REVOCATION_SHARES, &artifact.tag.as_str())
            .await?;
        if stored.is_empty() {
            debug!("No custody shares retained for revocation tag");
            return Ok(false);
        }
        let custody = stored
            .iter()
            .map(|(_, record)| SecretShare::from_bytes(&record.share).map_err(AuthError::from))
            .collect::<Result<Vec<_>>>()?;
        verify_seal(entry, artifact, custody)
    }

    pub(crate) async fn revoke_credential_internal(&self, key_id: &str) -> Result<()> {
        validation::key_id(key_id)?;
        let now = current_timestamp_ms();

        let mut revoked = false;
        for _ in 0..MAX_CAS_ATTEMPTS {
            let current = self
                .load_credential(key_id)
                .await?
                .ok_or(AuthError::CredentialUnavailable)?;
            if current.state == CredentialState::Revoked {
                revoked = true;
                break;
            }
            let mut updated = current.clone();
            updated.state = CredentialState::Revoked;
            updated.revoked_at = Some(now);
            if self
                .storage
                .compare_and_swap(CF_CREDENTIALS, &key_id, Some(&current), Some(&updated))
                .await?
            {
                revoked = true;
                break;
            }
        }
        if !revoked {
            return Err(AuthError::Internal(format!(
                "credential {key_id} update contended"
            )));
        }

        // Sessions under the credential
        let index: Vec<(Vec<u8>, ())> = self
            .storage
            .get_by_prefix(CF_SESSIONS_BY_KEY, &key_id)
            .await?;
        let mut sessions_revoked = 0;
        for (raw_key, ()) in &index {
            let (_, token_digest): (String, String) = deserialize_value(raw_key)?;
            if self.revoke_session_digest(&token_digest, now).await? {
                sessions_revoked += 1;
            }
        }

        // Without its custody shares the wrapped decapsulation key is unrecoverable
        let shares: Vec<(Vec<u8>, Vec<u8>)> = self
            .storage
            .get_by_prefix(CF_CUSTODY_SHARES, &key_id)
            .await?;
        let mut batch = self.storage.batch();
        for (raw_key, _) in shares {
            batch.delete_raw(CF_CUSTODY_SHARES, raw_key)?;
        }
        batch.commit().await?;

        self.scorer.forget(key_id);

        info!(key_id = %key_id, sessions_revoked, "Credential revoked");
        self.audit(
            AuditEventType::CredentialRevoked,
            json!({ "keyId": key_id, "sessionsRevoked": sessions_revoked }),
        )
        .await;
        Ok(())
    }
}

/// Seal a log entry under a one-time key split 2-of-3.
///
/// Returns the caller's artifact (share 1 plus tag) and the two custody shares.
fn seal_entry(entry: &RevocationLogEntry) -> Result<(RevocationArtifact, Vec<SecretShare>)> {
    let encoded =
        serde_json::to_vec(entry).map_err(|e| AuthError::SerializationError(e.to_string()))?;
    let sealing_key = Zeroizing::new(random_array::<SYMMETRIC_KEY_SIZE>()?);
    let tag = seal_tag(&sealing_key, &encoded);

    let mut shares = shamir::split(&sealing_key[..], SEAL_THRESHOLD, SEAL_SHARES)?.into_iter();
    let first = shares
        .next()
        .ok_or_else(|| AuthError::Internal("no sealing share produced".to_string()))?;
    let artifact = RevocationArtifact {
        share: first.to_hex().as_str().to_owned(),
        tag: hex::encode(tag),
    };

    debug!(event = %entry.event, "Sealed revocation entry");
    Ok((artifact, shares.collect()))
}

/// Check a revocation log entry against its artifact and at least one hex-encoded custody
/// share held outside the service.
///
/// Returns `Ok(false)` when the shares or tag do not match the entry.
pub fn verify_revocation_seal(
    entry: &RevocationLogEntry,
    artifact: &RevocationArtifact,
    custody_shares: &[String],
) -> Result<bool> {
    let custody = custody_shares
        .iter()
        .map(|share| SecretShare::from_hex(share).map_err(|_| malformed("shares")))
        .collect::<Result<Vec<_>>>()?;
    verify_seal(entry, artifact, custody)
}

fn verify_seal(
    entry: &RevocationLogEntry,
    artifact: &RevocationArtifact,
    custody: Vec<SecretShare>,
) -> Result<bool> {
    let mut shares = Vec::with_capacity(1 + custody.len());
    shares.push(SecretShare::from_hex(&artifact.share).map_err(|_| malformed("artifact.share"))?);
    shares.extend(custody);
    let expected_tag = hex::decode(&artifact.tag).map_err(|_| malformed("artifact.tag"))?;

    let sealing_key = match shamir::reconstruct(&shares) {
        Ok(key) => key,
        Err(CryptoError::MalformedSecret) => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    if sealing_key.len() != SYMMETRIC_KEY_SIZE {
        return Ok(false);
    }
    let mut key = Zeroizing::new([0u8; SYMMETRIC_KEY_SIZE]);
    key.copy_from_slice(&sealing_key);

    let encoded =
        serde_json::to_vec(entry).map_err(|e| AuthError::SerializationError(e.to_string()))?;
    Ok(constant_time_compare(&seal_tag(&key, &encoded), &expected_tag))
}

fn malformed(field: &str) -> AuthError {
    AuthError::validation(field, "malformed encoding")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex_shares(shares: &[SecretShare]) -> Vec<String> {
        shares.iter().map(|s| s.to_hex().as_str().to_owned()).collect()
    }

    fn entry() -> RevocationLogEntry {
        RevocationLogEntry {
            event: "SESSION_REVOKED".into(),
            session_token: "0123abcd...".into(),
            timestamp: 1_700_000_000_000,
            reason: "USER_REQUEST".into(),
        }
    }

    #[test]
    fn test_seal_verifies_with_any_custody_share() {
        let entry = entry();
        let (artifact, custody) = seal_entry(&entry).unwrap();
        let custody = hex_shares(&custody);
        assert_eq!(custody.len(), 2);
        assert_eq!(artifact.tag.len(), 64);

        for share in &custody {
            assert!(verify_revocation_seal(&entry, &artifact, std::slice::from_ref(share)).unwrap());
        }
    }

    #[test]
    fn test_tampered_entry_fails_verification() {
        let entry = entry();
        let (artifact, custody) = seal_entry(&entry).unwrap();
        let custody = hex_shares(&custody);

        let mut tampered = entry.clone();
        tampered.reason = "ADMIN".into();
        assert!(!verify_revocation_seal(&tampered, &artifact, &custody[..1]).unwrap());
    }

    #[test]
    fn test_artifact_alone_is_below_quorum() {
        let entry = entry();
        let (artifact, _) = seal_entry(&entry).unwrap();
        let err = verify_revocation_seal(&entry, &artifact, &[]).unwrap_err();
        assert!(matches!(err, AuthError::ShareQuorum(_)));
    }

    #[test]
    fn test_shares_from_another_seal_do_not_verify() {
        let entry = entry();
        let (artifact, _) = seal_entry(&entry).unwrap();
        let (_, other_custody) = seal_entry(&entry).unwrap();
        let other_custody = hex_shares(&other_custody);
        let verified = verify_revocation_seal(&entry, &artifact, &other_custody[..1]).unwrap_or(false);
        assert!(!verified);
    }

    #[test]
    fn test_malformed_artifact_is_validation_error() {
        let entry = entry();
        let (mut artifact, custody) = seal_entry(&entry).unwrap();
        let custody = hex_shares(&custody);
        artifact.share = "zz".into();
        let err = verify_revocation_seal(&entry, &artifact, &custody).unwrap_err();
        assert!(matches!(err, AuthError::Validation { .. }));
    }
}
