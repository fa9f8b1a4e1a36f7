//! Read paths with lazy expiry.

use crate::{errors::*, traits::*, types::*, validation};
use pqauth_crypto::{current_timestamp_ms, lookup_digest};
use pqauth_policy::PolicyEngine;
use pqauth_storage::{column_families::*, Storage};

use super::CredentialService;

impl<S: Storage, P: PolicyEngine, A: AuditSink> CredentialService<S, P, A> {
    pub(crate) async fn validate_session_internal(&self, session_token: &str) -> Result<Session> {
        validation::session_token(session_token)?;
        let now = current_timestamp_ms();

        let session: Session = self
            .storage
            .get(CF_SESSIONS, &lookup_digest(session_token))
            .await?
            .ok_or(AuthError::SessionInvalid)?;
        if session.effective_state(now) != SessionState::Active {
            return Err(AuthError::SessionInvalid);
        }

        // A revoked or expired credential takes its sessions with it
        let credential = self
            .load_credential(&session.key_id)
            .await?
            .ok_or(AuthError::SessionInvalid)?;
        match credential.effective_state(now) {
            CredentialState::Issued | CredentialState::Active => Ok(session),
            CredentialState::Expired | CredentialState::Revoked => Err(AuthError::SessionInvalid),
        }
    }

    pub(crate) async fn get_credential_internal(&self, key_id: &str) -> Result<CredentialInfo> {
        validation::key_id(key_id)?;
        let credential = self
            .load_credential(key_id)
            .await?
            .ok_or(AuthError::CredentialUnavailable)?;
        Ok(CredentialInfo::from_credential(
            &credential,
            current_timestamp_ms(),
        ))
    }
}
