//! Authentication: replay window, behavioral gate, policy, signature, session issue.

use crate::{errors::*, traits::*, types::*, validation};
use pqauth_crypto::{
    current_timestamp_ms, lookup_digest, signature, utils::random_hex, SignaturePublicKey,
};
use pqauth_policy::{attrs, AttributeValue, Attributes, PolicyEngine};
use pqauth_risk::RequestContext;
use pqauth_storage::{column_families::*, Storage};
use serde_json::json;
use tracing::{debug, info, warn};

use super::{CredentialService, DECOY_KEY_ID, MAX_CAS_ATTEMPTS};

const MS_PER_HOUR: u64 = 3_600_000;

/// Fresh tokens drawn before a digest collision is treated as an internal fault
const MAX_TOKEN_ATTEMPTS: usize = 4;

impl<S: Storage, P: PolicyEngine, A: AuditSink> CredentialService<S, P, A> {
    pub(crate) async fn authenticate_internal(
        &self,
        request: AuthenticateRequest,
    ) -> Result<AuthenticateResponse> {
        let signature = validation::authenticate_request(&request)?;
        let now = current_timestamp_ms();

        // Anti-replay, before any cryptographic work
        let skew_ms = now.abs_diff(request.timestamp);
        if skew_ms > self.config.replay_window_ms {
            return Err(self.reject(None, AuthError::Replay { skew_ms }).await);
        }

        let credential = self.find_by_api_key(&request.api_key).await?;
        let key_id = credential.as_ref().map(|c| c.key_id.clone());

        let context = RequestContext {
            key_id: key_id.clone(),
            client_id: credential.as_ref().map(|c| c.client_id.clone()),
            device_fingerprint: request.device_fingerprint.clone(),
            coordinates: request.context.coordinates,
            network_type: request.context.network_type.clone(),
            timestamp_ms: now,
        };
        let risk = self.scorer.score(&context);
        if !risk.passes(self.config.auth_risk_threshold) {
            debug!(score = risk.score, signals = ?risk.signals, "Behavioral gate failed");
            let err = AuthError::BehavioralRejection {
                score: risk.score,
                threshold: self.config.auth_risk_threshold,
            };
            return Err(self.reject(key_id.as_deref(), err).await);
        }

        // Policy and signature are both evaluated whatever the outcome of the other, and an
        // unknown API key runs against the decoy with the same storage reads, so every 401
        // costs the same.
        let stored_policy = self
            .load_policy(credential.as_ref().map_or(DECOY_KEY_ID, |c| c.key_id.as_str()))
            .await?;
        let (policy, verification_key) = match &credential {
            Some(c) => (
                stored_policy.ok_or_else(|| {
                    AuthError::Internal(format!("policy missing for credential {}", c.key_id))
                })?,
                SignaturePublicKey::from_bytes(&c.verification_key)?,
            ),
            None => (
                self.decoy.policy.clone(),
                self.decoy.verification_key.clone(),
            ),
        };
        let attributes = policy_attributes(&request, risk.score, now);
        let decision = self.policy_engine.evaluate(&policy, &attributes);

        let message = format!("{}:{}", request.api_key, request.timestamp);
        let signature_valid = signature::verify(message.as_bytes(), &signature, &verification_key);

        let Some(credential) = credential else {
            return Err(self.reject(None, AuthError::CredentialUnavailable).await);
        };
        if !decision.is_permit() {
            let err = AuthError::PolicyDenied {
                rule_id: decision.matched_rule_id,
            };
            return Err(self.reject(Some(credential.key_id.as_str()), err).await);
        }
        if !signature_valid {
            return Err(self
                .reject(Some(credential.key_id.as_str()), AuthError::SignatureInvalid)
                .await);
        }

        let credential = match self.consume_call(&credential.key_id, now).await {
            Ok(updated) => updated,
            Err(err) => return Err(self.reject(Some(credential.key_id.as_str()), err).await),
        };

        let (session_token, session) = self.issue_session(&credential, risk.score, now).await?;
        self.scorer.record_success(&context);

        info!(
            key_id = %credential.key_id,
            session = %&session_token[..8],
            score = risk.score,
            call_count = credential.call_count,
            "Authenticated"
        );
        self.audit(
            AuditEventType::Authenticated,
            json!({
                "keyId": credential.key_id,
                "sessionToken": format!("{}...", &session_token[..8]),
                "behavioralScore": risk.score,
                "expiresAt": session.expires_at,
            }),
        )
        .await;

        Ok(AuthenticateResponse {
            session_token,
            expires_at: session.expires_at,
            permissions: session.permissions.iter().cloned().collect(),
            pqc_status: PQC_STATUS_VERIFIED.to_string(),
            abac_status: ABAC_STATUS_PERMIT.to_string(),
            behavioral_score: risk.score,
        })
    }

    async fn find_by_api_key(&self, api_key: &str) -> Result<Option<Credential>> {
        let digest = lookup_digest(api_key);
        let key_id: Option<String> = self.storage.get(CF_API_KEY_INDEX, &digest).await?;
        let credential = self
            .load_credential(key_id.as_deref().unwrap_or(DECOY_KEY_ID))
            .await?;
        Ok(key_id.and(credential))
    }

    /// Count one call against the credential, atomically with its state, expiry and quota.
    async fn consume_call(&self, key_id: &str, now: u64) -> Result<Credential> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let current = self
                .load_credential(key_id)
                .await?
                .ok_or(AuthError::CredentialUnavailable)?;
            if !current.is_usable(now) {
                return Err(AuthError::CredentialUnavailable);
            }

            let mut updated = current.clone();
            updated.call_count += 1;
            updated.state = CredentialState::Active;

            if self
                .storage
                .compare_and_swap(CF_CREDENTIALS, &key_id, Some(&current), Some(&updated))
                .await?
            {
                return Ok(updated);
            }
        }
        Err(AuthError::Internal(format!(
            "credential {key_id} update contended"
        )))
    }

    async fn issue_session(
        &self,
        credential: &Credential,
        risk_score: f64,
        now: u64,
    ) -> Result<(String, Session)> {
        for _ in 0..MAX_TOKEN_ATTEMPTS {
            let token = random_hex(32)?;
            let token_digest = lookup_digest(&token);
            let session = Session {
                token_digest: token_digest.clone(),
                key_id: credential.key_id.clone(),
                issued_at: now,
                expires_at: now.saturating_add(self.config.session_ttl_ms),
                permissions: credential.permissions.clone(),
                risk_score_at_issue: risk_score,
                state: SessionState::Active,
                revoked_at: None,
            };

            if self
                .storage
                .put_if_absent(CF_SESSIONS, &token_digest, &session)
                .await?
            {
                self.storage
                    .put(
                        CF_SESSIONS_BY_KEY,
                        &(credential.key_id.as_str(), token_digest.as_str()),
                        &(),
                    )
                    .await?;
                return Ok((token, session));
            }
        }
        Err(AuthError::Internal("session token collision".to_string()))
    }

    /// Log and audit a refused authentication, returning the error.
    async fn reject(&self, key_id: Option<&str>, err: AuthError) -> AuthError {
        warn!(
            key_id = key_id.unwrap_or("unknown"),
            reason = %err,
            "Authentication rejected"
        );
        self.audit(
            AuditEventType::AuthenticationRejected,
            json!({
                "keyId": key_id,
                "reason": err.to_string(),
            }),
        )
        .await;
        err
    }
}

/// Attributes the policy sees for one request
fn policy_attributes(request: &AuthenticateRequest, behavioral_score: f64, now: u64) -> Attributes {
    let mut attributes = Attributes::new();
    attributes.insert(
        attrs::DEVICE_FINGERPRINT.to_string(),
        AttributeValue::from(request.device_fingerprint.as_str()),
    );
    attributes.insert(
        attrs::TIMESTAMP.to_string(),
        AttributeValue::Number(request.timestamp as f64),
    );
    attributes.insert(
        attrs::BEHAVIORAL_SCORE.to_string(),
        AttributeValue::Number(behavioral_score),
    );
    attributes.insert(
        attrs::TIME_OF_DAY.to_string(),
        AttributeValue::Number(((now / MS_PER_HOUR) % 24) as f64),
    );
    for (name, value) in [
        (attrs::LOCATION, &request.context.location),
        (attrs::DEVICE_INTEGRITY, &request.context.device_integrity),
        (attrs::NETWORK_TYPE, &request.context.network_type),
    ] {
        if let Some(value) = value {
            attributes.insert(name.to_string(), AttributeValue::from(value.as_str()));
        }
    }
    attributes
}
