//! Credential minting.

use crate::{errors::*, traits::*, types::*, validation};
use pqauth_crypto::{
    current_timestamp_ms, kem, lookup_digest, shamir, signature, utils::random_array,
    utils::random_hex, wrap_kem_secret, KEM_ALGORITHM, SIGNATURE_ALGORITHM, SYMMETRIC_KEY_SIZE,
};
use pqauth_policy::PolicyEngine;
use pqauth_risk::RequestContext;
use pqauth_storage::{column_families::*, BatchExt, Storage};
use serde_json::json;
use tracing::{info, warn};
use zeroize::Zeroizing;

use super::CredentialService;

impl<S: Storage, P: PolicyEngine, A: AuditSink> CredentialService<S, P, A> {
    pub(crate) async fn generate_credential_internal(
        &self,
        request: GenerateCredentialRequest,
    ) -> Result<GenerateCredentialResponse> {
        let permissions = validation::generate_request(&request)?;
        let now = current_timestamp_ms();

        // Behavioral gate
        let fingerprint = request
            .device_fingerprint
            .clone()
            .unwrap_or_else(|| request.client_id.clone());
        let risk = self.scorer.score(&RequestContext {
            key_id: None,
            client_id: Some(request.client_id.clone()),
            device_fingerprint: fingerprint,
            coordinates: request.context.coordinates,
            network_type: request.context.network_type.clone(),
            timestamp_ms: now,
        });
        if !risk.passes(self.config.request_risk_threshold) {
            warn!(
                client_id = %request.client_id,
                score = risk.score,
                signals = ?risk.signals,
                "Credential request rejected by behavioral gate"
            );
            return Err(AuthError::BehavioralRejection {
                score: risk.score,
                threshold: self.config.request_risk_threshold,
            });
        }

        let key_id = random_hex(16)?;
        let api_key = Zeroizing::new(random_hex(32)?);

        let (kem_public_key, kem_secret_key) = kem::generate_keypair()?.into_parts();
        let (verification_key, signing_key) = signature::generate_keypair()?.into_parts();

        // Custody: the decapsulation key is stored wrapped, the wrapping key only as shares
        let wrapping_key = Zeroizing::new(random_array::<SYMMETRIC_KEY_SIZE>()?);
        let wrapped_kem_secret = wrap_kem_secret(&wrapping_key, kem_secret_key.as_bytes(), &key_id)?;
        drop(kem_secret_key);
        let shares = shamir::split(
            &wrapping_key[..],
            self.config.custody_threshold,
            self.config.custody_shares,
        )?;
        drop(wrapping_key);

        let policy = self
            .policy_engine
            .create_policy(&key_id, &permissions, &request.attributes)?;

        let credential = Credential {
            key_id: key_id.clone(),
            client_id: request.client_id.clone(),
            api_key_hash: lookup_digest(&api_key),
            permissions: permissions.clone(),
            policy_id: policy.id,
            attributes: request.attributes.clone(),
            created_at: now,
            expires_at: now.saturating_add(self.config.credential_ttl_ms),
            max_calls: self.config.max_calls,
            call_count: 0,
            state: CredentialState::Issued,
            revoked_at: None,
            verification_key: verification_key.as_bytes().to_vec(),
            kem_public_key: kem_public_key.as_bytes().to_vec(),
            wrapped_kem_secret,
            custody_threshold: self.config.custody_threshold,
            custody_shares: self.config.custody_shares,
        };

        let mut batch = self.storage.batch();
        batch.put(CF_CREDENTIALS, &key_id, &credential)?;
        batch.put(CF_API_KEY_INDEX, &credential.api_key_hash, &key_id)?;
        batch.put(CF_POLICIES, &key_id, &policy)?;
        for share in &shares {
            let encoded = share.to_bytes();
            batch.put(CF_CUSTODY_SHARES, &(key_id.as_str(), share.x), &*encoded)?;
        }
        batch.commit().await?;
        drop(shares);

        info!(
            key_id = %key_id,
            client_id = %request.client_id,
            score = risk.score,
            "Credential issued"
        );
        self.audit(
            AuditEventType::CredentialIssued,
            json!({
                "keyId": key_id,
                "clientId": request.client_id,
                "permissions": permissions,
                "behavioralScore": risk.score,
            }),
        )
        .await;

        Ok(GenerateCredentialResponse {
            api_key,
            key_id,
            public_key: kem_public_key.to_hex(),
            algorithm: KEM_ALGORITHM,
            verification_key: hex::encode(verification_key.as_bytes()),
            signing_key: signing_key.to_hex(),
            signature_algorithm: SIGNATURE_ALGORITHM,
            expires_at: credential.expires_at,
            permissions: permissions.into_iter().collect(),
        })
    }
}
