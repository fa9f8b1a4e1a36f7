//! Credential & session manager service implementation.

mod authentication;
mod custody;
mod issuance;
mod lookup;
mod maintenance;
mod revocation;

use crate::{errors::*, traits::*, types::*, ServiceConfig};
use async_trait::async_trait;
use pqauth_crypto::{current_timestamp_ms, signature, SignaturePublicKey};
use pqauth_policy::{PolicyEngine, PolicyEngineImpl, PolicySet, MIN_BEHAVIORAL_SCORE};
use pqauth_risk::BehavioralScorer;
use pqauth_storage::{column_families::*, Storage};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

pub use custody::open_channel;
pub use maintenance::spawn_pruner;
pub use revocation::verify_revocation_seal;

/// Seed of the verification key checked against when an API key is unknown
const DECOY_SEED: [u8; 32] = [0x5a; 32];

/// Key id read in place of a real one when an API key is unknown; never a valid key id
pub(super) const DECOY_KEY_ID: &str = "";

/// Attempts at an optimistic read-modify-write before giving up
pub(super) const MAX_CAS_ATTEMPTS: usize = 16;

/// Stand-ins used when an API key matches no credential, so the request costs the same
pub(super) struct Decoy {
    pub(super) verification_key: SignaturePublicKey,
    pub(super) policy: PolicySet,
}

impl Decoy {
    fn new() -> Self {
        let (verification_key, _) = signature::generate_keypair_from_seed(&DECOY_SEED).into_parts();
        Self {
            verification_key,
            policy: PolicySet {
                id: Uuid::nil(),
                key_id: String::new(),
                permissions: BTreeSet::new(),
                rules: PolicyEngineImpl::baseline_rules(MIN_BEHAVIORAL_SCORE),
            },
        }
    }
}

/// Credential & session manager
pub struct CredentialService<S: Storage, P: PolicyEngine, A: AuditSink> {
    pub(super) storage: Arc<S>,
    pub(super) policy_engine: Arc<P>,
    pub(super) scorer: Arc<BehavioralScorer>,
    pub(super) audit_sink: Arc<A>,
    pub(super) config: ServiceConfig,
    pub(super) decoy: Decoy,
}

impl<S: Storage> CredentialService<S, PolicyEngineImpl, NoOpAuditSink> {
    /// Create a service with the default policy engine, scorer and no audit sink
    pub fn new(storage: Arc<S>, config: ServiceConfig) -> Self {
        Self::with_components(
            storage,
            Arc::new(PolicyEngineImpl::new()),
            Arc::new(BehavioralScorer::new()),
            Arc::new(NoOpAuditSink),
            config,
        )
    }
}

impl<S: Storage, P: PolicyEngine, A: AuditSink> CredentialService<S, P, A> {
    /// Create a service from explicit collaborators
    pub fn with_components(
        storage: Arc<S>,
        policy_engine: Arc<P>,
        scorer: Arc<BehavioralScorer>,
        audit_sink: Arc<A>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            storage,
            policy_engine,
            scorer,
            audit_sink,
            config,
            decoy: Decoy::new(),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub(super) async fn load_credential(&self, key_id: &str) -> Result<Option<Credential>> {
        Ok(self.storage.get(CF_CREDENTIALS, &key_id).await?)
    }

    pub(super) async fn load_policy(&self, key_id: &str) -> Result<Option<PolicySet>> {
        Ok(self.storage.get(CF_POLICIES, &key_id).await?)
    }

    /// Emit an audit event; sink failures are logged and never fail the operation.
    pub(super) async fn audit(&self, event_type: AuditEventType, payload: serde_json::Value) {
        let event = AuditEvent {
            event_type,
            timestamp: current_timestamp_ms(),
            payload,
        };
        if let Err(e) = self.audit_sink.record(event).await {
            warn!(
                event_type = event_type.as_str(),
                error = %e,
                "Audit sink rejected event"
            );
        }
    }
}

#[async_trait]
impl<S: Storage, P: PolicyEngine, A: AuditSink> CredentialManager for CredentialService<S, P, A> {
    async fn generate_credential(
        &self,
        request: GenerateCredentialRequest,
    ) -> Result<GenerateCredentialResponse> {
        self.generate_credential_internal(request).await
    }

    async fn authenticate(&self, request: AuthenticateRequest) -> Result<AuthenticateResponse> {
        self.authenticate_internal(request).await
    }

    async fn revoke(&self, session_token: &str) -> Result<RevokeResponse> {
        self.revoke_internal(session_token).await
    }

    async fn validate_session(&self, session_token: &str) -> Result<Session> {
        self.validate_session_internal(session_token).await
    }

    async fn get_credential(&self, key_id: &str) -> Result<CredentialInfo> {
        self.get_credential_internal(key_id).await
    }

    async fn revoke_credential(&self, key_id: &str) -> Result<()> {
        self.revoke_credential_internal(key_id).await
    }
}
