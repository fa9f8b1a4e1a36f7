use pqauth_crypto::WrappedSecret;
use pqauth_policy::Attributes;
use pqauth_risk::GeoPoint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;
use zeroize::Zeroizing;

/// Credential lifecycle state
///
/// `Expired` is never persisted; it is derived at lookup time from `expires_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CredentialState {
    Issued,
    Active,
    Expired,
    Revoked,
}

/// Credential record stored under its key id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub key_id: String,
    pub client_id: String,
    /// Lookup digest of the API key; the key itself is never stored
    pub api_key_hash: String,
    pub permissions: BTreeSet<String>,
    pub policy_id: Uuid,
    pub attributes: Attributes,
    pub created_at: u64,
    pub expires_at: u64,
    pub max_calls: u64,
    pub call_count: u64,
    pub state: CredentialState,
    pub revoked_at: Option<u64>,
    /// ML-DSA-65 verification key
    pub verification_key: Vec<u8>,
    /// ML-KEM-768 encapsulation key
    pub kem_public_key: Vec<u8>,
    /// ML-KEM-768 decapsulation key under the custody wrapping key
    pub wrapped_kem_secret: WrappedSecret,
    pub custody_threshold: u8,
    pub custody_shares: u8,
}

impl Credential {
    /// State as observed at `now`.
    pub fn effective_state(&self, now: u64) -> CredentialState {
        match self.state {
            CredentialState::Revoked => CredentialState::Revoked,
            _ if now >= self.expires_at => CredentialState::Expired,
            state => state,
        }
    }

    /// Whether another authentication may be counted against this credential at `now`.
    pub fn is_usable(&self, now: u64) -> bool {
        matches!(
            self.effective_state(now),
            CredentialState::Issued | CredentialState::Active
        ) && self.call_count < self.max_calls
    }
}

/// Session lifecycle state; `Expired` is derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Active,
    Expired,
    Revoked,
}

/// Session record stored under the lookup digest of its token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token_digest: String,
    /// Empty for revocation tombstones of tokens never issued
    pub key_id: String,
    pub issued_at: u64,
    pub expires_at: u64,
    pub permissions: BTreeSet<String>,
    pub risk_score_at_issue: f64,
    pub state: SessionState,
    pub revoked_at: Option<u64>,
}

impl Session {
    /// Revoked placeholder occupying a token digest that was never issued.
    ///
    /// It is kept for `ttl_ms`, as long as a session issued at `now` would live.
    pub fn tombstone(token_digest: String, now: u64, ttl_ms: u64) -> Self {
        Self {
            token_digest,
            key_id: String::new(),
            issued_at: now,
            expires_at: now.saturating_add(ttl_ms),
            permissions: BTreeSet::new(),
            risk_score_at_issue: 0.0,
            state: SessionState::Revoked,
            revoked_at: Some(now),
        }
    }

    /// State as observed at `now`.
    pub fn effective_state(&self, now: u64) -> SessionState {
        match self.state {
            SessionState::Revoked => SessionState::Revoked,
            _ if now >= self.expires_at => SessionState::Expired,
            state => state,
        }
    }
}

/// Request-time signals supplied alongside generate/authenticate calls
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthContext {
    pub location: Option<String>,
    pub device_integrity: Option<String>,
    pub network_type: Option<String>,
    pub coordinates: Option<GeoPoint>,
}

/// generate-key input
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateCredentialRequest {
    pub client_id: String,
    pub permissions: Vec<String>,
    #[serde(default)]
    pub attributes: Attributes,
    /// Fingerprint of the provisioning device; the client id stands in when absent
    pub device_fingerprint: Option<String>,
    #[serde(default)]
    pub context: AuthContext,
}

/// generate-key output
///
/// `api_key` and `signing_key` are delivered exactly once and wiped when this value drops.
pub struct GenerateCredentialResponse {
    pub api_key: Zeroizing<String>,
    pub key_id: String,
    /// ML-KEM-768 encapsulation key, hex
    pub public_key: String,
    pub algorithm: &'static str,
    /// ML-DSA-65 verification key, hex
    pub verification_key: String,
    /// ML-DSA-65 signing key, hex
    pub signing_key: Zeroizing<String>,
    pub signature_algorithm: &'static str,
    pub expires_at: u64,
    pub permissions: Vec<String>,
}

impl std::fmt::Debug for GenerateCredentialResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerateCredentialResponse")
            .field("api_key", &"[REDACTED]")
            .field("key_id", &self.key_id)
            .field("algorithm", &self.algorithm)
            .field("signing_key", &"[REDACTED]")
            .field("signature_algorithm", &self.signature_algorithm)
            .field("expires_at", &self.expires_at)
            .field("permissions", &self.permissions)
            .finish()
    }
}

/// authenticate input
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticateRequest {
    pub api_key: String,
    /// Client clock, epoch milliseconds
    pub timestamp: u64,
    /// ML-DSA-65 signature over `"{api_key}:{timestamp}"`, hex
    pub signature: String,
    pub device_fingerprint: String,
    #[serde(default)]
    pub context: AuthContext,
}

/// Status reported once every gate has passed
pub const PQC_STATUS_VERIFIED: &str = "VERIFIED";
pub const ABAC_STATUS_PERMIT: &str = "PERMIT";

/// authenticate output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticateResponse {
    pub session_token: String,
    pub expires_at: u64,
    pub permissions: Vec<String>,
    pub pqc_status: String,
    pub abac_status: String,
    pub behavioral_score: f64,
}

/// Entry written to the audit sink when a session is revoked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationLogEntry {
    pub event: String,
    /// First 8 characters of the token followed by `...`
    pub session_token: String,
    pub timestamp: u64,
    pub reason: String,
}

/// Integrity artifact handed back to the revoking caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationArtifact {
    /// First share of the sealing key, hex
    pub share: String,
    /// Keyed BLAKE3 tag over the log entry, hex
    pub tag: String,
}

/// Custody copy of one sealing-key share, stored under the tag it completes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealShare {
    pub sealed_at: u64,
    /// [`pqauth_crypto::SecretShare::to_bytes`] encoding
    pub share: Vec<u8>,
}

/// revoke output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokeResponse {
    pub message: String,
    pub artifact: RevocationArtifact,
}

/// Records removed by one pruning pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PruneReport {
    /// Expired sessions and revocation tombstones
    pub sessions: usize,
    pub index_entries: usize,
    /// Revocation custody shares past retention
    pub seal_shares: usize,
    /// Behavioral baselines of credentials that can no longer authenticate
    pub baselines: usize,
}

/// Public view of a credential
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialInfo {
    pub key_id: String,
    pub client_id: String,
    pub permissions: Vec<String>,
    pub state: CredentialState,
    pub created_at: u64,
    pub expires_at: u64,
    pub max_calls: u64,
    pub call_count: u64,
    pub public_key: String,
    pub verification_key: String,
}

impl CredentialInfo {
    pub(crate) fn from_credential(credential: &Credential, now: u64) -> Self {
        Self {
            key_id: credential.key_id.clone(),
            client_id: credential.client_id.clone(),
            permissions: credential.permissions.iter().cloned().collect(),
            state: credential.effective_state(now),
            created_at: credential.created_at,
            expires_at: credential.expires_at,
            max_calls: credential.max_calls,
            call_count: credential.call_count,
            public_key: hex::encode(&credential.kem_public_key),
            verification_key: hex::encode(&credential.verification_key),
        }
    }
}

/// Audit event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType {
    CredentialIssued,
    Authenticated,
    AuthenticationRejected,
    SessionRevoked,
    CredentialRevoked,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::CredentialIssued => "CREDENTIAL_ISSUED",
            AuditEventType::Authenticated => "AUTHENTICATED",
            AuditEventType::AuthenticationRejected => "AUTHENTICATION_REJECTED",
            AuditEventType::SessionRevoked => "SESSION_REVOKED",
            AuditEventType::CredentialRevoked => "CREDENTIAL_REVOKED",
        }
    }
}

/// Event handed to an [`crate::AuditSink`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_type: AuditEventType,
    pub timestamp: u64,
    pub payload: serde_json::Value,
}
