use crate::{
    AuditEvent, AuthenticateRequest, AuthenticateResponse, CredentialInfo,
    GenerateCredentialRequest, GenerateCredentialResponse, Result, RevokeResponse, Session,
};
use async_trait::async_trait;

/// Credential issuance, authentication and session lifecycle
#[async_trait]
pub trait CredentialManager: Send + Sync {
    /// Mint a credential: key material, policy, custody shares and API key
    async fn generate_credential(
        &self,
        request: GenerateCredentialRequest,
    ) -> Result<GenerateCredentialResponse>;

    /// Authenticate a signed request and issue a session
    async fn authenticate(&self, request: AuthenticateRequest) -> Result<AuthenticateResponse>;

    /// Revoke a session token (idempotent)
    async fn revoke(&self, session_token: &str) -> Result<RevokeResponse>;

    /// Look up a live session
    async fn validate_session(&self, session_token: &str) -> Result<Session>;

    /// Public view of a credential
    async fn get_credential(&self, key_id: &str) -> Result<CredentialInfo>;

    /// Revoke a credential and every session issued under it
    async fn revoke_credential(&self, key_id: &str) -> Result<()>;
}

/// Logging sink for audit events
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Record one event
    async fn record(&self, event: AuditEvent) -> Result<()>;
}

/// Audit sink that discards events
pub struct NoOpAuditSink;

#[async_trait]
impl AuditSink for NoOpAuditSink {
    async fn record(&self, _event: AuditEvent) -> Result<()> {
        Ok(())
    }
}

/// Audit sink that emits events through `tracing`
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<()> {
        tracing::info!(
            target: "pqauth::audit",
            event_type = event.event_type.as_str(),
            timestamp = event.timestamp,
            payload = %event.payload,
            "Audit event"
        );
        Ok(())
    }
}
