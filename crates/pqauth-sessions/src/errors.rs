use pqauth_crypto::CryptoError;
use pqauth_policy::PolicyError;
use pqauth_storage::StorageError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("Request timestamp outside the replay window: skew={skew_ms}ms")]
    Replay { skew_ms: u64 },

    #[error("Behavioral score {score:.3} below threshold {threshold:.3}")]
    BehavioralRejection { score: f64, threshold: f64 },

    #[error("Denied by policy rule {rule_id:?}")]
    PolicyDenied { rule_id: Option<String> },

    #[error("Signature verification failed")]
    SignatureInvalid,

    #[error("Credential unavailable")]
    CredentialUnavailable,

    #[error("Session invalid")]
    SessionInvalid,

    #[error("Access to secret key material denied: {0}")]
    AccessDenied(String),

    #[error("Share quorum not met: {0}")]
    ShareQuorum(String),

    #[error("Signing exhausted after {attempts} attempts")]
    SigningExhausted { attempts: u32 },

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub(crate) fn validation(field: &str, reason: impl Into<String>) -> Self {
        AuthError::Validation {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Map to the response a caller is allowed to see.
    ///
    /// Replay, policy, signature and credential failures collapse to one indistinguishable
    /// response; internal failures never carry their cause.
    pub fn to_public(&self) -> PublicError {
        match self {
            AuthError::Validation { field, .. } => PublicError {
                code: PublicErrorCode::InvalidRequest,
                status: 400,
                message: "Invalid request parameters".to_string(),
                field: Some(field.clone()),
            },
            AuthError::Replay { .. }
            | AuthError::PolicyDenied { .. }
            | AuthError::SignatureInvalid
            | AuthError::CredentialUnavailable
            | AuthError::SessionInvalid => PublicError {
                code: PublicErrorCode::AuthenticationFailed,
                status: 401,
                message: "Authentication failed".to_string(),
                field: None,
            },
            AuthError::BehavioralRejection { .. } | AuthError::AccessDenied(_) => PublicError {
                code: PublicErrorCode::RequestRejected,
                status: 403,
                message: "Request rejected".to_string(),
                field: None,
            },
            AuthError::ShareQuorum(_)
            | AuthError::SigningExhausted { .. }
            | AuthError::StorageError(_)
            | AuthError::SerializationError(_)
            | AuthError::Internal(_) => PublicError {
                code: PublicErrorCode::InternalError,
                status: 500,
                message: "Internal error".to_string(),
                field: None,
            },
        }
    }
}

impl From<CryptoError> for AuthError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::ShareQuorum(reason) => AuthError::ShareQuorum(reason),
            CryptoError::SigningExhausted { attempts } => AuthError::SigningExhausted { attempts },
            CryptoError::AccessDenied { purpose } => AuthError::AccessDenied(purpose),
            other => AuthError::Internal(other.to_string()),
        }
    }
}

impl From<PolicyError> for AuthError {
    fn from(err: PolicyError) -> Self {
        match err {
            PolicyError::InvalidAttribute { name, reason } => AuthError::Validation {
                field: format!("attributes.{name}"),
                reason,
            },
            PolicyError::NoPermissions => {
                AuthError::validation("permissions", "must contain at least one permission")
            }
            other => AuthError::Internal(other.to_string()),
        }
    }
}

/// Opaque error category exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PublicErrorCode {
    InvalidRequest,
    AuthenticationFailed,
    RequestRejected,
    InternalError,
}

/// Zero-knowledge error response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicError {
    pub code: PublicErrorCode,
    pub status: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

pub type Result<T> = std::result::Result<T, AuthError>;
