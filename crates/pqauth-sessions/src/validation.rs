//! Field-level request validation.

use crate::{errors::*, types::*};
use pqauth_crypto::{Signature, SIGNATURE_SIZE};
use std::collections::BTreeSet;

const MAX_PERMISSIONS: usize = 32;
const MAX_PERMISSION_LEN: usize = 64;
const MAX_FINGERPRINT_LEN: usize = 128;
const BEARER_HEX_LEN: usize = 64;

pub(crate) fn client_id(value: &str) -> Result<()> {
    if !(8..=64).contains(&value.len()) {
        return Err(AuthError::validation("clientId", "must be 8-64 characters"));
    }
    if !value
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    {
        return Err(AuthError::validation(
            "clientId",
            "may only contain letters, digits, '_' and '-'",
        ));
    }
    Ok(())
}

/// Validate and deduplicate permissions.
pub(crate) fn permissions(values: &[String]) -> Result<BTreeSet<String>> {
    if values.is_empty() {
        return Err(AuthError::validation(
            "permissions",
            "must contain at least one permission",
        ));
    }
    if values.len() > MAX_PERMISSIONS {
        return Err(AuthError::validation(
            "permissions",
            format!("at most {MAX_PERMISSIONS} permissions"),
        ));
    }
    for value in values {
        let well_formed = !value.is_empty()
            && value.len() <= MAX_PERMISSION_LEN
            && value
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b':' | b'.' | b'-'));
        if !well_formed {
            return Err(AuthError::validation(
                "permissions",
                format!("malformed permission {value:?}"),
            ));
        }
    }
    Ok(values.iter().cloned().collect())
}

fn bearer_hex(field: &str, value: &str) -> Result<()> {
    if value.len() != BEARER_HEX_LEN || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(AuthError::validation(
            field,
            format!("must be {BEARER_HEX_LEN} hex characters"),
        ));
    }
    Ok(())
}

pub(crate) fn api_key(value: &str) -> Result<()> {
    bearer_hex("apiKey", value)
}

pub(crate) fn session_token(value: &str) -> Result<()> {
    bearer_hex("sessionToken", value)
}

pub(crate) fn key_id(value: &str) -> Result<()> {
    if value.len() != 32 || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(AuthError::validation("keyId", "must be 32 hex characters"));
    }
    Ok(())
}

pub(crate) fn device_fingerprint(value: &str) -> Result<()> {
    if value.is_empty() || value.len() > MAX_FINGERPRINT_LEN {
        return Err(AuthError::validation(
            "deviceFingerprint",
            format!("must be 1-{MAX_FINGERPRINT_LEN} characters"),
        ));
    }
    if !value.bytes().all(|b| b.is_ascii_graphic() || b == b' ') {
        return Err(AuthError::validation(
            "deviceFingerprint",
            "must be printable ASCII",
        ));
    }
    Ok(())
}

/// Decode a hex signature of exactly the ML-DSA-65 length.
pub(crate) fn signature(value: &str) -> Result<Signature> {
    if value.len() != 2 * SIGNATURE_SIZE {
        return Err(AuthError::validation(
            "signature",
            format!("must be {} hex characters", 2 * SIGNATURE_SIZE),
        ));
    }
    Signature::from_hex(value).map_err(|_| AuthError::validation("signature", "must be hex"))
}

pub(crate) fn generate_request(request: &GenerateCredentialRequest) -> Result<BTreeSet<String>> {
    client_id(&request.client_id)?;
    if let Some(fingerprint) = &request.device_fingerprint {
        device_fingerprint(fingerprint)?;
    }
    permissions(&request.permissions)
}

pub(crate) fn authenticate_request(request: &AuthenticateRequest) -> Result<Signature> {
    api_key(&request.api_key)?;
    device_fingerprint(&request.device_fingerprint)?;
    signature(&request.signature)
}
