//! Column family definitions.

/// Credential records: key_id → Credential
pub const CF_CREDENTIALS: &str = "credentials";

/// API key index: sha256(api_key) digest → key_id
pub const CF_API_KEY_INDEX: &str = "api_key_index";

/// Sessions: sha256(session_token) digest → Session
pub const CF_SESSIONS: &str = "sessions";

/// Sessions by credential: (key_id, token_digest) → ()
pub const CF_SESSIONS_BY_KEY: &str = "sessions_by_key";

/// Policies: key_id → PolicySet
pub const CF_POLICIES: &str = "policies";

/// Custody shares of credential wrapping keys: (key_id, share_index) → share bytes
pub const CF_CUSTODY_SHARES: &str = "custody_shares";

/// Custody shares of revocation sealing keys: (tag, share_index) → SealShare
pub const CF_REVOCATION_SHARES: &str = "revocation_shares";

/// Get all column family names
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        CF_CREDENTIALS,
        CF_API_KEY_INDEX,
        CF_SESSIONS,
        CF_SESSIONS_BY_KEY,
        CF_POLICIES,
        CF_CUSTODY_SHARES,
        CF_REVOCATION_SHARES,
    ]
}
