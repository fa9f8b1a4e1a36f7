//! Service configuration.

use pqauth_crypto::{CUSTODY_THRESHOLD, CUSTODY_TOTAL_SHARES};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Upper bound on the session lifetime (one hour). Shorter lifetimes may be configured.
pub const MAX_SESSION_TTL_MS: u64 = 3_600_000;

/// Configuration errors
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{var} could not be parsed: {value:?}")]
    Unparseable { var: String, value: String },

    #[error("{var} out of range: {reason}")]
    OutOfRange { var: String, reason: String },
}

/// Credential & session manager configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Maximum allowed clock skew between a request timestamp and server time
    pub replay_window_ms: u64,

    /// Session lifetime, at most [`MAX_SESSION_TTL_MS`]
    pub session_ttl_ms: u64,

    /// Credential lifetime
    pub credential_ttl_ms: u64,

    /// Authentications allowed per credential
    pub max_calls: u64,

    /// Minimum behavioral score to mint a credential
    pub request_risk_threshold: f64,

    /// Minimum behavioral score to authenticate
    pub auth_risk_threshold: f64,

    /// Shares needed to recover a credential's wrapping key
    pub custody_threshold: u8,

    /// Custody shares written per credential
    pub custody_shares: u8,

    /// How long custody shares of revocation sealing keys are kept
    pub seal_retention_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            replay_window_ms: 300_000,
            session_ttl_ms: MAX_SESSION_TTL_MS,
            credential_ttl_ms: 30 * 24 * 3_600_000,
            max_calls: 10_000,
            request_risk_threshold: 0.3,
            auth_risk_threshold: 0.2,
            custody_threshold: CUSTODY_THRESHOLD,
            custody_shares: CUSTODY_TOTAL_SHARES,
            seal_retention_ms: 30 * 24 * 3_600_000,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from `PQAUTH_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`ServiceConfig::from_env`] with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            replay_window_ms: read(&lookup, "PQAUTH_REPLAY_WINDOW_MS", defaults.replay_window_ms)?,
            session_ttl_ms: read(&lookup, "PQAUTH_SESSION_TTL_MS", defaults.session_ttl_ms)?,
            credential_ttl_ms: read(
                &lookup,
                "PQAUTH_CREDENTIAL_TTL_MS",
                defaults.credential_ttl_ms,
            )?,
            max_calls: read(&lookup, "PQAUTH_MAX_CALLS", defaults.max_calls)?,
            request_risk_threshold: read(
                &lookup,
                "PQAUTH_REQUEST_RISK_THRESHOLD",
                defaults.request_risk_threshold,
            )?,
            auth_risk_threshold: read(
                &lookup,
                "PQAUTH_AUTH_RISK_THRESHOLD",
                defaults.auth_risk_threshold,
            )?,
            custody_threshold: read(&lookup, "PQAUTH_CUSTODY_THRESHOLD", defaults.custody_threshold)?,
            custody_shares: read(&lookup, "PQAUTH_CUSTODY_SHARES", defaults.custody_shares)?,
            seal_retention_ms: read(
                &lookup,
                "PQAUTH_SEAL_RETENTION_MS",
                defaults.seal_retention_ms,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let out_of_range = |var: &str, reason: &str| ConfigError::OutOfRange {
            var: var.to_string(),
            reason: reason.to_string(),
        };

        if self.replay_window_ms == 0 {
            return Err(out_of_range("PQAUTH_REPLAY_WINDOW_MS", "must be positive"));
        }
        if self.session_ttl_ms == 0 || self.session_ttl_ms > MAX_SESSION_TTL_MS {
            return Err(out_of_range(
                "PQAUTH_SESSION_TTL_MS",
                "must be within (0, 3600000]",
            ));
        }
        if self.credential_ttl_ms == 0 {
            return Err(out_of_range("PQAUTH_CREDENTIAL_TTL_MS", "must be positive"));
        }
        if self.seal_retention_ms == 0 {
            return Err(out_of_range("PQAUTH_SEAL_RETENTION_MS", "must be positive"));
        }
        if self.max_calls == 0 {
            return Err(out_of_range("PQAUTH_MAX_CALLS", "must be positive"));
        }
        for (var, value) in [
            ("PQAUTH_REQUEST_RISK_THRESHOLD", self.request_risk_threshold),
            ("PQAUTH_AUTH_RISK_THRESHOLD", self.auth_risk_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(out_of_range(var, "must be within [0, 1]"));
            }
        }
        if self.custody_threshold < 2 || self.custody_threshold > self.custody_shares {
            return Err(out_of_range(
                "PQAUTH_CUSTODY_THRESHOLD",
                "must satisfy 2 <= threshold <= shares",
            ));
        }
        Ok(())
    }
}

fn read<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Unparseable {
            var: var.to_string(),
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = ServiceConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.replay_window_ms, 300_000);
        assert_eq!(config.session_ttl_ms, 3_600_000);
        assert_eq!(config.custody_threshold, 3);
        assert_eq!(config.custody_shares, 5);
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = ServiceConfig::from_lookup(lookup_from(&[
            ("PQAUTH_SESSION_TTL_MS", "60000"),
            ("PQAUTH_AUTH_RISK_THRESHOLD", " 0.25 "),
            ("PQAUTH_CUSTODY_THRESHOLD", "2"),
            ("PQAUTH_CUSTODY_SHARES", "3"),
        ]))
        .unwrap();
        assert_eq!(config.session_ttl_ms, 60_000);
        assert_eq!(config.auth_risk_threshold, 0.25);
        assert_eq!(config.custody_threshold, 2);
        assert_eq!(config.custody_shares, 3);
    }

    #[test]
    fn test_session_ttl_capped_at_one_hour() {
        let config =
            ServiceConfig::from_lookup(lookup_from(&[("PQAUTH_SESSION_TTL_MS", "3600000")]))
                .unwrap();
        assert_eq!(config.session_ttl_ms, MAX_SESSION_TTL_MS);

        let err = ServiceConfig::from_lookup(lookup_from(&[("PQAUTH_SESSION_TTL_MS", "7200000")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { ref var, .. } if var == "PQAUTH_SESSION_TTL_MS"));

        let err = ServiceConfig::from_lookup(lookup_from(&[("PQAUTH_SESSION_TTL_MS", "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { .. }));
    }

    #[test]
    fn test_unparseable_value_rejected() {
        let err = ServiceConfig::from_lookup(lookup_from(&[("PQAUTH_MAX_CALLS", "lots")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Unparseable { .. }));
    }

    #[test]
    fn test_threshold_range_checked() {
        let err = ServiceConfig::from_lookup(lookup_from(&[("PQAUTH_REQUEST_RISK_THRESHOLD", "1.5")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { .. }));

        let err = ServiceConfig::from_lookup(lookup_from(&[
            ("PQAUTH_CUSTODY_THRESHOLD", "6"),
            ("PQAUTH_CUSTODY_SHARES", "5"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { .. }));
    }
}
