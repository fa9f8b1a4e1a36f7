//! # pqauth-sessions
//!
//! Credential & session manager. Mints lattice-backed API credentials, authenticates signed
//! requests through a replay window, a behavioral gate, an ABAC policy and ML-DSA
//! verification, and manages session issue, lazy expiry and linearizable revocation on top of
//! a [`pqauth_storage::Storage`] collaborator.

pub mod config;
pub mod errors;
mod service;
pub mod traits;
pub mod types;
mod validation;

#[cfg(test)]
mod tests;

pub use config::{ConfigError, ServiceConfig, MAX_SESSION_TTL_MS};
pub use errors::*;
pub use service::{open_channel, spawn_pruner, verify_revocation_seal, CredentialService};
pub use traits::*;
pub use types::*;
