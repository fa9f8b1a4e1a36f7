//! # pqauth-risk
//!
//! Behavioral risk scoring for credential requests.
//!
//! A score in `[0, 1]` (higher is more trustworthy) is computed from device fingerprint
//! consistency, travel velocity between successful authentications, the network type, the
//! time of day relative to the credential's history and client/device deny lists. Scoring is
//! deterministic for a given context and baseline; baselines only move through
//! [`BehavioralScorer::record_success`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod scorer;
pub mod types;

pub use scorer::{penalties, BehavioralScorer};
pub use types::*;
