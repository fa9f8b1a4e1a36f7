//! # pqauth-policy
//!
//! Attribute-based access control for credential authentication: prioritized first-match
//! rules with a default DENY.

#![warn(clippy::all)]

pub mod engine;
pub mod errors;
pub mod evaluator;
pub mod types;

pub use engine::{PolicyEngine, PolicyEngineImpl, ANONYMIZING_NETWORKS, MIN_BEHAVIORAL_SCORE};
pub use errors::{PolicyError, Result};
pub use evaluator::PolicyEvaluator;
pub use types::*;
