//! Policy engine error types.

use thiserror::Error;

/// Policy engine errors
#[derive(Debug, Error)]
pub enum PolicyError {
    /// A credential attribute could not be turned into a rule
    #[error("Invalid attribute {name}: {reason}")]
    InvalidAttribute {
        /// Attribute name
        name: String,
        /// What was wrong with it
        reason: String,
    },

    /// Policy sets must grant at least one permission
    #[error("Policy must grant at least one permission")]
    NoPermissions,

    /// Two rules in one set share an id
    #[error("Duplicate rule id: {0}")]
    DuplicateRule(String),
}

/// Result type for policy operations
pub type Result<T> = std::result::Result<T, PolicyError>;
