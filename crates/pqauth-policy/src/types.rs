//! Policy engine type definitions.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Attribute names supplied by the orchestrator at authentication time.
pub mod attrs {
    /// Device fingerprint presented with the request
    pub const DEVICE_FINGERPRINT: &str = "deviceFingerprint";
    /// Client timestamp (epoch milliseconds)
    pub const TIMESTAMP: &str = "timestamp";
    /// Behavioral risk score in `[0, 1]`
    pub const BEHAVIORAL_SCORE: &str = "behavioralScore";
    /// Caller location (country or region code)
    pub const LOCATION: &str = "location";
    /// Device attestation result (`PASS` / `FAIL`)
    pub const DEVICE_INTEGRITY: &str = "deviceIntegrity";
    /// Network classification (`wifi`, `cellular`, `vpn`, `tor`, ...)
    pub const NETWORK_TYPE: &str = "networkType";
    /// Hour of day, 0..=23
    pub const TIME_OF_DAY: &str = "timeOfDay";

    /// Credential attribute restricting `location`
    pub const ALLOWED_LOCATIONS: &str = "allowedLocations";
    /// Credential attribute restricting `networkType`
    pub const ALLOWED_NETWORK_TYPES: &str = "allowedNetworkTypes";
    /// Credential attribute restricting `timeOfDay`, formatted `"start-end"`
    pub const ALLOWED_HOURS: &str = "allowedHours";
}

/// Attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// Text
    String(String),
    /// Numeric value
    Number(f64),
    /// Boolean flag
    Bool(bool),
    /// List of strings
    List(Vec<String>),
}

impl AttributeValue {
    /// Numeric view, if this is a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// String view, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Number(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<Vec<String>> for AttributeValue {
    fn from(value: Vec<String>) -> Self {
        AttributeValue::List(value)
    }
}

impl TryFrom<&serde_json::Value> for AttributeValue {
    type Error = String;

    fn try_from(value: &serde_json::Value) -> std::result::Result<Self, Self::Error> {
        match value {
            serde_json::Value::String(s) => Ok(AttributeValue::String(s.clone())),
            serde_json::Value::Bool(b) => Ok(AttributeValue::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_f64()
                .map(AttributeValue::Number)
                .ok_or_else(|| "number out of range".to_string()),
            serde_json::Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| "lists may only contain strings".to_string())
                })
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(AttributeValue::List),
            other => Err(format!("unsupported attribute value: {other}")),
        }
    }
}

/// Attribute set, keyed by attribute name
pub type Attributes = BTreeMap<String, AttributeValue>;

/// Condition on a single attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    /// Attribute present and equal to the value
    Equals(AttributeValue),
    /// Attribute absent or different from the value
    NotEquals(AttributeValue),
    /// Numeric attribute within the inclusive bounds; a missing bound is unbounded
    Range {
        /// Lower bound
        min: Option<f64>,
        /// Upper bound
        max: Option<f64>,
    },
    /// Numeric attribute strictly below the value
    Below(f64),
    /// Attribute present and equal to one of the values
    OneOf(Vec<AttributeValue>),
    /// Attribute absent or equal to none of the values
    NoneOf(Vec<AttributeValue>),
    /// Attribute present
    Present,
    /// Attribute absent
    Absent,
}

/// Rule outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// Allow the request
    Permit,
    /// Refuse the request
    Deny,
}

/// A prioritized rule; all conditions must hold for it to match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRule {
    /// Stable rule identifier, reported for audit
    pub id: String,
    /// Lower numbers are evaluated first
    pub priority: u32,
    /// Attribute name to predicate
    pub conditions: BTreeMap<String, Predicate>,
    /// Effect when the rule matches
    pub effect: Effect,
}

impl PolicyRule {
    /// Rule with no conditions yet
    pub fn new(id: impl Into<String>, priority: u32, effect: Effect) -> Self {
        Self {
            id: id.into(),
            priority,
            conditions: BTreeMap::new(),
            effect,
        }
    }

    /// Add a condition
    pub fn when(mut self, attribute: &str, predicate: Predicate) -> Self {
        self.conditions.insert(attribute.to_string(), predicate);
        self
    }
}

/// Rules governing one credential
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySet {
    /// Policy identifier referenced by the credential
    pub id: Uuid,
    /// Credential the policy belongs to
    pub key_id: String,
    /// Permissions granted on a PERMIT decision
    pub permissions: BTreeSet<String>,
    /// Rules in evaluation order
    pub rules: Vec<PolicyRule>,
}

/// Evaluation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDecision {
    /// Final effect
    pub effect: Effect,
    /// Rule that decided, `None` for the default deny
    pub matched_rule_id: Option<String>,
    /// Tags recorded for audit
    pub audit_tags: Vec<String>,
    /// Human-readable reason (never shown to callers)
    pub reason: String,
}

impl PolicyDecision {
    /// Whether the request is permitted
    pub fn is_permit(&self) -> bool {
        self.effect == Effect::Permit
    }
}
