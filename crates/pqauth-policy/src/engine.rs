//! Policy Engine trait and implementation.

use crate::{
    errors::{PolicyError, Result},
    evaluator::PolicyEvaluator,
    types::*,
};
use std::collections::{BTreeSet, HashSet};
use uuid::Uuid;

/// Network types treated as anonymizing
pub const ANONYMIZING_NETWORKS: [&str; 3] = ["tor", "proxy", "anonymizer"];

/// Minimum behavioral score the baseline rules accept
pub const MIN_BEHAVIORAL_SCORE: f64 = 0.2;

/// Builds per-credential policies and evaluates them
pub trait PolicyEngine: Send + Sync {
    /// Create the policy for a new credential from its permissions and attributes.
    fn create_policy(
        &self,
        key_id: &str,
        permissions: &BTreeSet<String>,
        attributes: &Attributes,
    ) -> Result<PolicySet>;

    /// Evaluate `policy` for one request.
    fn evaluate(&self, policy: &PolicySet, attributes: &Attributes) -> PolicyDecision;
}

/// Default engine: baseline rules plus restrictions taken from credential attributes
#[derive(Debug, Clone)]
pub struct PolicyEngineImpl {
    baseline: Vec<PolicyRule>,
}

impl PolicyEngineImpl {
    /// Engine with the standard baseline rules
    pub fn new() -> Self {
        Self {
            baseline: Self::baseline_rules(MIN_BEHAVIORAL_SCORE),
        }
    }

    /// Engine with caller-supplied baseline rules
    pub fn with_baseline(baseline: Vec<PolicyRule>) -> Self {
        Self { baseline }
    }

    /// Standard rules: refuse failed attestation, anonymizing networks and low scores; permit
    /// passing or absent attestation with an acceptable score.
    pub fn baseline_rules(min_score: f64) -> Vec<PolicyRule> {
        let acceptable_score = Predicate::Range {
            min: Some(min_score),
            max: None,
        };
        vec![
            PolicyRule::new("deny-device-integrity-fail", 10, Effect::Deny)
                .when(attrs::DEVICE_INTEGRITY, Predicate::Equals("FAIL".into())),
            PolicyRule::new("deny-anonymizing-network", 20, Effect::Deny).when(
                attrs::NETWORK_TYPE,
                Predicate::OneOf(ANONYMIZING_NETWORKS.iter().map(|&n| n.into()).collect()),
            ),
            PolicyRule::new("deny-low-behavioral-score", 30, Effect::Deny)
                .when(attrs::BEHAVIORAL_SCORE, Predicate::Below(min_score)),
            PolicyRule::new("permit-device-integrity-pass", 100, Effect::Permit)
                .when(attrs::DEVICE_INTEGRITY, Predicate::Equals("PASS".into()))
                .when(attrs::BEHAVIORAL_SCORE, acceptable_score.clone()),
            PolicyRule::new("permit-unattested-device", 110, Effect::Permit)
                .when(attrs::DEVICE_INTEGRITY, Predicate::Absent)
                .when(attrs::BEHAVIORAL_SCORE, acceptable_score),
        ]
    }

    /// Deny rules derived from `allowedLocations`, `allowedNetworkTypes` and `allowedHours`.
    fn restriction_rules(attributes: &Attributes) -> Result<Vec<PolicyRule>> {
        let mut rules = Vec::new();

        if let Some(value) = attributes.get(attrs::ALLOWED_LOCATIONS) {
            let allowed = string_list(attrs::ALLOWED_LOCATIONS, value)?;
            rules.push(
                PolicyRule::new("deny-location-not-allowed", 40, Effect::Deny)
                    .when(attrs::LOCATION, Predicate::NoneOf(allowed)),
            );
        }

        if let Some(value) = attributes.get(attrs::ALLOWED_NETWORK_TYPES) {
            let allowed = string_list(attrs::ALLOWED_NETWORK_TYPES, value)?;
            rules.push(
                PolicyRule::new("deny-network-not-allowed", 41, Effect::Deny)
                    .when(attrs::NETWORK_TYPE, Predicate::NoneOf(allowed)),
            );
        }

        if let Some(value) = attributes.get(attrs::ALLOWED_HOURS) {
            let (start, end) = parse_hours(value)?;
            rules.push(
                PolicyRule::new("deny-time-of-day-missing", 42, Effect::Deny)
                    .when(attrs::TIME_OF_DAY, Predicate::Absent),
            );
            let outside = |id: &str, min: u8, max: u8| {
                PolicyRule::new(id, 43, Effect::Deny).when(
                    attrs::TIME_OF_DAY,
                    Predicate::Range {
                        min: Some(min as f64),
                        max: Some(max as f64),
                    },
                )
            };
            if start <= end {
                if start > 0 {
                    rules.push(outside("deny-before-allowed-hours", 0, start - 1));
                }
                if end < 23 {
                    rules.push(outside("deny-after-allowed-hours", end + 1, 23));
                }
            } else if end + 1 < start {
                // window wraps past midnight
                rules.push(outside("deny-outside-allowed-hours", end + 1, start - 1));
            }
        }

        Ok(rules)
    }
}

impl Default for PolicyEngineImpl {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyEngine for PolicyEngineImpl {
    fn create_policy(
        &self,
        key_id: &str,
        permissions: &BTreeSet<String>,
        attributes: &Attributes,
    ) -> Result<PolicySet> {
        if permissions.is_empty() {
            return Err(PolicyError::NoPermissions);
        }

        let mut rules = self.baseline.clone();
        rules.extend(Self::restriction_rules(attributes)?);

        let mut seen = HashSet::new();
        for rule in &rules {
            if !seen.insert(rule.id.as_str()) {
                return Err(PolicyError::DuplicateRule(rule.id.clone()));
            }
        }
        rules.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));

        let policy = PolicySet {
            id: Uuid::new_v4(),
            key_id: key_id.to_string(),
            permissions: permissions.clone(),
            rules,
        };

        tracing::debug!(
            key_id = %key_id,
            policy_id = %policy.id,
            rules = policy.rules.len(),
            "Created credential policy"
        );

        Ok(policy)
    }

    fn evaluate(&self, policy: &PolicySet, attributes: &Attributes) -> PolicyDecision {
        let decision = PolicyEvaluator::evaluate(policy, attributes);

        tracing::debug!(
            key_id = %policy.key_id,
            decision = ?decision.effect,
            rule_id = decision.matched_rule_id.as_deref().unwrap_or("default"),
            "Policy evaluated"
        );

        decision
    }
}

fn string_list(name: &str, value: &AttributeValue) -> Result<Vec<AttributeValue>> {
    let invalid = |reason: &str| PolicyError::InvalidAttribute {
        name: name.to_string(),
        reason: reason.to_string(),
    };
    match value {
        AttributeValue::List(items) if !items.is_empty() => {
            Ok(items.iter().map(|s| AttributeValue::String(s.clone())).collect())
        }
        AttributeValue::List(_) => Err(invalid("list must not be empty")),
        AttributeValue::String(s) if !s.is_empty() => Ok(vec![AttributeValue::String(s.clone())]),
        _ => Err(invalid("expected a non-empty string list")),
    }
}

/// Parse `"start-end"` (hours 0..=23, inclusive).
fn parse_hours(value: &AttributeValue) -> Result<(u8, u8)> {
    let invalid = |reason: String| PolicyError::InvalidAttribute {
        name: attrs::ALLOWED_HOURS.to_string(),
        reason,
    };
    let text = value
        .as_str()
        .ok_or_else(|| invalid("expected \"start-end\"".to_string()))?;
    let (start, end) = text
        .split_once('-')
        .ok_or_else(|| invalid(format!("expected \"start-end\", got {text:?}")))?;
    let hour = |s: &str| -> Result<u8> {
        s.trim()
            .parse::<u8>()
            .ok()
            .filter(|h| *h <= 23)
            .ok_or_else(|| invalid(format!("hour out of range: {s:?}")))
    };
    Ok((hour(start)?, hour(end)?))
}
