//! Policy evaluator logic.

use crate::types::*;

/// Pure first-match evaluator
pub struct PolicyEvaluator;

impl PolicyEvaluator {
    /// Evaluate `policy` against `attributes`.
    ///
    /// Rules run in ascending priority, ties broken by rule id; the first rule whose conditions
    /// all hold decides. No match is a DENY with no rule id. The result depends only on the
    /// inputs.
    pub fn evaluate(policy: &PolicySet, attributes: &Attributes) -> PolicyDecision {
        let mut ordered: Vec<&PolicyRule> = policy.rules.iter().collect();
        ordered.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));

        let mut audit_tags = vec![format!("policy:{}", policy.id)];

        for rule in ordered {
            if Self::rule_matches(rule, attributes) {
                audit_tags.push(format!("rule:{}", rule.id));
                let reason = match rule.effect {
                    Effect::Permit => format!("Permitted by rule {}", rule.id),
                    Effect::Deny => format!("Denied by rule {}", rule.id),
                };
                return PolicyDecision {
                    effect: rule.effect,
                    matched_rule_id: Some(rule.id.clone()),
                    audit_tags,
                    reason,
                };
            }
        }

        audit_tags.push("default_deny".to_string());
        PolicyDecision {
            effect: Effect::Deny,
            matched_rule_id: None,
            audit_tags,
            reason: "No rule matched".to_string(),
        }
    }

    fn rule_matches(rule: &PolicyRule, attributes: &Attributes) -> bool {
        rule.conditions
            .iter()
            .all(|(name, predicate)| Self::predicate_matches(predicate, attributes.get(name)))
    }

    /// Whether `predicate` holds for an attribute value (`None` when absent).
    pub fn predicate_matches(predicate: &Predicate, value: Option<&AttributeValue>) -> bool {
        match predicate {
            Predicate::Equals(expected) => value == Some(expected),
            Predicate::NotEquals(expected) => value != Some(expected),
            Predicate::Range { min, max } => match value.and_then(AttributeValue::as_number) {
                Some(n) if !n.is_nan() => {
                    min.map_or(true, |lo| n >= lo) && max.map_or(true, |hi| n <= hi)
                }
                _ => false,
            },
            Predicate::Below(limit) => value
                .and_then(AttributeValue::as_number)
                .is_some_and(|n| n < *limit),
            Predicate::OneOf(options) => value.is_some_and(|v| options.contains(v)),
            Predicate::NoneOf(options) => value.map_or(true, |v| !options.contains(v)),
            Predicate::Present => value.is_some(),
            Predicate::Absent => value.is_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn policy(rules: Vec<PolicyRule>) -> PolicySet {
        PolicySet {
            id: uuid::Uuid::new_v4(),
            key_id: "key-1".to_string(),
            permissions: BTreeSet::from(["READ_METRICS".to_string()]),
            rules,
        }
    }

    fn attributes(pairs: &[(&str, AttributeValue)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_no_rules_is_default_deny() {
        let decision = PolicyEvaluator::evaluate(&policy(vec![]), &Attributes::new());
        assert_eq!(decision.effect, Effect::Deny);
        assert!(decision.matched_rule_id.is_none());
        assert!(decision.audit_tags.contains(&"default_deny".to_string()));
    }

    #[test]
    fn test_first_match_by_priority() {
        let set = policy(vec![
            PolicyRule::new("permit-all", 100, Effect::Permit),
            PolicyRule::new("deny-fail", 10, Effect::Deny)
                .when(attrs::DEVICE_INTEGRITY, Predicate::Equals("FAIL".into())),
        ]);

        let denied = PolicyEvaluator::evaluate(
            &set,
            &attributes(&[(attrs::DEVICE_INTEGRITY, "FAIL".into())]),
        );
        assert_eq!(denied.effect, Effect::Deny);
        assert_eq!(denied.matched_rule_id.as_deref(), Some("deny-fail"));

        let permitted = PolicyEvaluator::evaluate(
            &set,
            &attributes(&[(attrs::DEVICE_INTEGRITY, "PASS".into())]),
        );
        assert!(permitted.is_permit());
        assert_eq!(permitted.matched_rule_id.as_deref(), Some("permit-all"));
    }

    #[test]
    fn test_priority_ties_broken_by_id() {
        let set = policy(vec![
            PolicyRule::new("b-permit", 5, Effect::Permit),
            PolicyRule::new("a-deny", 5, Effect::Deny),
        ]);
        let decision = PolicyEvaluator::evaluate(&set, &Attributes::new());
        assert_eq!(decision.matched_rule_id.as_deref(), Some("a-deny"));
    }

    #[test]
    fn test_all_conditions_must_hold() {
        let set = policy(vec![PolicyRule::new("permit", 1, Effect::Permit)
            .when(attrs::DEVICE_INTEGRITY, Predicate::Equals("PASS".into()))
            .when(
                attrs::BEHAVIORAL_SCORE,
                Predicate::Range {
                    min: Some(0.2),
                    max: None,
                },
            )]);

        let ok = attributes(&[
            (attrs::DEVICE_INTEGRITY, "PASS".into()),
            (attrs::BEHAVIORAL_SCORE, 0.2.into()),
        ]);
        assert!(PolicyEvaluator::evaluate(&set, &ok).is_permit());

        let low = attributes(&[
            (attrs::DEVICE_INTEGRITY, "PASS".into()),
            (attrs::BEHAVIORAL_SCORE, 0.19.into()),
        ]);
        assert!(!PolicyEvaluator::evaluate(&set, &low).is_permit());
    }

    #[test]
    fn test_predicates() {
        let us: AttributeValue = "US".into();
        let fr: AttributeValue = "FR".into();
        let list = Predicate::OneOf(vec![us.clone(), "CA".into()]);
        assert!(PolicyEvaluator::predicate_matches(&list, Some(&us)));
        assert!(!PolicyEvaluator::predicate_matches(&list, Some(&fr)));
        assert!(!PolicyEvaluator::predicate_matches(&list, None));

        let none_of = Predicate::NoneOf(vec![us.clone()]);
        assert!(PolicyEvaluator::predicate_matches(&none_of, Some(&fr)));
        assert!(PolicyEvaluator::predicate_matches(&none_of, None));
        assert!(!PolicyEvaluator::predicate_matches(&none_of, Some(&us)));

        let not_equals = Predicate::NotEquals(us.clone());
        assert!(PolicyEvaluator::predicate_matches(&not_equals, None));
        assert!(!PolicyEvaluator::predicate_matches(&not_equals, Some(&us)));

        let range = Predicate::Range {
            min: Some(9.0),
            max: Some(17.0),
        };
        assert!(PolicyEvaluator::predicate_matches(&range, Some(&9.0.into())));
        assert!(PolicyEvaluator::predicate_matches(&range, Some(&17.0.into())));
        assert!(!PolicyEvaluator::predicate_matches(&range, Some(&17.5.into())));
        assert!(!PolicyEvaluator::predicate_matches(&range, Some(&"12".into())));
        assert!(!PolicyEvaluator::predicate_matches(&range, Some(&f64::NAN.into())));

        let below = Predicate::Below(0.2);
        assert!(PolicyEvaluator::predicate_matches(&below, Some(&0.19.into())));
        assert!(!PolicyEvaluator::predicate_matches(&below, Some(&0.2.into())));
        assert!(!PolicyEvaluator::predicate_matches(&below, None));

        assert!(PolicyEvaluator::predicate_matches(&Predicate::Present, Some(&us)));
        assert!(PolicyEvaluator::predicate_matches(&Predicate::Absent, None));
        assert!(!PolicyEvaluator::predicate_matches(&Predicate::Absent, Some(&us)));
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let set = policy(vec![
            PolicyRule::new("permit", 2, Effect::Permit).when(attrs::LOCATION, Predicate::Present),
            PolicyRule::new("deny", 1, Effect::Deny)
                .when(attrs::NETWORK_TYPE, Predicate::Equals("tor".into())),
        ]);
        let input = attributes(&[(attrs::LOCATION, "US".into())]);
        let first = PolicyEvaluator::evaluate(&set, &input);
        for _ in 0..10 {
            assert_eq!(PolicyEvaluator::evaluate(&set, &input), first);
        }
    }
}
