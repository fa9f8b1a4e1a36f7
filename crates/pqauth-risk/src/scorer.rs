//! Deterministic behavioral scorer with per-credential baselines.

use crate::types::*;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{PoisonError, RwLock};

/// Penalty weights subtracted from a perfect score of 1.0
pub mod penalties {
    /// Empty or deny-listed device fingerprint
    pub const DEVICE_UNTRUSTED: f64 = 0.9;
    /// Fingerprint not seen before for this credential
    pub const DEVICE_FINGERPRINT_MISMATCH: f64 = 0.25;
    /// Travel faster than [`super::MAX_TRAVEL_SPEED_KMH`]
    pub const IMPLAUSIBLE_TRAVEL: f64 = 0.5;
    /// Tor, open proxies and similar
    pub const ANONYMIZING_NETWORK: f64 = 0.4;
    /// Commercial VPN
    pub const VPN_NETWORK: f64 = 0.1;
    /// Request far from the credential's usual hour
    pub const UNUSUAL_TIME_OF_DAY: f64 = 0.15;
    /// Deny-listed client identifier
    pub const FLAGGED_CLIENT: f64 = 0.8;
}

/// Travel speed above which consecutive authentications are implausible
pub const MAX_TRAVEL_SPEED_KMH: f64 = 900.0;

const MAX_FINGERPRINTS: usize = 16;
const MAX_HOUR_SAMPLES: usize = 32;
const MIN_HOUR_SAMPLES: usize = 5;
const MAX_HOUR_DISTANCE: f64 = 6.0;

const ANONYMIZING_NETWORKS: [&str; 3] = ["tor", "proxy", "anonymizer"];

/// History of successful authentications for one credential
#[derive(Debug, Clone, Default)]
struct Baseline {
    fingerprints: VecDeque<String>,
    hours: VecDeque<u8>,
    last_location: Option<(GeoPoint, u64)>,
}

impl Baseline {
    /// Circular mean of the recorded hours
    fn mean_hour(&self) -> f64 {
        let (sin, cos) = self.hours.iter().fold((0.0, 0.0), |(s, c), &h| {
            let angle = f64::from(h) / 24.0 * std::f64::consts::TAU;
            (s + angle.sin(), c + angle.cos())
        });
        let mean = sin.atan2(cos) / std::f64::consts::TAU * 24.0;
        mean.rem_euclid(24.0)
    }
}

/// Behavioral risk scorer
///
/// [`BehavioralScorer::score`] and [`BehavioralScorer::record_success`] take the baseline lock
/// separately. Authentications of one credential that race each other are all scored against
/// the baseline as it stood before any of them was recorded.
#[derive(Debug, Default)]
pub struct BehavioralScorer {
    baselines: RwLock<HashMap<String, Baseline>>,
    flagged_clients: HashSet<String>,
    flagged_devices: HashSet<String>,
}

impl BehavioralScorer {
    /// Scorer with the default deny lists
    pub fn new() -> Self {
        Self::with_deny_lists(["suspicious-client"], ["suspicious-device"])
    }

    /// Scorer with explicit client and device deny lists
    pub fn with_deny_lists<C, D>(clients: C, devices: D) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        Self {
            baselines: RwLock::new(HashMap::new()),
            flagged_clients: clients.into_iter().map(Into::into).collect(),
            flagged_devices: devices.into_iter().map(Into::into).collect(),
        }
    }

    /// Score one request against the stored baseline.
    pub fn score(&self, context: &RequestContext) -> RiskScore {
        let mut penalty = 0.0;
        let mut signals = Vec::new();
        let mut flag = |name: &str, weight: f64| {
            penalty += weight;
            signals.push(name.to_string());
        };

        let fingerprint = context.device_fingerprint.trim();
        if fingerprint.is_empty() || self.flagged_devices.contains(fingerprint) {
            flag("device_untrusted", penalties::DEVICE_UNTRUSTED);
        }

        if context
            .client_id
            .as_deref()
            .is_some_and(|id| self.flagged_clients.contains(id))
        {
            flag("flagged_client", penalties::FLAGGED_CLIENT);
        }

        match context.network_type.as_deref().map(str::to_ascii_lowercase) {
            Some(n) if ANONYMIZING_NETWORKS.contains(&n.as_str()) => {
                flag("anonymizing_network", penalties::ANONYMIZING_NETWORK)
            }
            Some(n) if n == "vpn" => flag("vpn_network", penalties::VPN_NETWORK),
            _ => {}
        }

        if let Some(key_id) = context.key_id.as_deref() {
            let baselines = self.baselines.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(baseline) = baselines.get(key_id) {
                if !baseline.fingerprints.is_empty()
                    && !fingerprint.is_empty()
                    && !baseline.fingerprints.iter().any(|f| f == fingerprint)
                {
                    flag(
                        "device_fingerprint_mismatch",
                        penalties::DEVICE_FINGERPRINT_MISMATCH,
                    );
                }

                if let (Some((previous, seen_at)), Some(current)) =
                    (baseline.last_location, context.coordinates)
                {
                    let elapsed_ms = context.timestamp_ms.saturating_sub(seen_at).max(1);
                    let hours = elapsed_ms as f64 / 3_600_000.0;
                    if previous.distance_km(&current) / hours > MAX_TRAVEL_SPEED_KMH {
                        flag("implausible_travel", penalties::IMPLAUSIBLE_TRAVEL);
                    }
                }

                if baseline.hours.len() >= MIN_HOUR_SAMPLES {
                    let diff = (f64::from(context.hour_of_day()) - baseline.mean_hour()).abs();
                    if diff.min(24.0 - diff) > MAX_HOUR_DISTANCE {
                        flag("unusual_time_of_day", penalties::UNUSUAL_TIME_OF_DAY);
                    }
                }
            }
        }

        // six decimals keeps sums like 1.0 - 0.8 from landing just under a gate
        let score = RiskScore {
            score: (((1.0 - penalty) * 1e6).round() / 1e6).clamp(0.0, 1.0),
            signals,
        };

        tracing::debug!(
            key_id = context.key_id.as_deref().unwrap_or("-"),
            score = score.score,
            signals = ?score.signals,
            "Behavioral score computed"
        );

        score
    }

    /// Fold a successful authentication into the credential's baseline.
    pub fn record_success(&self, context: &RequestContext) {
        let Some(key_id) = context.key_id.as_deref() else {
            return;
        };
        let mut baselines = self.baselines.write().unwrap_or_else(PoisonError::into_inner);
        let baseline = baselines.entry(key_id.to_string()).or_default();

        let fingerprint = context.device_fingerprint.trim();
        if !fingerprint.is_empty() && !baseline.fingerprints.iter().any(|f| f == fingerprint) {
            if baseline.fingerprints.len() == MAX_FINGERPRINTS {
                baseline.fingerprints.pop_front();
            }
            baseline.fingerprints.push_back(fingerprint.to_string());
        }

        if baseline.hours.len() == MAX_HOUR_SAMPLES {
            baseline.hours.pop_front();
        }
        baseline.hours.push_back(context.hour_of_day());

        if let Some(coordinates) = context.coordinates {
            baseline.last_location = Some((coordinates, context.timestamp_ms));
        }
    }

    /// Drop the baseline of a credential (after revocation).
    pub fn forget(&self, key_id: &str) {
        self.baselines
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key_id);
    }

    /// Keep only the baselines whose key id satisfies `keep`; returns how many were dropped.
    pub fn retain_baselines(&self, mut keep: impl FnMut(&str) -> bool) -> usize {
        let mut baselines = self.baselines.write().unwrap_or_else(PoisonError::into_inner);
        let before = baselines.len();
        baselines.retain(|key_id, _| keep(key_id.as_str()));
        before - baselines.len()
    }

    /// Number of successful authentications remembered for `key_id`
    pub fn baseline_samples(&self, key_id: &str) -> usize {
        self.baselines
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key_id)
            .map_or(0, |b| b.hours.len())
    }
}
