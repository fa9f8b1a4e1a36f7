//! Risk scoring types.

use serde::{Deserialize, Serialize};

/// Geographic coordinates in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude, -90..=90
    pub latitude: f64,
    /// Longitude, -180..=180
    pub longitude: f64,
}

impl GeoPoint {
    /// Great-circle distance in kilometres (haversine).
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        const EARTH_RADIUS_KM: f64 = 6371.0;
        let (lat1, lat2) = (self.latitude.to_radians(), other.latitude.to_radians());
        let dlat = lat2 - lat1;
        let dlon = (other.longitude - self.longitude).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
    }
}

/// Everything the scorer looks at for one request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    /// Credential the request is for; `None` while minting
    pub key_id: Option<String>,
    /// Client identifier, if known
    pub client_id: Option<String>,
    /// Device fingerprint presented by the caller
    pub device_fingerprint: String,
    /// Caller coordinates, if supplied
    pub coordinates: Option<GeoPoint>,
    /// Network classification (`wifi`, `cellular`, `vpn`, `tor`, ...)
    pub network_type: Option<String>,
    /// Request time, epoch milliseconds
    pub timestamp_ms: u64,
}

impl RequestContext {
    /// UTC hour of day of the request
    pub fn hour_of_day(&self) -> u8 {
        ((self.timestamp_ms / 3_600_000) % 24) as u8
    }
}

/// Score plus the signals that lowered it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    /// Trust score in `[0, 1]`
    pub score: f64,
    /// Names of the signals that fired
    pub signals: Vec<String>,
}

impl RiskScore {
    /// Whether the score reaches `threshold`
    pub fn passes(&self, threshold: f64) -> bool {
        self.score >= threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_km() {
        let paris = GeoPoint {
            latitude: 48.8566,
            longitude: 2.3522,
        };
        let new_york = GeoPoint {
            latitude: 40.7128,
            longitude: -74.0060,
        };
        let d = paris.distance_km(&new_york);
        assert!((d - 5837.0).abs() < 15.0, "got {d}");
        assert_eq!(paris.distance_km(&paris), 0.0);
    }

    #[test]
    fn test_hour_of_day() {
        let ctx = RequestContext {
            timestamp_ms: 3_600_000 * 24 * 10 + 3_600_000 * 13 + 59_000,
            ..Default::default()
        };
        assert_eq!(ctx.hour_of_day(), 13);
    }

    #[test]
    fn test_passes_is_inclusive() {
        let score = RiskScore {
            score: 0.3,
            signals: vec![],
        };
        assert!(score.passes(0.3));
        assert!(!score.passes(0.31));
    }
}
