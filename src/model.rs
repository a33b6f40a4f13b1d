//! # Data Model
//!
//! Values that flow through the acquisition and sync pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One decoded GPS reading, in signed decimal degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fix {
    pub latitude: f64,
    pub longitude: f64,
    /// Altitude above mean sea level in meters
    pub altitude: f64,
    pub observed_at: DateTime<Utc>,
}

/// Opaque signal-quality token returned by the modem (e.g. `15,99`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalSample(String);

impl SignalSample {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SignalSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A record about to be appended to the durable store
///
/// There is no `synced` field: every appended record starts unsynced.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub signal_quality: SignalSample,
}

impl NewRecord {
    pub fn from_fix(fix: &Fix, signal: &SignalSample) -> Self {
        Self {
            timestamp: fix.observed_at,
            latitude: fix.latitude,
            longitude: fix.longitude,
            altitude: fix.altitude,
            signal_quality: signal.clone(),
        }
    }
}

/// A record as held by the durable store
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub signal_quality: SignalSample,
    pub synced: bool,
}

impl Record {
    /// The position of this record as a fix, used to anchor the distance gate
    pub fn fix(&self) -> Fix {
        Fix {
            latitude: self.latitude,
            longitude: self.longitude,
            altitude: self.altitude,
            observed_at: self.timestamp,
        }
    }
}

/// GeoJSON point as produced by `ST_AsGeoJSON`
///
/// Coordinates are `[longitude, latitude]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(rename = "type")]
    pub kind: GeoKind,
    pub coordinates: [f64; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeoKind {
    Point,
}

impl GeoPoint {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            kind: GeoKind::Point,
            coordinates: [longitude, latitude],
        }
    }

    pub fn longitude(&self) -> f64 {
        self.coordinates[0]
    }

    pub fn latitude(&self) -> f64 {
        self.coordinates[1]
    }
}

/// A record in the remote store, as served by the read endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteRecord {
    pub id: i64,
    #[serde(rename = "alt")]
    pub altitude: f64,
    #[serde(rename = "csq")]
    pub signal_quality: String,
    pub timestamp: DateTime<Utc>,
    /// Raw weather API body, `None` until backfilled
    pub weather: Option<String>,
    pub geom: GeoPoint,
}

/// A remote record still waiting for weather data
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWeather {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub geom: GeoPoint,
}

impl PendingWeather {
    /// Unix time in seconds, rounded from milliseconds
    pub fn unix_timestamp(&self) -> i64 {
        (self.timestamp.timestamp_millis() as f64 / 1000.0).round() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_geojson_point_parses() {
        let point: GeoPoint =
            serde_json::from_str(r#"{"type":"Point","coordinates":[11.5166666,48.1173]}"#).unwrap();
        assert_eq!(point.longitude(), 11.5166666);
        assert_eq!(point.latitude(), 48.1173);
    }

    #[test]
    fn test_geojson_rejects_non_point() {
        let result: serde_json::Result<GeoPoint> =
            serde_json::from_str(r#"{"type":"LineString","coordinates":[1.0,2.0]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_unix_timestamp_rounds_milliseconds() {
        let timestamp = Utc.timestamp_millis_opt(1_500_000_000_600).unwrap();
        let pending = PendingWeather {
            id: 1,
            timestamp,
            geom: GeoPoint::new(0.0, 0.0),
        };
        assert_eq!(pending.unix_timestamp(), 1_500_000_001);
    }

    #[test]
    fn test_remote_record_serializes_like_samples_table() {
        let record = RemoteRecord {
            id: 7,
            altitude: 545.4,
            signal_quality: "15,99".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            weather: None,
            geom: GeoPoint::new(11.5, 48.1),
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["alt"], 545.4);
        assert_eq!(json["csq"], "15,99");
        assert!(json["weather"].is_null());
        assert_eq!(json["geom"]["type"], "Point");
        assert_eq!(json["geom"]["coordinates"][0], 11.5);
    }

    #[test]
    fn test_new_record_copies_fix_and_signal() {
        let fix = Fix {
            latitude: 1.0,
            longitude: 2.0,
            altitude: 3.0,
            observed_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        };
        let record = NewRecord::from_fix(&fix, &SignalSample::new("20,0"));
        assert_eq!(record.latitude, 1.0);
        assert_eq!(record.longitude, 2.0);
        assert_eq!(record.altitude, 3.0);
        assert_eq!(record.timestamp, fix.observed_at);
        assert_eq!(record.signal_quality.as_str(), "20,0");
    }
}
