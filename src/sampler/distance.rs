//! # Distance Gate
//!
//! Great-circle distance and the commit decision built on it.

use crate::model::Fix;

/// Mean Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Default minimum displacement before a new record is committed (~1/2 mile)
pub const DEFAULT_DISTANCE_THRESHOLD_M: f64 = 800.0;

/// Great-circle distance between two points using the haversine formula
///
/// # Arguments
///
/// * `from` - `(latitude, longitude)` in decimal degrees
/// * `to` - `(latitude, longitude)` in decimal degrees
/// * `radius` - Sphere radius; the result uses the same unit
///
/// # Examples
///
/// ```
/// use signal_survey::sampler::distance::{haversine, EARTH_RADIUS_M};
///
/// let d = haversine((0.0, 0.0), (0.0, 1.0), EARTH_RADIUS_M);
/// assert!((d - 111_195.0).abs() < 1.0);
/// ```
pub fn haversine(from: (f64, f64), to: (f64, f64), radius: f64) -> f64 {
    let (lat1, lon1) = (from.0.to_radians(), from.1.to_radians());
    let (lat2, lon2) = (to.0.to_radians(), to.1.to_radians());
    let delta_lat = lat2 - lat1;
    let delta_lon = lon2 - lon1;

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    radius * c
}

/// Distance in meters between two fixes
pub fn fix_distance(from: &Fix, to: &Fix) -> f64 {
    haversine(
        (from.latitude, from.longitude),
        (to.latitude, to.longitude),
        EARTH_RADIUS_M,
    )
}

/// Decide whether `current` should become a durable record
///
/// With no anchor (first fix ever) the answer is always yes; otherwise the
/// fix must be strictly farther than `threshold_m` from the anchor.
pub fn should_commit(anchor: Option<&Fix>, current: &Fix, threshold_m: f64) -> bool {
    match anchor {
        None => true,
        Some(anchor) => fix_distance(anchor, current) > threshold_m,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn fix(latitude: f64, longitude: f64) -> Fix {
        Fix {
            latitude,
            longitude,
            altitude: 0.0,
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn test_haversine_same_point_is_zero() {
        assert_eq!(haversine((0.0, 0.0), (0.0, 0.0), EARTH_RADIUS_M), 0.0);
        assert_eq!(haversine((48.1, 11.5), (48.1, 11.5), EARTH_RADIUS_M), 0.0);
    }

    #[test]
    fn test_haversine_one_degree_of_longitude_at_equator() {
        let d = haversine((0.0, 0.0), (0.0, 1.0), EARTH_RADIUS_M);
        assert!((d - 111_195.0).abs() < 111_195.0 * 0.01, "got {}", d);
    }

    #[test]
    fn test_haversine_is_symmetric() {
        let a = (48.1173, 11.5167);
        let b = (-33.85, 151.2);
        let ab = haversine(a, b, EARTH_RADIUS_M);
        let ba = haversine(b, a, EARTH_RADIUS_M);
        assert!((ab - ba).abs() < 1e-6);
    }

    #[test]
    fn test_haversine_antipodes_is_half_circumference() {
        let d = haversine((0.0, 0.0), (0.0, 180.0), EARTH_RADIUS_M);
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_M).abs() < 1.0);
    }

    #[test]
    fn test_first_fix_always_commits() {
        assert!(should_commit(None, &fix(0.0, 0.0), DEFAULT_DISTANCE_THRESHOLD_M));
        assert!(should_commit(None, &fix(0.0, 0.0), f64::MAX));
    }

    #[test]
    fn test_short_move_does_not_commit() {
        // ~11 m
        let anchor = fix(0.0, 0.0);
        assert!(!should_commit(Some(&anchor), &fix(0.0, 0.0001), DEFAULT_DISTANCE_THRESHOLD_M));
        // ~778 m
        assert!(!should_commit(Some(&anchor), &fix(0.0, 0.007), DEFAULT_DISTANCE_THRESHOLD_M));
    }

    #[test]
    fn test_long_move_commits() {
        // ~2,224 m
        let anchor = fix(0.0, 0.0);
        assert!(should_commit(Some(&anchor), &fix(0.0, 0.02), DEFAULT_DISTANCE_THRESHOLD_M));
        // ~801 m
        assert!(should_commit(Some(&anchor), &fix(0.0, 0.0072), DEFAULT_DISTANCE_THRESHOLD_M));
    }

    #[test]
    fn test_distance_equal_to_threshold_does_not_commit() {
        let anchor = fix(0.0, 0.0);
        let current = fix(0.0, 0.02);
        let exact = fix_distance(&anchor, &current);
        assert!(!should_commit(Some(&anchor), &current, exact));
    }
}
