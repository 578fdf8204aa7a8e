//! Geographic utilities shared by the position filter and its callers.

use crate::PositionFix;

/// Earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Meters per degree of latitude (approximate, used for threshold reasoning).
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Great-circle distance between two fixes in meters (haversine).
pub fn haversine_distance(a: &PositionFix, b: &PositionFix) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lng = (b.longitude - a.longitude).to_radians();
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().asin();

    EARTH_RADIUS_M * c
}

/// Approximate latitude-degree offset corresponding to a distance in meters.
///
/// Useful for constructing fixes a known distance apart when reasoning about
/// filter thresholds.
pub fn meters_to_degrees(meters: f64) -> f64 {
    meters / METERS_PER_DEGREE
}
