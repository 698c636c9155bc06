//! Geofence math.

use serde::{Deserialize, Serialize};

/// Mean earth radius used by the haversine formula, in meters.
const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Maximum distance between the submitted and the authoritative location
/// for evidence to count.
pub const GEOFENCE_RADIUS_METERS: f64 = 100.0;

/// A WGS84 coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude
    pub lat: f64,
    /// Longitude
    pub lng: f64,
}

impl Coordinate {
    /// Create a coordinate.
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Whether both components are finite and inside the valid ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Great-circle distance between two coordinates, in meters.
pub fn distance_meters(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().min(1.0).asin()
}

/// Whether `submitted` lies within [`GEOFENCE_RADIUS_METERS`] of `target`.
pub fn within_geofence(target: Coordinate, submitted: Coordinate) -> bool {
    distance_meters(target, submitted) <= GEOFENCE_RADIUS_METERS
}
