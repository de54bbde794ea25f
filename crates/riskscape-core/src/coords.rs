/// Geographic point type and the rounded key used for elevation memoisation.
/// All coordinate math uses f64 for precision.
use serde::{Deserialize, Serialize};

/// Metres per degree of latitude (mean spherical Earth).
pub const METRES_PER_DEGREE: f64 = 111_320.0;

/// Decimal places kept when keying cached lookups (~1.1 m at the equator).
pub const KEY_DECIMALS: i32 = 5;

/// A point on the sphere in geographic coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees, -90 to +90.
    pub lat: f64,
    /// Longitude in degrees, -180 to +180.
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Shift by the given degree offsets.
    pub fn offset(self, d_lat: f64, d_lng: f64) -> Self {
        Self::new(self.lat + d_lat, self.lng + d_lng)
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }

    /// Replace non-finite components with 0 and clamp to the valid ranges.
    pub fn sanitized(self) -> Self {
        let lat = if self.lat.is_finite() { self.lat.clamp(-90.0, 90.0) } else { 0.0 };
        let lng = if self.lng.is_finite() { self.lng.clamp(-180.0, 180.0) } else { 0.0 };
        Self { lat, lng }
    }

    pub fn key(&self) -> CoordKey {
        CoordKey::from_point(*self)
    }
}

/// Integer cache key: a coordinate rounded to [`KEY_DECIMALS`] places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CoordKey {
    lat_e5: i64,
    lng_e5: i64,
}

impl CoordKey {
    pub fn from_point(p: GeoPoint) -> Self {
        let scale = 10f64.powi(KEY_DECIMALS);
        Self {
            lat_e5: (p.lat * scale).round() as i64,
            lng_e5: (p.lng * scale).round() as i64,
        }
    }
}
