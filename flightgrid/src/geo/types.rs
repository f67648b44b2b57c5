//! Geographic point type and validation errors.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum valid latitude in degrees.
pub const MIN_LAT: f64 = -90.0;

/// Maximum valid latitude in degrees.
pub const MAX_LAT: f64 = 90.0;

/// Minimum valid longitude in degrees.
pub const MIN_LON: f64 = -180.0;

/// Maximum valid longitude in degrees.
pub const MAX_LON: f64 = 180.0;

/// Mean Earth radius in kilometres (IUGG mean radius).
///
/// Used by both circle generation and haversine distance so the two agree.
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Errors raised while validating coordinates or grid parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeoError {
    /// Coordinates are outside the valid range even after swap correction.
    #[error("coordinates out of range: lat={lat}, lon={lon}")]
    OutOfRange { lat: f64, lon: f64 },

    /// A coordinate was NaN or infinite.
    #[error("coordinates must be finite numbers")]
    NonFinite,

    /// Grid resolution outside 0..=15.
    #[error("invalid grid resolution: {0}")]
    InvalidResolution(u8),

    /// A cell identifier could not be parsed.
    #[error("invalid cell id: {0}")]
    InvalidCell(String),

    /// A polygon ring the grid cannot tile.
    #[error("invalid polygon: {0}")]
    InvalidPolygon(String),
}

/// A validated geographic position in degrees.
///
/// Construct through [`GeoPoint::new`] (strict) or [`super::sanitize`]
/// (swap-correcting) so that the range invariant always holds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGeoPoint")]
pub struct GeoPoint {
    lat: f64,
    lon: f64,
}

/// Unvalidated wire form of [`GeoPoint`].
#[derive(Deserialize)]
struct RawGeoPoint {
    lat: f64,
    lon: f64,
}

impl TryFrom<RawGeoPoint> for GeoPoint {
    type Error = GeoError;

    fn try_from(raw: RawGeoPoint) -> Result<Self, Self::Error> {
        GeoPoint::new(raw.lat, raw.lon)
    }
}

impl GeoPoint {
    /// Creates a point, rejecting anything outside the valid ranges.
    pub fn new(lat: f64, lon: f64) -> Result<Self, GeoError> {
        if !lat.is_finite() || !lon.is_finite() {
            return Err(GeoError::NonFinite);
        }
        if !(MIN_LAT..=MAX_LAT).contains(&lat) || !(MIN_LON..=MAX_LON).contains(&lon) {
            return Err(GeoError::OutOfRange { lat, lon });
        }
        Ok(Self { lat, lon })
    }

    /// Builds a point from a `[lon, lat]` pair as used by GeoJSON-style rings.
    pub fn from_lon_lat(pair: [f64; 2]) -> Result<Self, GeoError> {
        Self::new(pair[1], pair[0])
    }

    /// Latitude in degrees.
    #[inline]
    pub fn lat(&self) -> f64 {
        self.lat
    }

    /// Longitude in degrees.
    #[inline]
    pub fn lon(&self) -> f64 {
        self.lon
    }

    /// Creates a point without validation. Callers guarantee the invariant.
    #[inline]
    pub(crate) fn new_unchecked(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_accepts_bounds() {
        assert!(GeoPoint::new(90.0, 180.0).is_ok());
        assert!(GeoPoint::new(-90.0, -180.0).is_ok());
    }

    #[test]
    fn test_new_rejects_out_of_range() {
        assert!(matches!(
            GeoPoint::new(90.5, 0.0),
            Err(GeoError::OutOfRange { .. })
        ));
        assert!(matches!(
            GeoPoint::new(0.0, -180.1),
            Err(GeoError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_new_rejects_nan() {
        assert_eq!(GeoPoint::new(f64::NAN, 0.0), Err(GeoError::NonFinite));
    }

    #[test]
    fn test_from_lon_lat_order() {
        let p = GeoPoint::from_lon_lat([-118.25, 34.05]).unwrap();
        assert_eq!(p.lat(), 34.05);
        assert_eq!(p.lon(), -118.25);
    }

    #[test]
    fn test_deserialize_validates_range() {
        let p: GeoPoint = serde_json::from_str(r#"{"lat":34.05,"lon":-118.25}"#).unwrap();
        assert_eq!(p, GeoPoint::new(34.05, -118.25).unwrap());

        let err = serde_json::from_str::<GeoPoint>(r#"{"lat":95.0,"lon":0.0}"#).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }
}
