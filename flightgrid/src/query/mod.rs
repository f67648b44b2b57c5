//! Query model.
//!
//! A [`Query`] is the raw, unvalidated shape a caller asked about. The
//! normalizer turns it into a [`Shape`] whose coordinates satisfy the
//! [`GeoPoint`] invariant. [`Filters`] travel alongside and are applied by the
//! shape filter after geometry has been resolved.

mod request;

pub use request::{DataFilters, FlightRequest, GeoRequest, RadiusRequest};

use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;

/// A raw geographic query.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Everything within `radius_km` of a point.
    Radius(RadiusQuery),
    /// Everything inside a ring of `[lon, lat]` pairs.
    Polygon(PolygonQuery),
}

/// Point-and-radius query with coordinates exactly as supplied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadiusQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: f64,
}

/// Polygon query. Coordinates are `[lon, lat]` pairs; the ring is closed
/// implicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonQuery {
    pub coordinates: Vec<[f64; 2]>,
}

/// Resolved query geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Sanitized centre and the exact requested radius.
    Circle { center: GeoPoint, radius_km: f64 },
    /// Validated, closed ring.
    Polygon { ring: Vec<GeoPoint> },
}

/// Attribute and altitude filters applied before the geometry filter.
///
/// Empty allow-lists are treated the same as absent ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filters {
    /// Keep only flights whose ICAO24 address or registration is listed.
    pub only_aircraft: Option<Vec<String>>,
    /// Keep only flights whose airline code (or painted/operating alias) is listed.
    pub only_airlines: Option<Vec<String>>,
    /// Minimum altitude in metres.
    pub min_altitude: Option<f64>,
    /// Maximum altitude in metres.
    pub max_altitude: Option<f64>,
}

impl Filters {
    /// True when no filter would remove anything.
    pub fn is_empty(&self) -> bool {
        non_empty(&self.only_aircraft).is_none()
            && non_empty(&self.only_airlines).is_none()
            && self.min_altitude.is_none()
            && self.max_altitude.is_none()
    }
}

pub(crate) fn non_empty(list: &Option<Vec<String>>) -> Option<&[String]> {
    list.as_deref().filter(|l| !l.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filters_empty() {
        assert!(Filters::default().is_empty());
    }

    #[test]
    fn test_empty_allow_list_is_no_filter() {
        let filters = Filters {
            only_aircraft: Some(vec![]),
            ..Default::default()
        };
        assert!(filters.is_empty());
    }

    #[test]
    fn test_altitude_bound_is_a_filter() {
        let filters = Filters {
            min_altitude: Some(1000.0),
            ..Default::default()
        };
        assert!(!filters.is_empty());
    }
}
