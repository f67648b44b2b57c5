//! Wire form of a flight query, as posted by API clients.

use serde::{Deserialize, Serialize};

use super::{Filters, PolygonQuery, Query, RadiusQuery};
use crate::error::NearbyError;

/// Request body: exactly one of the two geometries plus optional filters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlightRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius_request: Option<RadiusRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo_request: Option<GeoRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_filters: Option<DataFilters>,
}

/// `{ "type": "radius", "latitude", "longitude", "radius_km", ... }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadiusRequest {
    #[serde(rename = "type", default = "radius_kind")]
    pub kind: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_altitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_altitude: Option<f64>,
}

/// `{ "type": "geo", "coordinates": [[lon, lat], ...], ... }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoRequest {
    #[serde(rename = "type", default = "geo_kind")]
    pub kind: String,
    pub coordinates: Vec<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_altitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_altitude: Option<f64>,
}

/// Attribute allow-lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only_aircraft: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only_airlines: Option<Vec<String>>,
}

fn radius_kind() -> String {
    "radius".to_string()
}

fn geo_kind() -> String {
    "geo".to_string()
}

impl FlightRequest {
    /// Builds a radius request body.
    pub fn radius(latitude: f64, longitude: f64, radius_km: f64) -> Self {
        Self {
            radius_request: Some(RadiusRequest {
                kind: radius_kind(),
                latitude,
                longitude,
                radius_km,
                min_altitude: None,
                max_altitude: None,
            }),
            ..Default::default()
        }
    }

    /// Builds a polygon request body from `[lon, lat]` pairs.
    pub fn polygon(coordinates: Vec<[f64; 2]>) -> Self {
        Self {
            geo_request: Some(GeoRequest {
                kind: geo_kind(),
                coordinates: coordinates.iter().map(|c| c.to_vec()).collect(),
                min_altitude: None,
                max_altitude: None,
            }),
            ..Default::default()
        }
    }

    /// Attaches allow-list filters.
    pub fn with_filters(mut self, filters: DataFilters) -> Self {
        self.data_filters = Some(filters);
        self
    }

    /// Sets the altitude band on whichever geometry is present.
    pub fn with_altitude(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        if let Some(r) = self.radius_request.as_mut() {
            r.min_altitude = min;
            r.max_altitude = max;
        }
        if let Some(g) = self.geo_request.as_mut() {
            g.min_altitude = min;
            g.max_altitude = max;
        }
        self
    }

    /// Splits the body into a raw query and its filters.
    ///
    /// A radius request wins when both geometries are present.
    pub fn to_query(&self) -> Result<(Query, Filters), NearbyError> {
        let data = self.data_filters.clone().unwrap_or_default();
        let mut filters = Filters {
            only_aircraft: data.only_aircraft,
            only_airlines: data.only_airlines,
            ..Default::default()
        };

        if let Some(r) = &self.radius_request {
            if r.kind != "radius" {
                return Err(invalid(format!("radius_request has type '{}'", r.kind)));
            }
            if !r.radius_km.is_finite() {
                return Err(invalid("radius_km must be a finite number"));
            }
            filters.min_altitude = r.min_altitude;
            filters.max_altitude = r.max_altitude;
            let query = Query::Radius(RadiusQuery {
                latitude: r.latitude,
                longitude: r.longitude,
                radius_km: r.radius_km,
            });
            return Ok((query, filters));
        }

        if let Some(g) = &self.geo_request {
            if g.kind != "geo" {
                return Err(invalid(format!("geo_request has type '{}'", g.kind)));
            }
            let coordinates = g
                .coordinates
                .iter()
                .map(|pair| match pair.as_slice() {
                    [lon, lat, ..] => Ok([*lon, *lat]),
                    _ => Err(invalid("each coordinate must be a [lon, lat] pair")),
                })
                .collect::<Result<Vec<_>, _>>()?;
            filters.min_altitude = g.min_altitude;
            filters.max_altitude = g.max_altitude;
            return Ok((Query::Polygon(PolygonQuery { coordinates }), filters));
        }

        Err(invalid("either radius_request or geo_request is required"))
    }
}

fn invalid(message: impl Into<String>) -> NearbyError {
    NearbyError::InvalidRequest(message.into())
}
