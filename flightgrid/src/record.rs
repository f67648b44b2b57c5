//! Flight records returned by the upstream tile source.
//!
//! Upstream data legitimately omits fields, so every attribute is optional.
//! Unknown fields are ignored on deserialization and absent fields are not
//! serialized.

use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;

/// One live flight as reported by the upstream source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Flight {
    // Identification
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icao24: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callsign: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration: Option<String>,

    // Position
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_lon: Option<f64>,

    /// Barometric altitude in metres.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_altitude_baro: Option<f64>,
    /// Geometric altitude in metres.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_altitude_geo: Option<f64>,

    /// Ground speed in m/s.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_velocity: Option<f64>,
    /// Track in degrees.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_true_track: Option<f64>,
    /// Vertical rate in m/s.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_vertical_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_on_ground: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_squawk: Option<String>,

    // Route
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_origin_icao: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_origin_iata: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_dest_icao: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_dest_iata: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_origin_readable: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_destination_readable: Option<String>,

    // Airline
    #[serde(skip_serializing_if = "Option::is_none")]
    pub airline_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub airline_painted_as: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub airline_operating_as: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub airline_name_readable: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub airline_logo_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub aircraft_type: Option<String>,

    // Metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta_origin_country: Option<String>,
    /// Unix timestamp of the last contact.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta_last_contact: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta_timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta_source: Option<String>,
}

impl Flight {
    /// Position of the flight, if both coordinates are known and valid.
    pub fn position(&self) -> Option<GeoPoint> {
        match (self.position_lat, self.position_lon) {
            (Some(lat), Some(lon)) => GeoPoint::new(lat, lon).ok(),
            _ => None,
        }
    }

    /// Best known altitude: barometric, then geometric.
    pub fn altitude(&self) -> Option<f64> {
        self.position_altitude_baro.or(self.position_altitude_geo)
    }
}

/// The `{ "flights": [...] }` payload shared by upstream tiles and responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlightResponse {
    #[serde(default)]
    pub flights: Vec<Flight>,
}
