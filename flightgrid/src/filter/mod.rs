//! Exact-shape filter.
//!
//! Tiles over-cover the query region, so the merged tile records are narrowed
//! here in three passes, all order preserving:
//!
//! 1. attribute allow-lists (aircraft, airline), ANDed
//! 2. altitude band
//! 3. exact geometry: haversine distance against the *requested* radius, or
//!    point-in-polygon against the closed ring
//!
//! A record without a usable position never matches a shape.

use crate::geo::{haversine_km, point_in_polygon};
use crate::query::{non_empty, Filters, Shape};
use crate::record::Flight;

/// Keeps the records that satisfy `filters` and lie inside `shape`.
///
/// The relative order of surviving records is unchanged.
pub fn apply_shape_filter(records: Vec<Flight>, shape: &Shape, filters: &Filters) -> Vec<Flight> {
    records
        .into_iter()
        .filter(|f| matches_attributes(f, filters))
        .filter(|f| matches_altitude(f, filters))
        .filter(|f| within_shape(f, shape))
        .collect()
}

/// Allow-list test. Empty or absent lists admit everything.
pub fn matches_attributes(flight: &Flight, filters: &Filters) -> bool {
    if let Some(aircraft) = non_empty(&filters.only_aircraft) {
        let ids = [&flight.icao24, &flight.registration];
        if !any_listed(&ids, aircraft) {
            return false;
        }
    }

    if let Some(airlines) = non_empty(&filters.only_airlines) {
        let codes = [
            &flight.airline_code,
            &flight.airline_painted_as,
            &flight.airline_operating_as,
        ];
        if !any_listed(&codes, airlines) {
            return false;
        }
    }

    true
}

/// Altitude band test. With a bound set, records of unknown altitude fail.
pub fn matches_altitude(flight: &Flight, filters: &Filters) -> bool {
    if filters.min_altitude.is_none() && filters.max_altitude.is_none() {
        return true;
    }
    let Some(altitude) = flight.altitude() else {
        return false;
    };
    filters.min_altitude.map_or(true, |min| altitude >= min)
        && filters.max_altitude.map_or(true, |max| altitude <= max)
}

/// Geometry test.
pub fn within_shape(flight: &Flight, shape: &Shape) -> bool {
    let Some(position) = flight.position() else {
        return false;
    };
    match shape {
        Shape::Circle { center, radius_km } => haversine_km(*center, position) <= *radius_km,
        Shape::Polygon { ring } => point_in_polygon(position, ring),
    }
}

fn any_listed(fields: &[&Option<String>], list: &[String]) -> bool {
    fields.iter().filter_map(|f| f.as_deref()).any(|value| {
        let value = value.trim();
        list.iter().any(|wanted| wanted.trim().eq_ignore_ascii_case(value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{close_ring, destination_point, GeoPoint};

    fn la() -> GeoPoint {
        GeoPoint::new(34.0522, -118.2437).unwrap()
    }

    fn at(p: GeoPoint, tag: &str) -> Flight {
        Flight {
            callsign: Some(tag.to_string()),
            position_lat: Some(p.lat()),
            position_lon: Some(p.lon()),
            ..Default::default()
        }
    }

    fn tags(records: &[Flight]) -> Vec<&str> {
        records.iter().filter_map(|f| f.callsign.as_deref()).collect()
    }

    fn circle(radius_km: f64) -> Shape {
        Shape::Circle {
            center: la(),
            radius_km,
        }
    }

    #[test]
    fn test_exact_radius_boundary() {
        let edge = destination_point(la(), 45.0, 25.0);
        let r = haversine_km(la(), edge);
        let beyond = destination_point(la(), 45.0, r + 0.001);
        assert!(haversine_km(la(), beyond) > r);

        let records = vec![at(edge, "edge"), at(beyond, "beyond")];
        let kept = apply_shape_filter(records, &circle(r), &Filters::default());
        assert_eq!(tags(&kept), vec!["edge"]);
    }

    #[test]
    fn test_filter_uses_requested_radius_not_bucket() {
        // 12 km is inside the 25 km bucket but outside the requested 10 km.
        let p = destination_point(la(), 90.0, 12.0);
        let kept = apply_shape_filter(vec![at(p, "x")], &circle(10.0), &Filters::default());
        assert!(kept.is_empty());
    }

    #[test]
    fn test_matches_haversine_subset() {
        let records: Vec<Flight> = (0..40)
            .map(|i| {
                let p = destination_point(la(), i as f64 * 9.0, i as f64);
                at(p, &format!("r{}", i))
            })
            .collect();
        let expected: Vec<String> = records
            .iter()
            .filter(|f| haversine_km(la(), f.position().unwrap()) <= 17.5)
            .map(|f| f.callsign.clone().unwrap())
            .collect();

        let kept = apply_shape_filter(records, &circle(17.5), &Filters::default());
        let kept: Vec<String> = kept.into_iter().map(|f| f.callsign.unwrap()).collect();
        assert_eq!(kept, expected);
    }

    #[test]
    fn test_missing_position_never_matches() {
        let no_lon = Flight {
            position_lat: Some(34.0522),
            ..Default::default()
        };
        assert!(apply_shape_filter(vec![no_lon], &circle(100.0), &Filters::default()).is_empty());
    }

    #[test]
    fn test_polygon_filter() {
        let ring = close_ring(vec![
            GeoPoint::new(33.9, -118.4).unwrap(),
            GeoPoint::new(33.9, -118.1).unwrap(),
            GeoPoint::new(34.2, -118.1).unwrap(),
            GeoPoint::new(34.2, -118.4).unwrap(),
        ]);
        let inside = at(la(), "in");
        let outside = at(GeoPoint::new(34.5, -118.2).unwrap(), "out");
        let kept = apply_shape_filter(
            vec![outside, inside],
            &Shape::Polygon { ring },
            &Filters::default(),
        );
        assert_eq!(tags(&kept), vec!["in"]);
    }

    #[test]
    fn test_order_preserved() {
        let records = vec![
            at(destination_point(la(), 0.0, 3.0), "c"),
            at(la(), "a"),
            at(destination_point(la(), 180.0, 1.0), "b"),
        ];
        let kept = apply_shape_filter(records, &circle(5.0), &Filters::default());
        assert_eq!(tags(&kept), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_aircraft_allow_list_matches_icao_or_registration() {
        let mut by_icao = at(la(), "icao");
        by_icao.icao24 = Some("A1B2C3".into());
        let mut by_reg = at(la(), "reg");
        by_reg.registration = Some("N123UA".into());
        let other = at(la(), "other");

        let filters = Filters {
            only_aircraft: Some(vec!["a1b2c3".into(), "N123UA".into()]),
            ..Default::default()
        };
        let kept = apply_shape_filter(vec![by_icao, by_reg, other], &circle(5.0), &filters);
        assert_eq!(tags(&kept), vec!["icao", "reg"]);
    }

    #[test]
    fn test_airline_allow_list_checks_aliases() {
        let mut painted = at(la(), "painted");
        painted.airline_painted_as = Some("UAL".into());
        let mut operating = at(la(), "operating");
        operating.airline_code = Some("SKW".into());
        operating.airline_operating_as = Some("UAL".into());
        let mut other = at(la(), "other");
        other.airline_code = Some("DAL".into());

        let filters = Filters {
            only_airlines: Some(vec!["UAL".into()]),
            ..Default::default()
        };
        let kept = apply_shape_filter(vec![painted, operating, other], &circle(5.0), &filters);
        assert_eq!(tags(&kept), vec!["painted", "operating"]);
    }

    #[test]
    fn test_allow_lists_are_anded() {
        let mut both = at(la(), "both");
        both.icao24 = Some("abc123".into());
        both.airline_code = Some("UAL".into());
        let mut aircraft_only = at(la(), "aircraft_only");
        aircraft_only.icao24 = Some("abc123".into());
        aircraft_only.airline_code = Some("DAL".into());

        let filters = Filters {
            only_aircraft: Some(vec!["abc123".into()]),
            only_airlines: Some(vec!["UAL".into()]),
            ..Default::default()
        };
        let kept = apply_shape_filter(vec![both, aircraft_only], &circle(5.0), &filters);
        assert_eq!(tags(&kept), vec!["both"]);
    }

    #[test]
    fn test_empty_allow_list_admits_all() {
        let filters = Filters {
            only_airlines: Some(vec![]),
            ..Default::default()
        };
        assert_eq!(apply_shape_filter(vec![at(la(), "x")], &circle(5.0), &filters).len(), 1);
    }

    #[test]
    fn test_altitude_band() {
        let mut low = at(la(), "low");
        low.position_altitude_baro = Some(300.0);
        let mut mid = at(la(), "mid");
        mid.position_altitude_geo = Some(3000.0);
        let mut high = at(la(), "high");
        high.position_altitude_baro = Some(11000.0);
        let unknown = at(la(), "unknown");

        let filters = Filters {
            min_altitude: Some(1000.0),
            max_altitude: Some(10000.0),
            ..Default::default()
        };
        let kept = apply_shape_filter(vec![low, mid, high, unknown], &circle(5.0), &filters);
        assert_eq!(tags(&kept), vec!["mid"]);
    }

    #[test]
    fn test_no_altitude_bound_keeps_unknown_altitude() {
        assert!(matches_altitude(&Flight::default(), &Filters::default()));
    }
}
