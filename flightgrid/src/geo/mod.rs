//! Geodesic math on the sphere.
//!
//! Pure functions used by the normalizer and the shape filter: coordinate
//! sanitation, haversine distance and a ray-casting point-in-polygon test.
//! [`circle_to_ring`] turns a radius query into an outline for callers that
//! need one as a polygon. All angles are degrees at the API boundary and
//! radians internally.

mod types;

pub use types::{GeoError, GeoPoint, EARTH_RADIUS_KM, MAX_LAT, MAX_LON, MIN_LAT, MIN_LON};

/// Number of boundary points used when approximating a circle.
pub const DEFAULT_RING_POINTS: usize = 72;

/// Added to the ray-casting denominator so horizontal edges never divide by zero.
const PIP_EPSILON: f64 = 1e-12;

/// Validates a coordinate pair, swapping the two values when the caller
/// evidently passed `(lon, lat)`.
///
/// The swap happens only when `lat` is outside [-90, 90] while `lon` fits in
/// [-90, 90]. If the (possibly swapped) pair is still invalid the input
/// values are reported in [`GeoError::OutOfRange`].
///
/// # Example
///
/// ```
/// use flightgrid::geo::sanitize;
///
/// let p = sanitize(-122.4, 37.6).unwrap();
/// assert_eq!((p.lat(), p.lon()), (37.6, -122.4));
/// ```
pub fn sanitize(lat: f64, lon: f64) -> Result<GeoPoint, GeoError> {
    if !lat.is_finite() || !lon.is_finite() {
        return Err(GeoError::NonFinite);
    }

    let lat_ok = (MIN_LAT..=MAX_LAT).contains(&lat);
    let lon_fits_lat = (MIN_LAT..=MAX_LAT).contains(&lon);

    let (lat2, lon2) = if !lat_ok && lon_fits_lat {
        (lon, lat)
    } else {
        (lat, lon)
    };

    GeoPoint::new(lat2, lon2).map_err(|_| GeoError::OutOfRange { lat, lon })
}

/// Great-circle distance between two points in kilometres.
#[inline]
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let phi1 = a.lat().to_radians();
    let phi2 = b.lat().to_radians();
    let d_phi = (b.lat() - a.lat()).to_radians();
    let d_lambda = (b.lon() - a.lon()).to_radians();

    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let h = h.clamp(0.0, 1.0);

    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Point reached by travelling `distance_km` from `origin` along the initial
/// bearing `bearing_deg` (clockwise from north).
pub fn destination_point(origin: GeoPoint, bearing_deg: f64, distance_km: f64) -> GeoPoint {
    let delta = distance_km / EARTH_RADIUS_KM;
    let theta = bearing_deg.to_radians();
    let phi1 = origin.lat().to_radians();
    let lambda1 = origin.lon().to_radians();

    let sin_phi2 = phi1.sin() * delta.cos() + phi1.cos() * delta.sin() * theta.cos();
    let phi2 = sin_phi2.clamp(-1.0, 1.0).asin();
    let lambda2 = lambda1
        + (theta.sin() * delta.sin() * phi1.cos()).atan2(delta.cos() - phi1.sin() * sin_phi2);

    let lat = phi2.to_degrees().clamp(MIN_LAT, MAX_LAT);
    GeoPoint::new_unchecked(lat, normalize_lon(lambda2.to_degrees()))
}

/// Approximates the geodesic circle around `center` as a closed ring.
///
/// Returns `point_count + 1` points; the last equals the first. Fewer than
/// three points cannot bound an area, so `point_count` is raised to 3.
pub fn circle_to_ring(center: GeoPoint, radius_km: f64, point_count: usize) -> Vec<GeoPoint> {
    let n = point_count.max(3);
    let mut ring: Vec<GeoPoint> = (0..n)
        .map(|i| {
            let bearing = 360.0 * i as f64 / n as f64;
            destination_point(center, bearing, radius_km)
        })
        .collect();
    ring.push(ring[0]);
    ring
}

/// Ray-casting containment test against a single ring without holes.
///
/// Longitude is treated as x and latitude as y. The ring may be open or
/// closed. Points exactly on an edge may fall either way.
///
/// A ring with an edge spanning more than 180 degrees of longitude is taken to
/// cross the antimeridian; its western longitudes (and the point's) are
/// shifted east by 360 degrees before the test.
pub fn point_in_polygon(point: GeoPoint, ring: &[GeoPoint]) -> bool {
    if ring.len() < 3 {
        return false;
    }

    let n = ring.len();
    let crosses = (0..n).any(|i| (ring[i].lon() - ring[(i + n - 1) % n].lon()).abs() > 180.0);
    let x_of = |p: &GeoPoint| {
        if crosses && p.lon() < 0.0 {
            p.lon() + 360.0
        } else {
            p.lon()
        }
    };

    let (x, y) = (x_of(&point), point.lat());
    let mut inside = false;
    let mut j = n - 1;

    for i in 0..n {
        let (xi, yi) = (x_of(&ring[i]), ring[i].lat());
        let (xj, yj) = (x_of(&ring[j]), ring[j].lat());

        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi + PIP_EPSILON) + xi {
            inside = !inside;
        }
        j = i;
    }

    inside
}

/// Returns the ring with its first point repeated at the end if it was open.
pub fn close_ring(mut ring: Vec<GeoPoint>) -> Vec<GeoPoint> {
    if let (Some(first), Some(last)) = (ring.first().copied(), ring.last().copied()) {
        if first != last {
            ring.push(first);
        }
    }
    ring
}

/// Wraps a longitude into [-180, 180].
#[inline]
fn normalize_lon(lon: f64) -> f64 {
    let wrapped = (lon + 540.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 && lon > 0.0 {
        180.0
    } else {
        wrapped
    }
}
