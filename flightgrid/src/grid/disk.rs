//! Cells touched by a spherical cap.
//!
//! The walk starts at the cell holding the centre and expands through grid
//! neighbours, keeping every cell whose boundary comes within the radius of the
//! centre. The cells meeting a cap form a connected patch, so the walk never
//! needs to look past the first ring of rejected cells.
//!
//! ```text
//!        . . . . .
//!      . o o o o o .       o  kept: boundary within R of C
//!     . o o o o o o .      .  rejected: visited once, never expanded
//!      . o o C o o .
//!       . o o o o .
//!        . . . . .
//! ```
//!
//! Distances are great-circle throughout, so caps spanning the antimeridian
//! or containing a pole need no special handling.

use std::collections::{BTreeSet, HashSet, VecDeque};

use h3o::{CellIndex, LatLng, Resolution};

use crate::geo::{GeoPoint, EARTH_RADIUS_KM};

/// Tolerance added to the radius when testing cell boundaries.
const DISTANCE_SLACK_KM: f64 = 1e-3;

type Vec3 = [f64; 3];

/// Every cell at `res` that meets the cap of `radius_km` around `center`.
pub(super) fn cap_cells(center: GeoPoint, radius_km: f64, res: Resolution) -> BTreeSet<CellIndex> {
    let mut cells = BTreeSet::new();
    if radius_km.is_nan() || radius_km <= 0.0 {
        return cells;
    }
    let Ok(origin_ll) = LatLng::new(center.lat(), center.lon()) else {
        return cells;
    };

    let origin = origin_ll.to_cell(res);
    let c = unit(center.lat().to_radians(), center.lon().to_radians());
    let limit = radius_km + DISTANCE_SLACK_KM;

    let mut visited: HashSet<CellIndex> = HashSet::from([origin]);
    let mut queue: VecDeque<CellIndex> = VecDeque::from([origin]);

    while let Some(cell) = queue.pop_front() {
        if cell != origin && distance_to_cell_km(c, cell) > limit {
            continue;
        }
        cells.insert(cell);

        for neighbour in cell.grid_disk::<Vec<_>>(1) {
            if visited.insert(neighbour) {
                queue.push_back(neighbour);
            }
        }
    }

    cells
}

/// Great-circle distance from `p` to the nearest point of `cell`'s boundary.
fn distance_to_cell_km(p: Vec3, cell: CellIndex) -> f64 {
    let vertices: Vec<Vec3> = cell
        .boundary()
        .iter()
        .map(|ll| unit(ll.lat_radians(), ll.lng_radians()))
        .collect();

    let n = vertices.len();
    (0..n)
        .map(|i| distance_to_arc_km(p, vertices[i], vertices[(i + 1) % n]))
        .fold(f64::INFINITY, f64::min)
}

/// Distance from `p` to the minor great-circle arc `a`-`b`.
fn distance_to_arc_km(p: Vec3, a: Vec3, b: Vec3) -> f64 {
    let normal = cross(a, b);
    let len = norm(normal);
    if len < 1e-15 {
        return angle(p, a) * EARTH_RADIUS_KM;
    }
    let normal = scale(normal, 1.0 / len);

    // Foot of the perpendicular from p onto the arc's great circle.
    let offset = dot(p, normal);
    let foot = sub(p, scale(normal, offset));
    let on_arc = dot(cross(a, foot), normal) >= 0.0 && dot(cross(foot, b), normal) >= 0.0;

    if on_arc {
        offset.clamp(-1.0, 1.0).asin().abs() * EARTH_RADIUS_KM
    } else {
        angle(p, a).min(angle(p, b)) * EARTH_RADIUS_KM
    }
}

fn unit(lat: f64, lon: f64) -> Vec3 {
    [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
}

fn dot(a: Vec3, b: Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: Vec3, b: Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn sub(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn scale(a: Vec3, k: f64) -> Vec3 {
    [a[0] * k, a[1] * k, a[2] * k]
}

fn norm(a: Vec3) -> f64 {
    dot(a, a).sqrt()
}

/// Angle between two unit vectors in radians.
fn angle(a: Vec3, b: Vec3) -> f64 {
    norm(cross(a, b)).atan2(dot(a, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{destination_point, haversine_km};

    fn pt(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon).unwrap()
    }

    fn v(p: GeoPoint) -> Vec3 {
        unit(p.lat().to_radians(), p.lon().to_radians())
    }

    #[test]
    fn test_arc_distance_to_interior_foot() {
        // Arc along the equator, point due north of its middle
        let a = v(pt(0.0, 0.0));
        let b = v(pt(0.0, 2.0));
        let p = pt(1.0, 1.0);
        let d = distance_to_arc_km(v(p), a, b);
        assert!((d - haversine_km(p, pt(0.0, 1.0))).abs() < 1e-6);
    }

    #[test]
    fn test_arc_distance_past_endpoint() {
        let a = v(pt(0.0, 0.0));
        let b = v(pt(0.0, 2.0));
        let p = pt(0.0, 5.0);
        let d = distance_to_arc_km(v(p), a, b);
        assert!((d - haversine_km(p, pt(0.0, 2.0))).abs() < 1e-6);
    }

    #[test]
    fn test_non_positive_radius_is_empty() {
        let res = Resolution::Five;
        assert!(cap_cells(pt(10.0, 10.0), 0.0, res).is_empty());
        assert!(cap_cells(pt(10.0, 10.0), -1.0, res).is_empty());
        assert!(cap_cells(pt(10.0, 10.0), f64::NAN, res).is_empty());
    }

    #[test]
    fn test_tiny_radius_is_origin_cell() {
        let center = pt(34.0522, -118.2437);
        let cells = cap_cells(center, 1e-6, Resolution::Five);
        let origin = LatLng::new(center.lat(), center.lon()).unwrap().to_cell(Resolution::Five);
        assert!(cells.contains(&origin));
        assert!(cells.len() <= 3);
    }

    #[test]
    fn test_kept_cells_are_near_the_centre() {
        let center = pt(48.8566, 2.3522);
        let r = 40.0;
        let res = Resolution::Five;
        let cells = cap_cells(center, r, res);
        let reach = r + 2.0 * res.edge_length_km() + 1.0;
        for cell in &cells {
            let ll = LatLng::from(*cell);
            assert!(haversine_km(center, pt(ll.lat(), ll.lng())) <= reach);
        }
    }

    #[test]
    fn test_cap_over_antimeridian_holds_both_sides() {
        let center = pt(-17.7, 179.9);
        let cells = cap_cells(center, 50.0, Resolution::Five);
        for bearing in [90.0, 270.0] {
            let p = destination_point(center, bearing, 45.0);
            let cell = LatLng::new(p.lat(), p.lon()).unwrap().to_cell(Resolution::Five);
            assert!(cells.contains(&cell), "{} not covered", p);
        }
        assert!(cells.len() < 200, "{} cells", cells.len());
    }

    #[test]
    fn test_cap_over_pole_holds_far_side() {
        let center = pt(89.9, 0.0);
        let cells = cap_cells(center, 50.0, Resolution::Five);
        let far = destination_point(center, 0.0, 45.0);
        let cell = LatLng::new(far.lat(), far.lon()).unwrap().to_cell(Resolution::Five);
        assert!(cells.contains(&cell), "{} not covered", far);
    }
}
