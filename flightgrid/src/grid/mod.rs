//! Hexagonal grid adapter.
//!
//! Thin wrapper over [`h3o`] exposing what the rest of the crate needs: point
//! to cell, polygon to covering cells, the cells touched by a circle, and the
//! walk from a fine cell up to its coarse parent.
//! Cell identifiers leave this module as [`CellId`] values whose string form
//! is the canonical 15-character hexadecimal H3 index.

mod disk;

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use ::geo::{LineString, Polygon};
use h3o::geom::{ContainmentMode, TilerBuilder};
use h3o::{CellIndex, LatLng};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::geo::{GeoError, GeoPoint};

pub use h3o::Resolution;

/// Rule deciding which cells belong to a polygon's coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Containment {
    /// Cells whose centre lies inside the ring.
    Centroid,
    /// Every cell the ring touches, even partially.
    Covering,
}

impl From<Containment> for ContainmentMode {
    fn from(mode: Containment) -> Self {
        match mode {
            Containment::Centroid => ContainmentMode::ContainsCentroid,
            Containment::Covering => ContainmentMode::Covers,
        }
    }
}

/// One cell of the hexagonal grid at some resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellId(CellIndex);

impl CellId {
    /// Resolution level of this cell.
    pub fn resolution(&self) -> u8 {
        u8::from(self.0.resolution())
    }

    /// Centre of the cell.
    pub fn center(&self) -> GeoPoint {
        let ll = LatLng::from(self.0);
        GeoPoint::new_unchecked(ll.lat(), ll.lng())
    }
}

impl From<CellIndex> for CellId {
    fn from(index: CellIndex) -> Self {
        Self(index)
    }
}

impl PartialOrd for CellId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        u64::from(self.0).cmp(&u64::from(other.0))
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CellId {
    type Err = GeoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<CellIndex>()
            .map(Self)
            .map_err(|_| GeoError::InvalidCell(s.to_string()))
    }
}

impl Serialize for CellId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CellId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Converts a numeric level into a grid resolution.
pub fn resolution(level: u8) -> Result<Resolution, GeoError> {
    Resolution::try_from(level).map_err(|_| GeoError::InvalidResolution(level))
}

/// Cell containing `point` at `res`.
pub fn point_to_cell(point: GeoPoint, res: Resolution) -> Result<CellId, GeoError> {
    let ll = LatLng::new(point.lat(), point.lon()).map_err(|_| GeoError::NonFinite)?;
    Ok(CellId(ll.to_cell(res)))
}

/// Cells at `res` covering `ring`, sorted and de-duplicated.
///
/// See [`Containment`] for the two inclusion rules. Rings crossing the
/// antimeridian are split before tiling. A ring with fewer than three distinct
/// vertices covers nothing.
pub fn polygon_to_cells(
    ring: &[GeoPoint],
    res: Resolution,
    mode: Containment,
) -> Result<Vec<CellId>, GeoError> {
    if distinct_vertices(ring) < 3 {
        return Ok(Vec::new());
    }

    let exterior: LineString = ring.iter().map(|p| (p.lon(), p.lat())).collect();
    let mut tiler = TilerBuilder::new(res).containment_mode(mode.into()).build();
    tiler
        .add(Polygon::new(exterior, Vec::new()))
        .map_err(|e| GeoError::InvalidPolygon(e.to_string()))?;

    let cells: BTreeSet<CellId> = tiler.into_coverage().map(CellId).collect();
    Ok(cells.into_iter().collect())
}

/// Cells at `res` touched by the circle of `radius_km` around `center`,
/// sorted and de-duplicated.
///
/// Every point within `radius_km` of `center` lies in one of the returned
/// cells. A radius of zero or less covers nothing.
pub fn disk_to_cells(center: GeoPoint, radius_km: f64, res: Resolution) -> Vec<CellId> {
    disk::cap_cells(center, radius_km, res)
        .into_iter()
        .map(CellId)
        .collect()
}

/// Ancestor of `cell` at the coarser resolution `res`.
///
/// Returns `None` when `res` is finer than the cell itself.
pub fn cell_to_parent(cell: CellId, res: Resolution) -> Option<CellId> {
    cell.0.parent(res).map(CellId)
}

fn distinct_vertices(ring: &[GeoPoint]) -> usize {
    let mut seen: Vec<GeoPoint> = Vec::with_capacity(ring.len());
    for p in ring {
        if !seen.contains(p) {
            seen.push(*p);
        }
    }
    seen.len()
}
