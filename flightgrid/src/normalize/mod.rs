//! Query normalization.
//!
//! Turns a raw [`Query`] into two things:
//!
//! - a [`CacheKey`] (radius queries only) grouping physically close queries
//!   with similar radii under one identity at the bucket resolution
//! - the sorted set of storage tiles whose upstream data covers the shape
//!
//! Radius coverage keeps every storage cell whose boundary comes within the
//! radius of the centre, measured on the sphere. Covering the circle's
//! polygon approximation would miss slivers between chord and arc; testing
//! cell boundaries directly misses nothing, wherever the circle sits.
//!
//! Polygon queries are covered directly at storage resolution and carry no
//! cache key.

mod key;

pub use key::{CacheKey, RadiusBucket, RADIUS_BUCKETS};

use tracing::debug;

use crate::geo::{self, GeoError, GeoPoint};
use crate::grid::{self, CellId, Containment, Resolution};
use crate::query::{PolygonQuery, Query, RadiusQuery, Shape};

/// Default bucket and storage resolution.
pub const DEFAULT_RESOLUTION: u8 = 5;

/// Result of normalizing one query.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedQuery {
    /// Validated geometry used by the shape filter.
    pub shape: Shape,
    /// Edge cache identity; `None` for polygon queries.
    pub cache_key: Option<CacheKey>,
    /// Storage tiles covering the shape, sorted and de-duplicated.
    pub storage_tiles: Vec<CellId>,
}

impl NormalizedQuery {
    /// Radius bucket for radius queries.
    pub fn radius_bucket(&self) -> Option<RadiusBucket> {
        match self.shape {
            Shape::Circle { radius_km, .. } => Some(RadiusBucket::for_radius(radius_km)),
            Shape::Polygon { .. } => None,
        }
    }
}

/// Maps raw queries onto cache identities and storage tiles.
#[derive(Debug, Clone)]
pub struct Normalizer {
    bucket_resolution: Resolution,
    storage_resolution: Resolution,
}

impl Default for Normalizer {
    fn default() -> Self {
        // Both constants are valid resolutions.
        let res = Resolution::try_from(DEFAULT_RESOLUTION).unwrap_or(Resolution::Five);
        Self {
            bucket_resolution: res,
            storage_resolution: res,
        }
    }
}

impl Normalizer {
    /// Creates a normalizer for the given bucket and storage resolutions.
    pub fn new(bucket_resolution: u8, storage_resolution: u8) -> Result<Self, GeoError> {
        Ok(Self {
            bucket_resolution: grid::resolution(bucket_resolution)?,
            storage_resolution: grid::resolution(storage_resolution)?,
        })
    }

    pub fn bucket_resolution(&self) -> u8 {
        u8::from(self.bucket_resolution)
    }

    pub fn storage_resolution(&self) -> u8 {
        u8::from(self.storage_resolution)
    }

    /// Normalizes `query`.
    ///
    /// Fails only when coordinates cannot be resolved. A shape that covers
    /// no tiles is not an error: it yields an empty tile set.
    pub fn normalize(&self, query: &Query) -> Result<NormalizedQuery, GeoError> {
        let normalized = match query {
            Query::Radius(radius) => self.normalize_radius(radius)?,
            Query::Polygon(polygon) => self.normalize_polygon(polygon)?,
        };

        debug!(
            cache_key = normalized.cache_key.as_ref().map(|k| k.as_str()),
            tiles = normalized.storage_tiles.len(),
            "Query normalized"
        );
        Ok(normalized)
    }

    fn normalize_radius(&self, query: &RadiusQuery) -> Result<NormalizedQuery, GeoError> {
        let center = geo::sanitize(query.latitude, query.longitude)?;
        let bucket = RadiusBucket::for_radius(query.radius_km);
        let bucket_cell = grid::point_to_cell(center, self.bucket_resolution)?;
        let cache_key = CacheKey::new(self.bucket_resolution(), bucket_cell, bucket);

        Ok(NormalizedQuery {
            shape: Shape::Circle {
                center,
                radius_km: query.radius_km,
            },
            cache_key: Some(cache_key),
            storage_tiles: grid::disk_to_cells(center, query.radius_km, self.storage_resolution),
        })
    }

    fn normalize_polygon(&self, query: &PolygonQuery) -> Result<NormalizedQuery, GeoError> {
        let ring = query
            .coordinates
            .iter()
            .map(|pair| GeoPoint::from_lon_lat(*pair))
            .collect::<Result<Vec<_>, _>>()?;
        let ring = geo::close_ring(ring);
        let storage_tiles =
            grid::polygon_to_cells(&ring, self.storage_resolution, Containment::Centroid)?;

        Ok(NormalizedQuery {
            shape: Shape::Polygon { ring },
            cache_key: None,
            storage_tiles,
        })
    }
}
