//! Radius buckets and cache keys.

use std::fmt;

use crate::grid::CellId;

/// Canonical radii in kilometres, ascending.
pub const RADIUS_BUCKETS: [RadiusBucket; 5] = [
    RadiusBucket::Km5,
    RadiusBucket::Km10,
    RadiusBucket::Km25,
    RadiusBucket::Km50,
    RadiusBucket::Km100,
];

/// A requested radius rounded up to one of a few canonical values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RadiusBucket {
    Km5,
    Km10,
    Km25,
    Km50,
    Km100,
}

impl RadiusBucket {
    /// Smallest bucket that is at least `radius_km`.
    ///
    /// Zero, negative and NaN radii map to the smallest bucket; radii above
    /// every bucket map to the largest.
    pub fn for_radius(radius_km: f64) -> Self {
        let r = radius_km.max(0.0);
        RADIUS_BUCKETS
            .iter()
            .copied()
            .find(|b| r <= b.km() as f64)
            .unwrap_or(RadiusBucket::Km100)
    }

    /// Bucket radius in kilometres.
    pub fn km(self) -> u32 {
        match self {
            RadiusBucket::Km5 => 5,
            RadiusBucket::Km10 => 10,
            RadiusBucket::Km25 => 25,
            RadiusBucket::Km50 => 50,
            RadiusBucket::Km100 => 100,
        }
    }
}

/// Canonical identity of a radius query for caching purposes.
///
/// Format: `near/h3/{resolution}/{cell}/r{bucket}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(resolution: u8, cell: CellId, bucket: RadiusBucket) -> Self {
        Self(format!("near/h3/{}/{}/r{}", resolution, cell, bucket.km()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
