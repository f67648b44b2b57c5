//! Point-in-time view of the pipeline counters.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Copy of [`super::NearbyMetrics`] at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    pub taken_at: DateTime<Utc>,
    pub uptime_secs: u64,

    pub edge_hits: u64,
    pub edge_misses: u64,
    pub edge_not_modified: u64,
    pub edge_stores: u64,
    pub edge_store_failures: u64,

    pub tiles_requested: u64,
    pub tile_cache_hits: u64,
    pub upstream_fetches: u64,
    pub coalesced_fetches: u64,
    pub tile_failures: u64,

    pub queries_served: u64,
    pub queries_failed: u64,
}

impl TelemetrySnapshot {
    /// Fraction of edge lookups that hit, in [0, 1].
    pub fn edge_hit_rate(&self) -> f64 {
        ratio(self.edge_hits, self.edge_hits + self.edge_misses)
    }

    /// Fraction of tile requests answered without a new upstream call.
    pub fn tile_reuse_rate(&self) -> f64 {
        let reused = self.tile_cache_hits + self.coalesced_fetches;
        ratio(reused, self.tiles_requested)
    }
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

impl fmt::Display for TelemetrySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Queries:   {} served, {} failed", self.queries_served, self.queries_failed)?;
        writeln!(
            f,
            "Edge:      {} hits, {} misses ({:.1}% hit), {} not modified, {} stored, {} store failures",
            self.edge_hits,
            self.edge_misses,
            self.edge_hit_rate() * 100.0,
            self.edge_not_modified,
            self.edge_stores,
            self.edge_store_failures
        )?;
        write!(
            f,
            "Tiles:     {} requested, {} upstream, {} coalesced, {} cached, {} failed",
            self.tiles_requested,
            self.upstream_fetches,
            self.coalesced_fetches,
            self.tile_cache_hits,
            self.tile_failures
        )
    }
}
