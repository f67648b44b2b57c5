//! Atomic counters shared across the pipeline.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use super::TelemetrySnapshot;

/// Counters for one process.
///
/// Every method is a single relaxed atomic increment, so the struct can be
/// shared behind an `Arc` and updated from any task.
#[derive(Debug)]
pub struct NearbyMetrics {
    started: Instant,

    // Edge response cache
    edge_hits: AtomicU64,
    edge_misses: AtomicU64,
    edge_not_modified: AtomicU64,
    edge_stores: AtomicU64,
    edge_store_failures: AtomicU64,

    // Tile fetch engine
    tiles_requested: AtomicU64,
    tile_cache_hits: AtomicU64,
    upstream_fetches: AtomicU64,
    coalesced_fetches: AtomicU64,
    tile_failures: AtomicU64,

    // Service
    queries_served: AtomicU64,
    queries_failed: AtomicU64,
}

impl Default for NearbyMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl NearbyMetrics {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            edge_hits: AtomicU64::new(0),
            edge_misses: AtomicU64::new(0),
            edge_not_modified: AtomicU64::new(0),
            edge_stores: AtomicU64::new(0),
            edge_store_failures: AtomicU64::new(0),
            tiles_requested: AtomicU64::new(0),
            tile_cache_hits: AtomicU64::new(0),
            upstream_fetches: AtomicU64::new(0),
            coalesced_fetches: AtomicU64::new(0),
            tile_failures: AtomicU64::new(0),
            queries_served: AtomicU64::new(0),
            queries_failed: AtomicU64::new(0),
        }
    }

    pub fn edge_hit(&self) {
        self.edge_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn edge_miss(&self) {
        self.edge_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// A conditional request was answered with 304.
    pub fn edge_not_modified(&self) {
        self.edge_not_modified.fetch_add(1, Ordering::Relaxed);
    }

    pub fn edge_stored(&self) {
        self.edge_stores.fetch_add(1, Ordering::Relaxed);
    }

    pub fn edge_store_failed(&self) {
        self.edge_store_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// One tile was asked for by a query, however it was resolved.
    pub fn tile_requested(&self) {
        self.tiles_requested.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tile_cache_hit(&self) {
        self.tile_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// An upstream call was actually issued.
    pub fn upstream_fetch(&self) {
        self.upstream_fetches.fetch_add(1, Ordering::Relaxed);
    }

    /// A tile request joined a fetch already in flight.
    pub fn fetch_coalesced(&self) {
        self.coalesced_fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tile_failed(&self) {
        self.tile_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn query_served(&self) {
        self.queries_served.fetch_add(1, Ordering::Relaxed);
    }

    pub fn query_failed(&self) {
        self.queries_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            taken_at: chrono::Utc::now(),
            uptime_secs: self.started.elapsed().as_secs(),
            edge_hits: self.edge_hits.load(Ordering::Relaxed),
            edge_misses: self.edge_misses.load(Ordering::Relaxed),
            edge_not_modified: self.edge_not_modified.load(Ordering::Relaxed),
            edge_stores: self.edge_stores.load(Ordering::Relaxed),
            edge_store_failures: self.edge_store_failures.load(Ordering::Relaxed),
            tiles_requested: self.tiles_requested.load(Ordering::Relaxed),
            tile_cache_hits: self.tile_cache_hits.load(Ordering::Relaxed),
            upstream_fetches: self.upstream_fetches.load(Ordering::Relaxed),
            coalesced_fetches: self.coalesced_fetches.load(Ordering::Relaxed),
            tile_failures: self.tile_failures.load(Ordering::Relaxed),
            queries_served: self.queries_served.load(Ordering::Relaxed),
            queries_failed: self.queries_failed.load(Ordering::Relaxed),
        }
    }
}
