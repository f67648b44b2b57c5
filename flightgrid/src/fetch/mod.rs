//! Tile fetch engine.
//!
//! Resolves every storage tile a query needs and merges the per-tile records
//! into one list.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      TileFetchEngine                          │
//! │                                                               │
//! │  tiles ──► buffered(min(max_concurrency, tiles))              │
//! │                 │                                             │
//! │                 ▼                                             │
//! │          ┌─────────────┐                                      │
//! │          │ Tile Cache  │──► Hit ──► reuse records             │
//! │          └──────┬──────┘                                      │
//! │                 │ Miss                                        │
//! │                 ▼                                             │
//! │          ┌─────────────┐                                      │
//! │          │  In-Flight  │──► Pending ──► await shared fetch    │
//! │          │  Registry   │                                      │
//! │          └──────┬──────┘                                      │
//! │                 │ New                                         │
//! │                 ▼                                             │
//! │          ┌─────────────┐                                      │
//! │          │ TileSource  │──► upstream GET (with deadline)      │
//! │          └──────┬──────┘                                      │
//! │                 ▼                                             │
//! │    merge in tile order; failed tiles contribute nothing       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! A failed tile never fails the query. The exception is a configuration
//! problem (missing or rejected credentials), which no retry can fix and
//! which is therefore returned as a [`ConfigurationError`].

mod bucket;
mod registry;

pub use bucket::TimeBucket;
pub use registry::{InFlightRegistry, Registration, SharedFetch, TileResult};

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use moka::future::Cache;
use tracing::{debug, instrument, warn};

use crate::error::ConfigurationError;
use crate::grid::CellId;
use crate::record::Flight;
use crate::telemetry::NearbyMetrics;
use crate::upstream::{TileFetchError, TileSource};
use crate::BoxFuture;

/// Default bound on concurrent upstream calls per query.
pub const DEFAULT_MAX_CONCURRENCY: usize = 12;

/// Default time bucket width.
pub const DEFAULT_TIME_BUCKET: Duration = Duration::from_secs(10);

/// Default per-fetch deadline.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Default number of tile results kept in memory.
pub const DEFAULT_TILE_CACHE_CAPACITY: u64 = 4096;

/// One fetchable unit of upstream data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    pub tile: CellId,
    pub bucket: TimeBucket,
}

/// Engine tuning.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Upper bound on concurrent tile resolutions per query.
    pub max_concurrency: usize,
    /// Width of the time bucket.
    pub time_bucket: Duration,
    /// Deadline for a single upstream call; `None` waits indefinitely.
    pub fetch_timeout: Option<Duration>,
    /// Tile results kept for one bucket width; zero disables the cache.
    pub tile_cache_capacity: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            time_bucket: DEFAULT_TIME_BUCKET,
            fetch_timeout: Some(DEFAULT_FETCH_TIMEOUT),
            tile_cache_capacity: DEFAULT_TILE_CACHE_CAPACITY,
        }
    }
}

/// Concurrency-bounded, de-duplicated tile fetcher.
pub struct TileFetchEngine {
    source: Arc<dyn TileSource>,
    registry: InFlightRegistry,
    tile_cache: Option<Cache<TileKey, Arc<Vec<Flight>>>>,
    settings: FetchSettings,
    metrics: Arc<NearbyMetrics>,
}

impl TileFetchEngine {
    /// Creates an engine with its own registry.
    pub fn new(
        source: Arc<dyn TileSource>,
        settings: FetchSettings,
        metrics: Arc<NearbyMetrics>,
    ) -> Self {
        let tile_cache = (settings.tile_cache_capacity > 0).then(|| {
            Cache::builder()
                .max_capacity(settings.tile_cache_capacity)
                .time_to_live(settings.time_bucket.max(Duration::from_millis(1)))
                .build()
        });

        Self {
            source,
            registry: InFlightRegistry::new(),
            tile_cache,
            settings,
            metrics,
        }
    }

    /// Replaces the registry, e.g. to share one between engines.
    pub fn with_registry(mut self, registry: InFlightRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &InFlightRegistry {
        &self.registry
    }

    /// The bucket containing the current instant.
    pub fn current_bucket(&self) -> TimeBucket {
        TimeBucket::now(self.settings.time_bucket)
    }

    /// Fetches every tile for `bucket` and concatenates their records.
    ///
    /// Records appear in tile order; a record present in two tiles appears
    /// twice. Tiles that fail contribute nothing.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError`] when the source is not configured (checked
    /// before any fetch) or when the upstream rejects the credentials.
    #[instrument(skip(self, tiles), fields(tiles = tiles.len(), bucket = %bucket))]
    pub async fn fetch_and_merge(
        &self,
        tiles: &[CellId],
        bucket: TimeBucket,
    ) -> Result<Vec<Flight>, ConfigurationError> {
        self.source.ensure_ready()?;
        if tiles.is_empty() {
            return Ok(Vec::new());
        }

        let workers = self.settings.max_concurrency.clamp(1, tiles.len());
        let results: Vec<TileResult> = stream::iter(tiles.iter().copied())
            .map(|tile| self.resolve(TileKey { tile, bucket }))
            .buffered(workers)
            .collect()
            .await;

        let mut merged = Vec::new();
        for (tile, result) in tiles.iter().zip(results) {
            match result {
                Ok(records) => merged.extend(records.iter().cloned()),
                Err(e) => {
                    if let Some(config) = e.configuration_error() {
                        warn!(tile = %tile, error = %e, "Upstream rejected credentials");
                        return Err(config);
                    }
                    self.metrics.tile_failed();
                    warn!(tile = %tile, error = %e, "Tile fetch failed, contributing no records");
                }
            }
        }

        debug!(records = merged.len(), "Tiles merged");
        Ok(merged)
    }

    /// Resolves one tile from the tile cache, a pending fetch or the source.
    async fn resolve(&self, key: TileKey) -> TileResult {
        self.metrics.tile_requested();

        if let Some(cache) = &self.tile_cache {
            if let Some(records) = cache.get(&key).await {
                self.metrics.tile_cache_hit();
                return Ok(records);
            }
        }

        let (fetch, registration) = self
            .registry
            .join_or_start(key, || self.start_fetch(key));

        if registration == Registration::Joined {
            self.metrics.fetch_coalesced();
            debug!(tile = %key.tile, bucket = %key.bucket, "Joined in-flight fetch");
        }

        fetch.await
    }

    /// Builds the owned future performing one upstream call.
    fn start_fetch(&self, key: TileKey) -> BoxFuture<'static, TileResult> {
        let source = Arc::clone(&self.source);
        let metrics = Arc::clone(&self.metrics);
        let cache = self.tile_cache.clone();
        let deadline = self.settings.fetch_timeout;

        Box::pin(async move {
            // A fetch settling between our cache miss and registration has
            // already cached its result.
            if let Some(cache) = cache.as_ref() {
                if let Some(records) = cache.get(&key).await {
                    metrics.tile_cache_hit();
                    return Ok(records);
                }
            }

            metrics.upstream_fetch();
            let call = source.fetch_tile(key.tile, key.bucket);
            let records = match deadline {
                Some(limit) => tokio::time::timeout(limit, call)
                    .await
                    .unwrap_or(Err(TileFetchError::Timeout)),
                None => call.await,
            }?;

            let records = Arc::new(records);
            // Cache before the registry entry is released so a caller arriving
            // after settlement finds the result.
            if let Some(cache) = cache {
                cache.insert(key, Arc::clone(&records)).await;
            }
            Ok(records)
        })
    }
}
