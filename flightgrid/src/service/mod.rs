//! Request pipeline.
//!
//! [`NearbyService`] ties the components together for one request:
//!
//! ```text
//!   FlightRequest ──► Query ──► Normalizer ──┬─ radius ──► edge LOOKUP ─► hit ─► SERVE
//!                                             │                │
//!                                             │              miss
//!                                             │                ▼
//!                                             │    fetch tiles ► shape filter ► STORE ─► respond
//!                                             │
//!                                             └─ polygon ─► fetch tiles ► shape filter ─► respond
//! ```
//!
//! Client input problems become 400 responses and configuration problems
//! become 502 responses; neither is ever stored at the edge.

mod envelope;

pub use envelope::{
    error_response, success_response, ErrorDetail, ResponseEnvelope, INTERNAL_ERROR_CODE,
};

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use crate::config::ConfigFile;
use crate::edge::{CachedResponse, EdgeResponseCache, MemoryEdgeStore};
use crate::error::NearbyError;
use crate::fetch::{TileFetchEngine, TimeBucket};
use crate::filter::apply_shape_filter;
use crate::normalize::{NormalizedQuery, Normalizer};
use crate::query::{Filters, FlightRequest};
use crate::record::Flight;
use crate::telemetry::{NearbyMetrics, TelemetrySnapshot};
use crate::upstream::{HttpTileSource, TileSource};

/// Responses share the edge cache's representation.
pub type ServiceResponse = CachedResponse;

/// One incoming nearby-flights request.
#[derive(Debug, Clone)]
pub struct NearbyRequest {
    /// Caller-visible path, folded into the edge cache identity.
    pub resource_path: String,
    pub body: FlightRequest,
    /// Value of the `If-None-Match` request header.
    pub if_none_match: Option<String>,
}

impl NearbyRequest {
    pub fn new(resource_path: impl Into<String>, body: FlightRequest) -> Self {
        Self {
            resource_path: resource_path.into(),
            body,
            if_none_match: None,
        }
    }

    pub fn with_if_none_match(mut self, etag: impl Into<String>) -> Self {
        self.if_none_match = Some(etag.into());
        self
    }
}

/// A response plus the background edge store it started, if any.
pub struct Handled {
    pub response: ServiceResponse,
    /// Awaiting this is optional; the store completes regardless.
    pub store: Option<JoinHandle<()>>,
}

/// Answers nearby-flights requests.
pub struct NearbyService {
    normalizer: Normalizer,
    engine: TileFetchEngine,
    edge: EdgeResponseCache,
    metrics: Arc<NearbyMetrics>,
    time_bucket: Duration,
}

impl NearbyService {
    pub fn new(
        normalizer: Normalizer,
        engine: TileFetchEngine,
        edge: EdgeResponseCache,
        metrics: Arc<NearbyMetrics>,
        time_bucket: Duration,
    ) -> Self {
        Self {
            normalizer,
            engine,
            edge,
            metrics,
            time_bucket,
        }
    }

    /// Builds a service talking to the configured HTTP upstream.
    ///
    /// Missing credentials do not fail construction; they surface as 502
    /// responses per request.
    pub fn from_config(config: &ConfigFile) -> Result<Self, NearbyError> {
        let source = HttpTileSource::new(&config.upstream_settings())?;
        Self::from_config_with_source(config, Arc::new(source))
    }

    /// Builds a service over an arbitrary tile source.
    pub fn from_config_with_source(
        config: &ConfigFile,
        source: Arc<dyn TileSource>,
    ) -> Result<Self, NearbyError> {
        let metrics = Arc::new(NearbyMetrics::new());
        let normalizer = config.normalizer()?;
        let engine = TileFetchEngine::new(source, config.fetch_settings(), Arc::clone(&metrics));
        let edge = EdgeResponseCache::new(
            Arc::new(MemoryEdgeStore::new(config.cache.max_entries)),
            config.edge_settings(),
            Arc::clone(&metrics),
        );
        Ok(Self::new(normalizer, engine, edge, metrics, config.time_bucket()))
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn metrics(&self) -> &Arc<NearbyMetrics> {
        &self.metrics
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.metrics.snapshot()
    }

    /// Answers `request`.
    pub async fn handle(&self, request: &NearbyRequest) -> ServiceResponse {
        self.serve(request).await.response
    }

    /// Answers `request` and hands back the background edge store.
    #[instrument(skip_all, fields(path = %request.resource_path))]
    pub async fn serve(&self, request: &NearbyRequest) -> Handled {
        match self.try_serve(request).await {
            Ok(handled) => {
                self.metrics.query_served();
                handled
            }
            Err(e) => {
                self.metrics.query_failed();
                if e.status() >= 500 {
                    warn!(error = %e, "Nearby query failed");
                } else {
                    debug!(error = %e, "Rejected nearby query");
                }
                Handled {
                    response: error_response(&e),
                    store: None,
                }
            }
        }
    }

    async fn try_serve(&self, request: &NearbyRequest) -> Result<Handled, NearbyError> {
        let (query, filters) = request.body.to_query()?;
        let normalized = self.normalizer.normalize(&query)?;
        let if_none_match = request.if_none_match.as_deref();

        let Some(cache_key) = normalized.cache_key.clone() else {
            // Polygon queries always recompute.
            let bucket = self.engine.current_bucket();
            let flights = self.compute(&normalized, &filters, bucket).await?;
            return Ok(Handled {
                response: success_response(flights),
                store: None,
            });
        };

        if let Some(hit) = self.edge.lookup(&cache_key, &request.resource_path).await {
            let response = self.edge.conditional(&hit, if_none_match).unwrap_or(hit);
            return Ok(Handled {
                response,
                store: None,
            });
        }

        let bucket = self.engine.current_bucket();
        let flights = self.compute(&normalized, &filters, bucket).await?;
        let response = self.edge.prepare(
            success_response(flights),
            bucket.start_millis(self.time_bucket),
        );
        let store = self
            .edge
            .store(&cache_key, &request.resource_path, response.clone());
        let response = self
            .edge
            .conditional(&response, if_none_match)
            .unwrap_or(response);

        Ok(Handled { response, store })
    }

    async fn compute(
        &self,
        normalized: &NormalizedQuery,
        filters: &Filters,
        bucket: TimeBucket,
    ) -> Result<Vec<Flight>, NearbyError> {
        let records = self
            .engine
            .fetch_and_merge(&normalized.storage_tiles, bucket)
            .await?;
        let fetched = records.len();
        let flights = apply_shape_filter(records, &normalized.shape, filters);
        debug!(fetched, kept = flights.len(), "Shape filter applied");
        Ok(flights)
    }
}
