//! Edge response cache.
//!
//! Sits in front of the whole pipeline for radius queries:
//!
//! ```text
//!   LOOKUP ──► hit ──► SERVE (verbatim, or 304 when the validator matches)
//!     │
//!     └──► miss ──► COMPUTE ──► STORE (2xx only, background) ──► respond
//! ```
//!
//! Entries are keyed by [`EdgeKey`], which folds the partition hint and the
//! resource path into the query's [`CacheKey`]. Store failures never reach
//! the caller: a failed lookup is a miss and a failed store is logged and
//! counted.

mod response;
mod store;

pub use response::{
    compute_etag, etag_matches, CachedResponse, HEADER_CACHE_CONTROL, HEADER_CONTENT_TYPE,
    HEADER_ETAG,
};
pub use store::{EdgeKey, EdgeStore, EdgeStoreError, MemoryEdgeStore, DEFAULT_MAX_ENTRIES};

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::normalize::CacheKey;
use crate::telemetry::NearbyMetrics;

/// Default edge retention.
pub const DEFAULT_EDGE_TTL: Duration = Duration::from_secs(10);

/// Default partition hint.
pub const DEFAULT_PARTITION_HINT: &str = "nearby-v1";

/// Edge cache tuning.
#[derive(Debug, Clone)]
pub struct EdgeSettings {
    /// How long the edge store keeps a response.
    pub ttl: Duration,
    /// Freshness window advertised to browsers and intermediaries.
    pub client_max_age: Duration,
    /// Namespace separating tenants or endpoint families.
    pub partition_hint: Option<String>,
}

impl Default for EdgeSettings {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_EDGE_TTL,
            client_max_age: Duration::from_secs(10),
            partition_hint: Some(DEFAULT_PARTITION_HINT.to_string()),
        }
    }
}

/// Front of the edge store implementing lookup, conditional serve and
/// best-effort background stores.
pub struct EdgeResponseCache {
    store: Arc<dyn EdgeStore>,
    settings: EdgeSettings,
    metrics: Arc<NearbyMetrics>,
}

impl EdgeResponseCache {
    pub fn new(store: Arc<dyn EdgeStore>, settings: EdgeSettings, metrics: Arc<NearbyMetrics>) -> Self {
        Self {
            store,
            settings,
            metrics,
        }
    }

    pub fn settings(&self) -> &EdgeSettings {
        &self.settings
    }

    /// Edge identity for `cache_key` served at `resource_path`.
    pub fn edge_key(&self, cache_key: &CacheKey, resource_path: &str) -> EdgeKey {
        EdgeKey::new(self.settings.partition_hint.as_deref(), cache_key, resource_path)
    }

    /// Looks up a stored response. Store errors count as a miss.
    pub async fn lookup(&self, cache_key: &CacheKey, resource_path: &str) -> Option<CachedResponse> {
        let key = self.edge_key(cache_key, resource_path);
        match self.store.lookup(&key).await {
            Ok(Some(response)) => {
                self.metrics.edge_hit();
                debug!(cache_key = %cache_key, path = resource_path, "Edge cache HIT");
                Some(response)
            }
            Ok(None) => {
                self.metrics.edge_miss();
                debug!(cache_key = %cache_key, path = resource_path, "Edge cache MISS");
                None
            }
            Err(e) => {
                self.metrics.edge_miss();
                warn!(error = %e, key = %key, "Edge cache lookup failed, treating as miss");
                None
            }
        }
    }

    /// Stamps caching metadata onto a freshly computed response.
    ///
    /// Adds an ETag derived from the body and `tick_millis` (the start of the
    /// current time bucket) unless one is present, and a `Cache-Control`
    /// header telling clients the short freshness window and shared caches
    /// the edge TTL.
    pub fn prepare(&self, mut response: CachedResponse, tick_millis: i64) -> CachedResponse {
        if response.etag().is_none() {
            let etag = compute_etag(&response.body, tick_millis);
            response.set_header(HEADER_ETAG, etag);
        }
        response.set_header(
            HEADER_CACHE_CONTROL,
            format!(
                "public, max-age={}, s-maxage={}",
                self.settings.client_max_age.as_secs(),
                self.settings.ttl.as_secs()
            ),
        );
        response
    }

    /// Stores `response` in the background for the configured TTL.
    ///
    /// Non-2xx responses are never stored and yield `None`. The returned
    /// handle may be dropped; the store completes regardless.
    pub fn store(
        &self,
        cache_key: &CacheKey,
        resource_path: &str,
        response: CachedResponse,
    ) -> Option<JoinHandle<()>> {
        self.store_for(cache_key, resource_path, response, self.settings.ttl)
    }

    /// Like [`store`](Self::store) with an explicit retention.
    pub fn store_for(
        &self,
        cache_key: &CacheKey,
        resource_path: &str,
        response: CachedResponse,
        ttl: Duration,
    ) -> Option<JoinHandle<()>> {
        if !response.is_success() {
            debug!(cache_key = %cache_key, status = response.status, "Not storing unsuccessful response");
            return None;
        }

        let key = self.edge_key(cache_key, resource_path);
        let store = Arc::clone(&self.store);
        let metrics = Arc::clone(&self.metrics);

        Some(tokio::spawn(async move {
            match store.put(key.clone(), response, ttl).await {
                Ok(()) => {
                    metrics.edge_stored();
                    debug!(key = %key, ttl_secs = ttl.as_secs(), "Edge cache STORE");
                }
                Err(e) => {
                    metrics.edge_store_failed();
                    warn!(error = %e, key = %key, "Edge cache store failed");
                }
            }
        }))
    }

    /// The 304 answer for `response` when `if_none_match` matches its ETag.
    pub fn conditional(
        &self,
        response: &CachedResponse,
        if_none_match: Option<&str>,
    ) -> Option<CachedResponse> {
        let etag = response.etag()?;
        if !response.is_success() || !etag_matches(if_none_match?, etag) {
            return None;
        }
        self.metrics.edge_not_modified();
        Some(response.not_modified())
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::grid::CellId;
    use crate::normalize::RadiusBucket;
    use crate::BoxFuture;

    /// Edge store whose every call fails.
    pub struct FailingEdgeStore;

    impl EdgeStore for FailingEdgeStore {
        fn lookup(
            &self,
            _key: &EdgeKey,
        ) -> BoxFuture<'_, Result<Option<CachedResponse>, EdgeStoreError>> {
            Box::pin(async { Err::<Option<CachedResponse>, _>(unavailable()) })
        }

        fn put(
            &self,
            _key: EdgeKey,
            _response: CachedResponse,
            _ttl: Duration,
        ) -> BoxFuture<'_, Result<(), EdgeStoreError>> {
            Box::pin(async { Err::<(), _>(unavailable()) })
        }
    }

    fn unavailable() -> EdgeStoreError {
        EdgeStoreError::Unavailable("down".to_string())
    }

    fn key() -> CacheKey {
        let cell: CellId = "85283473fffffff".parse().unwrap();
        CacheKey::new(5, cell, RadiusBucket::Km10)
    }

    fn cache(store: Arc<dyn EdgeStore>) -> (EdgeResponseCache, Arc<NearbyMetrics>) {
        let metrics = Arc::new(NearbyMetrics::new());
        (
            EdgeResponseCache::new(store, EdgeSettings::default(), metrics.clone()),
            metrics,
        )
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let (edge, metrics) = cache(Arc::new(MemoryEdgeStore::default()));
        assert!(edge.lookup(&key(), "/near").await.is_none());

        let response = edge.prepare(CachedResponse::json(200, "{\"ok\":1}"), 1000);
        edge.store(&key(), "/near", response.clone())
            .unwrap()
            .await
            .unwrap();

        assert_eq!(edge.lookup(&key(), "/near").await, Some(response));
        let s = metrics.snapshot();
        assert_eq!((s.edge_hits, s.edge_misses, s.edge_stores), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_different_path_is_a_miss() {
        let (edge, _) = cache(Arc::new(MemoryEdgeStore::default()));
        let response = edge.prepare(CachedResponse::json(200, "{}"), 0);
        edge.store(&key(), "/a", response).unwrap().await.unwrap();
        assert!(edge.lookup(&key(), "/b").await.is_none());
    }

    #[tokio::test]
    async fn test_unsuccessful_responses_not_stored() {
        let (edge, metrics) = cache(Arc::new(MemoryEdgeStore::default()));
        assert!(edge
            .store(&key(), "/near", CachedResponse::json(502, "{}"))
            .is_none());
        assert!(edge.lookup(&key(), "/near").await.is_none());
        assert_eq!(metrics.snapshot().edge_stores, 0);
    }

    #[tokio::test]
    async fn test_store_failures_are_swallowed() {
        let (edge, metrics) = cache(Arc::new(FailingEdgeStore));
        assert!(edge.lookup(&key(), "/near").await.is_none());

        let handle = edge
            .store(&key(), "/near", CachedResponse::json(200, "{}"))
            .unwrap();
        handle.await.unwrap();
        let s = metrics.snapshot();
        assert_eq!(s.edge_store_failures, 1);
        assert_eq!(s.edge_misses, 1);
    }

    #[test]
    fn test_prepare_stamps_headers() {
        let metrics = Arc::new(NearbyMetrics::new());
        let edge = EdgeResponseCache::new(
            Arc::new(MemoryEdgeStore::default()),
            EdgeSettings {
                ttl: Duration::from_secs(30),
                client_max_age: Duration::from_secs(10),
                partition_hint: None,
            },
            metrics,
        );
        let r = edge.prepare(CachedResponse::json(200, "{}"), 5000);
        assert_eq!(
            r.header(HEADER_CACHE_CONTROL),
            Some("public, max-age=10, s-maxage=30")
        );
        assert!(r.etag().unwrap().starts_with("\"5000-"));
    }

    #[test]
    fn test_prepare_keeps_existing_etag() {
        let (edge, _) = cache(Arc::new(MemoryEdgeStore::default()));
        let r = edge.prepare(
            CachedResponse::json(200, "{}").with_header(HEADER_ETAG, "\"mine\""),
            1,
        );
        assert_eq!(r.etag(), Some("\"mine\""));
    }

    #[test]
    fn test_conditional_response() {
        let (edge, metrics) = cache(Arc::new(MemoryEdgeStore::default()));
        let r = edge.prepare(CachedResponse::json(200, "{}"), 1);
        let etag = r.etag().unwrap().to_string();

        let nm = edge.conditional(&r, Some(&etag)).unwrap();
        assert_eq!(nm.status, 304);
        assert!(nm.body.is_empty());
        assert!(edge.conditional(&r, Some("\"stale\"")).is_none());
        assert!(edge.conditional(&r, None).is_none());
        assert_eq!(metrics.snapshot().edge_not_modified, 1);
    }
}
