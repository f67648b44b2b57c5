//! Edge cache storage backends.
//!
//! The edge store is an eventually consistent key-value store of complete
//! responses with per-entry TTLs. [`MemoryEdgeStore`] keeps entries in
//! process memory; other backends implement [`EdgeStore`].

use std::fmt;
use std::time::{Duration, Instant};

use moka::future::Cache;
use moka::Expiry;
use thiserror::Error;

use super::CachedResponse;
use crate::normalize::CacheKey;
use crate::BoxFuture;

/// Default number of responses kept by [`MemoryEdgeStore`].
pub const DEFAULT_MAX_ENTRIES: u64 = 10_000;

/// Errors from an edge store. Always recovered by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EdgeStoreError {
    /// The store could not be reached.
    #[error("edge store unavailable: {0}")]
    Unavailable(String),

    /// The store refused the entry.
    #[error("edge store rejected entry: {0}")]
    Rejected(String),
}

/// Identity of one edge cache entry.
///
/// Folds the partition hint and the caller-visible resource path into the
/// query's cache key, so different endpoints or tenants sharing geometry
/// never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EdgeKey(String);

impl EdgeKey {
    pub fn new(partition: Option<&str>, cache_key: &CacheKey, resource_path: &str) -> Self {
        let partition = partition.map(str::trim).filter(|p| !p.is_empty()).unwrap_or("-");
        let path = resource_path.trim();
        let separator = if path.starts_with('/') { "" } else { "/" };
        Self(format!(
            "https://edge-cache/{}/{}{}{}",
            partition, cache_key, separator, path
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key-value store of cached responses.
///
/// Dyn-compatible so the response cache can hold an `Arc<dyn EdgeStore>`
/// and write from a background task.
pub trait EdgeStore: Send + Sync {
    /// Returns the live entry for `key`, if any.
    fn lookup(&self, key: &EdgeKey)
        -> BoxFuture<'_, Result<Option<CachedResponse>, EdgeStoreError>>;

    /// Stores `response` under `key` for `ttl`.
    fn put(
        &self,
        key: EdgeKey,
        response: CachedResponse,
        ttl: Duration,
    ) -> BoxFuture<'_, Result<(), EdgeStoreError>>;
}

#[derive(Clone)]
struct StoredResponse {
    response: CachedResponse,
    ttl: Duration,
}

/// Expires each entry after its own TTL.
struct PerEntryTtl;

impl Expiry<EdgeKey, StoredResponse> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &EdgeKey,
        value: &StoredResponse,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &EdgeKey,
        value: &StoredResponse,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process edge store backed by moka.
pub struct MemoryEdgeStore {
    cache: Cache<EdgeKey, StoredResponse>,
}

impl Default for MemoryEdgeStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl MemoryEdgeStore {
    /// Creates a store holding at most `max_entries` responses.
    pub fn new(max_entries: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .expire_after(PerEntryTtl)
            .build();
        Self { cache }
    }

    /// Number of live entries (approximate until maintenance runs).
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl EdgeStore for MemoryEdgeStore {
    fn lookup(
        &self,
        key: &EdgeKey,
    ) -> BoxFuture<'_, Result<Option<CachedResponse>, EdgeStoreError>> {
        let key = key.clone();
        Box::pin(async move { Ok(self.cache.get(&key).await.map(|s| s.response)) })
    }

    fn put(
        &self,
        key: EdgeKey,
        response: CachedResponse,
        ttl: Duration,
    ) -> BoxFuture<'_, Result<(), EdgeStoreError>> {
        Box::pin(async move {
            if ttl.is_zero() {
                return Err(EdgeStoreError::Rejected("zero TTL".to_string()));
            }
            self.cache.insert(key, StoredResponse { response, ttl }).await;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::CellId;
    use crate::normalize::RadiusBucket;

    fn cache_key() -> CacheKey {
        let cell: CellId = "85283473fffffff".parse().unwrap();
        CacheKey::new(5, cell, RadiusBucket::Km25)
    }

    #[test]
    fn test_edge_key_folds_partition_and_path() {
        let key = EdgeKey::new(Some("nearby-v1"), &cache_key(), "/v1/flights");
        assert_eq!(
            key.as_str(),
            "https://edge-cache/nearby-v1/near/h3/5/85283473fffffff/r25/v1/flights"
        );
    }

    #[test]
    fn test_edge_key_distinguishes_paths_and_partitions() {
        let k = cache_key();
        assert_ne!(EdgeKey::new(None, &k, "/a"), EdgeKey::new(None, &k, "/b"));
        assert_ne!(
            EdgeKey::new(Some("p1"), &k, "/a"),
            EdgeKey::new(Some("p2"), &k, "/a")
        );
        assert_eq!(EdgeKey::new(Some(" "), &k, "/a"), EdgeKey::new(None, &k, "/a"));
        assert_eq!(EdgeKey::new(None, &k, "a"), EdgeKey::new(None, &k, "/a"));
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryEdgeStore::default();
        let key = EdgeKey::new(None, &cache_key(), "/x");
        assert!(store.lookup(&key).await.unwrap().is_none());

        let response = CachedResponse::json(200, "{}");
        store
            .put(key.clone(), response.clone(), Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(store.lookup(&key).await.unwrap(), Some(response));
    }

    #[tokio::test]
    async fn test_memory_store_expires_entries() {
        let store = MemoryEdgeStore::default();
        let key = EdgeKey::new(None, &cache_key(), "/x");
        store
            .put(key.clone(), CachedResponse::json(200, "{}"), Duration::from_millis(50))
            .await
            .unwrap();
        assert!(store.lookup(&key).await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(store.lookup(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_zero_ttl_rejected() {
        let store = MemoryEdgeStore::default();
        let key = EdgeKey::new(None, &cache_key(), "/x");
        let err = store
            .put(key, CachedResponse::json(200, "{}"), Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, EdgeStoreError::Rejected(_)));
    }
}
