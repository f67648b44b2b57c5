//! Upstream tile source.
//!
//! The upstream partitions live flight data by storage-resolution cell. It is
//! treated as a black box returning a list of [`Flight`] records per cell. The
//! [`TileSource`] trait is the seam between the fetch engine and the network,
//! so tests can substitute counting stubs for the HTTP client.

mod http;

pub use http::{
    parse_tile_body, HttpTileSource, UpstreamSettings, DEFAULT_CLIENT_ID_HEADER,
    DEFAULT_CLIENT_SECRET_HEADER,
};

use thiserror::Error;

use crate::error::ConfigurationError;
use crate::fetch::TimeBucket;
use crate::grid::CellId;
use crate::record::Flight;
use crate::BoxFuture;

/// Failure fetching a single tile.
///
/// `Clone` so that one outcome can be handed to every caller coalesced onto
/// the same in-flight fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TileFetchError {
    /// Connection, TLS or body-read failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status other than an authentication failure.
    #[error("upstream returned HTTP {0}")]
    Status(u16),

    /// Body was not JSON or not a recognised flight list.
    #[error("malformed tile body: {0}")]
    Malformed(String),

    /// The per-fetch deadline expired.
    #[error("tile fetch timed out")]
    Timeout,

    /// The upstream refused our credentials.
    #[error("upstream rejected credentials (HTTP {0})")]
    Unauthorized(u16),

    /// The source cannot issue requests at all.
    #[error(transparent)]
    NotConfigured(ConfigurationError),
}

impl TileFetchError {
    /// The configuration problem behind this failure, if it is one.
    ///
    /// Such failures affect every tile and every query, so they are promoted
    /// to a hard error instead of degrading to an empty tile.
    pub fn configuration_error(&self) -> Option<ConfigurationError> {
        match self {
            TileFetchError::Unauthorized(status) => {
                Some(ConfigurationError::Rejected { status: *status })
            }
            TileFetchError::NotConfigured(e) => Some(e.clone()),
            _ => None,
        }
    }
}

/// Source of per-tile flight records.
///
/// Dyn-compatible: async methods return [`BoxFuture`] so the engine can hold
/// an `Arc<dyn TileSource>`.
pub trait TileSource: Send + Sync {
    /// Checks that the source is configured well enough to issue requests.
    ///
    /// Called once per query before any tile is fetched.
    fn ensure_ready(&self) -> Result<(), ConfigurationError>;

    /// Fetches the records for `tile` in time window `bucket`.
    fn fetch_tile(
        &self,
        tile: CellId,
        bucket: TimeBucket,
    ) -> BoxFuture<'_, Result<Vec<Flight>, TileFetchError>>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

#[cfg(test)]
pub mod tests {
    //! Stub tile sources shared by unit tests.

    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Scripted tile source that counts calls and tracks concurrency.
    #[derive(Default)]
    pub struct StubTileSource {
        pub tiles: HashMap<CellId, Vec<Flight>>,
        pub failures: HashMap<CellId, TileFetchError>,
        pub not_ready: Option<ConfigurationError>,
        pub delay: Option<Duration>,
        calls: Mutex<HashMap<CellId, usize>>,
        total: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl StubTileSource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_tile(mut self, tile: CellId, flights: Vec<Flight>) -> Self {
            self.tiles.insert(tile, flights);
            self
        }

        pub fn with_failure(mut self, tile: CellId, error: TileFetchError) -> Self {
            self.failures.insert(tile, error);
            self
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn not_ready(mut self, error: ConfigurationError) -> Self {
            self.not_ready = Some(error);
            self
        }

        pub fn total_calls(&self) -> usize {
            self.total.load(Ordering::SeqCst)
        }

        pub fn calls_for(&self, tile: CellId) -> usize {
            self.calls.lock().unwrap().get(&tile).copied().unwrap_or(0)
        }

        pub fn max_in_flight(&self) -> usize {
            self.max_in_flight.load(Ordering::SeqCst)
        }
    }

    impl TileSource for StubTileSource {
        fn ensure_ready(&self) -> Result<(), ConfigurationError> {
            match &self.not_ready {
                Some(e) => Err(e.clone()),
                None => Ok(()),
            }
        }

        fn fetch_tile(
            &self,
            tile: CellId,
            _bucket: TimeBucket,
        ) -> BoxFuture<'_, Result<Vec<Flight>, TileFetchError>> {
            Box::pin(async move {
                self.total.fetch_add(1, Ordering::SeqCst);
                *self.calls.lock().unwrap().entry(tile).or_default() += 1;

                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_in_flight.fetch_max(now, Ordering::SeqCst);
                if let Some(delay) = self.delay {
                    tokio::time::sleep(delay).await;
                }
                self.in_flight.fetch_sub(1, Ordering::SeqCst);

                if let Some(e) = self.failures.get(&tile) {
                    return Err(e.clone());
                }
                Ok(self.tiles.get(&tile).cloned().unwrap_or_default())
            })
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    #[test]
    fn test_unauthorized_is_configuration_error() {
        assert_eq!(
            TileFetchError::Unauthorized(403).configuration_error(),
            Some(ConfigurationError::Rejected { status: 403 })
        );
    }

    #[test]
    fn test_transient_errors_are_not_configuration_errors() {
        assert!(TileFetchError::Status(503).configuration_error().is_none());
        assert!(TileFetchError::Timeout.configuration_error().is_none());
        assert!(TileFetchError::Malformed("x".into())
            .configuration_error()
            .is_none());
    }

    #[test]
    fn test_not_configured_passes_through() {
        let err = TileFetchError::NotConfigured(ConfigurationError::MissingCredentials);
        assert_eq!(
            err.configuration_error(),
            Some(ConfigurationError::MissingCredentials)
        );
    }
}
