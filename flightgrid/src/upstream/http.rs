//! HTTP tile source backed by reqwest.
//!
//! Each tile is a `GET <tile_base_url>/<cell>` carrying two credential
//! headers. The request also asks intermediaries to cache the answer for one
//! time bucket, keyed by tile and bucket, so repeated requests across process
//! instances stay cheap at the transport layer.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CACHE_CONTROL};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use super::{TileFetchError, TileSource};
use crate::error::ConfigurationError;
use crate::fetch::TimeBucket;
use crate::grid::CellId;
use crate::record::{Flight, FlightResponse};
use crate::BoxFuture;

/// Default header carrying the client id.
pub const DEFAULT_CLIENT_ID_HEADER: &str = "X-Client-Id";

/// Default header carrying the client secret.
pub const DEFAULT_CLIENT_SECRET_HEADER: &str = "X-Client-Secret";

/// Header carrying the `(tile, bucket)` caching hint.
const CACHE_KEY_HEADER: &str = "X-Cache-Key";

/// Connection settings for the upstream tile service.
#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    pub tile_base_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub client_id_header: String,
    pub client_secret_header: String,
    /// Width of the time bucket; also the caching hint sent upstream.
    pub time_bucket: Duration,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            tile_base_url: None,
            client_id: None,
            client_secret: None,
            client_id_header: DEFAULT_CLIENT_ID_HEADER.to_string(),
            client_secret_header: DEFAULT_CLIENT_SECRET_HEADER.to_string(),
            time_bucket: Duration::from_secs(10),
        }
    }
}

/// Resolved base URL plus credential headers.
#[derive(Debug)]
struct Endpoint {
    base_url: String,
    headers: HeaderMap,
}

impl Endpoint {
    fn from_settings(settings: &UpstreamSettings) -> Result<Self, ConfigurationError> {
        let id = non_blank(&settings.client_id).ok_or(ConfigurationError::MissingCredentials)?;
        let secret =
            non_blank(&settings.client_secret).ok_or(ConfigurationError::MissingCredentials)?;
        let base_url =
            non_blank(&settings.tile_base_url).ok_or(ConfigurationError::MissingBaseUrl)?;

        let mut headers = HeaderMap::new();
        headers.insert(header_name(&settings.client_id_header)?, header_value(id)?);
        headers.insert(
            header_name(&settings.client_secret_header)?,
            header_value(secret)?,
        );

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            headers,
        })
    }

    fn tile_url(&self, tile: CellId) -> String {
        format!("{}/{}", self.base_url, tile)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn header_name(name: &str) -> Result<HeaderName, ConfigurationError> {
    HeaderName::try_from(name)
        .map_err(|e| ConfigurationError::Client(format!("invalid header name '{}': {}", name, e)))
}

fn header_value(value: &str) -> Result<HeaderValue, ConfigurationError> {
    let mut value = HeaderValue::try_from(value)
        .map_err(|e| ConfigurationError::Client(format!("invalid credential value: {}", e)))?;
    value.set_sensitive(true);
    Ok(value)
}

/// Tile source talking to the real upstream over HTTPS.
pub struct HttpTileSource {
    client: reqwest::Client,
    endpoint: Result<Endpoint, ConfigurationError>,
    cache_ttl_secs: u64,
}

impl HttpTileSource {
    /// Creates the source.
    ///
    /// Missing credentials do not fail construction; they are reported by
    /// [`TileSource::ensure_ready`] on every query so the problem stays
    /// visible to callers.
    pub fn new(settings: &UpstreamSettings) -> Result<Self, ConfigurationError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("flightgrid/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigurationError::Client(e.to_string()))?;

        Ok(Self::with_client(settings, client))
    }

    /// Creates the source around a preconfigured client.
    pub fn with_client(settings: &UpstreamSettings, client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: Endpoint::from_settings(settings),
            cache_ttl_secs: settings.time_bucket.as_secs().max(1),
        }
    }

    /// URL of `tile`, if the source is configured.
    pub fn tile_url(&self, tile: CellId) -> Option<String> {
        self.endpoint.as_ref().ok().map(|e| e.tile_url(tile))
    }
}

impl TileSource for HttpTileSource {
    fn ensure_ready(&self) -> Result<(), ConfigurationError> {
        self.endpoint.as_ref().map(|_| ()).map_err(|e| e.clone())
    }

    fn fetch_tile(
        &self,
        tile: CellId,
        bucket: TimeBucket,
    ) -> BoxFuture<'_, Result<Vec<Flight>, TileFetchError>> {
        Box::pin(async move {
            let endpoint = self
                .endpoint
                .as_ref()
                .map_err(|e| TileFetchError::NotConfigured(e.clone()))?;

            let response = self
                .client
                .get(endpoint.tile_url(tile))
                .headers(endpoint.headers.clone())
                .header(CACHE_CONTROL, format!("max-age={}", self.cache_ttl_secs))
                .header(CACHE_KEY_HEADER, format!("{}:{}", tile, bucket))
                .send()
                .await
                .map_err(transport_error)?;

            let status = response.status();
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                return Err(TileFetchError::Unauthorized(status.as_u16()));
            }
            if !status.is_success() {
                return Err(TileFetchError::Status(status.as_u16()));
            }

            let body = response.bytes().await.map_err(transport_error)?;
            let flights = parse_tile_body(&body)?;
            debug!(tile = %tile, flights = flights.len(), "Tile fetched");
            Ok(flights)
        })
    }

    fn name(&self) -> &str {
        "http"
    }
}

fn transport_error(e: reqwest::Error) -> TileFetchError {
    if e.is_timeout() {
        TileFetchError::Timeout
    } else {
        TileFetchError::Transport(e.to_string())
    }
}

/// Accepted tile body shapes, tried in order.
#[derive(Deserialize)]
#[serde(untagged)]
enum TileBody {
    Enveloped { result: FlightResponse },
    Plain(FlightResponse),
    Bare(Vec<Flight>),
}

/// Extracts the flight list from a tile body.
///
/// Accepts `{"flights": [...]}`, the enveloped `{"result": {"flights": [...]}}`
/// and a bare array. Any other JSON object yields no flights; non-JSON or a
/// wrongly typed list is [`TileFetchError::Malformed`].
pub fn parse_tile_body(body: &[u8]) -> Result<Vec<Flight>, TileFetchError> {
    match serde_json::from_slice::<TileBody>(body) {
        Ok(TileBody::Enveloped { result }) => Ok(result.flights),
        Ok(TileBody::Plain(response)) => Ok(response.flights),
        Ok(TileBody::Bare(flights)) => Ok(flights),
        Err(e) => Err(TileFetchError::Malformed(e.to_string())),
    }
}
