//! FlightGrid - nearby live-flight queries over a hexagonal grid
//!
//! Answers "which flights are within R km of P" (or inside a polygon) by
//! quantizing the query onto an H3 grid, fetching per-cell live data from an
//! upstream source with in-process de-duplication, filtering the union down to
//! the exact shape, and caching whole responses at the edge so bursts of
//! nearly identical queries cost one upstream round.
//!
//! # Example
//!
//! ```ignore
//! use flightgrid::config::ConfigFile;
//! use flightgrid::query::FlightRequest;
//! use flightgrid::service::{NearbyRequest, NearbyService};
//!
//! let service = NearbyService::from_config(&ConfigFile::load()?)?;
//! let request = NearbyRequest::new("/v1/nearby", FlightRequest::radius(34.05, -118.24, 25.0));
//! let response = service.handle(&request).await;
//! ```

use std::future::Future;
use std::pin::Pin;

pub mod config;
pub mod edge;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod geo;
pub mod grid;
pub mod logging;
pub mod normalize;
pub mod query;
pub mod record;
pub mod service;
pub mod telemetry;
pub mod upstream;

pub use error::{ConfigurationError, NearbyError};
pub use geo::{GeoError, GeoPoint};
pub use normalize::{CacheKey, NormalizedQuery, Normalizer, RadiusBucket};
pub use query::{Filters, FlightRequest, Query, Shape};
pub use record::{Flight, FlightResponse};
pub use service::{NearbyRequest, NearbyService, ServiceResponse};

/// Boxed future used by the dyn-compatible async traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
