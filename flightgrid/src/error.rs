//! Crate-level error types.

use thiserror::Error;

use crate::geo::GeoError;

/// The upstream integration is misconfigured, so no query can succeed.
///
/// Kept distinct from per-tile failures so operators can tell "no flights
/// nearby" apart from "the integration is broken".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// Client id or secret is missing or empty.
    #[error("upstream credentials are not configured")]
    MissingCredentials,

    /// No tile base URL configured.
    #[error("upstream tile base URL is not configured")]
    MissingBaseUrl,

    /// The upstream refused the configured credentials.
    #[error("upstream rejected credentials (HTTP {status})")]
    Rejected { status: u16 },

    /// The HTTP client could not be built.
    #[error("failed to create HTTP client: {0}")]
    Client(String),
}

/// Errors surfaced by the request pipeline.
#[derive(Debug, Error)]
pub enum NearbyError {
    /// Coordinates could not be resolved (client input error).
    #[error(transparent)]
    Geo(#[from] GeoError),

    /// The request body is structurally invalid (client input error).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Upstream dependency failure caused by configuration.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl NearbyError {
    /// HTTP-style status code for this error.
    pub fn status(&self) -> u16 {
        match self {
            NearbyError::Geo(_) | NearbyError::InvalidRequest(_) => 400,
            NearbyError::Configuration(_) => 502,
        }
    }

    /// Stable numeric code for the error envelope.
    pub fn code(&self) -> u32 {
        match self {
            NearbyError::Geo(_) => 1002,
            NearbyError::InvalidRequest(_) => 1003,
            NearbyError::Configuration(_) => 7002,
        }
    }
}
