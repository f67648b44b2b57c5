//! JSON response envelope.

use serde::{Deserialize, Serialize};

use crate::edge::{CachedResponse, HEADER_CACHE_CONTROL};
use crate::error::NearbyError;
use crate::record::{Flight, FlightResponse};

/// Code used when a response body cannot be rendered.
pub const INTERNAL_ERROR_CODE: u32 = 5000;

/// One entry of the `errors` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: u32,
    pub message: String,
}

/// `{"success":true,"result":{...}}` or `{"success":false,"errors":[...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<FlightResponse>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorDetail>,
}

impl ResponseEnvelope {
    pub fn success(flights: Vec<Flight>) -> Self {
        Self {
            success: true,
            result: Some(FlightResponse { flights }),
            errors: Vec::new(),
        }
    }

    pub fn failure(code: u32, message: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            errors: vec![ErrorDetail {
                code,
                message: message.into(),
            }],
        }
    }

    /// Parses a response body.
    pub fn from_body(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// Flights of a successful envelope.
    pub fn flights(&self) -> &[Flight] {
        self.result.as_ref().map(|r| r.flights.as_slice()).unwrap_or(&[])
    }

    fn into_response(self, status: u16) -> CachedResponse {
        match serde_json::to_vec(&self) {
            Ok(body) => CachedResponse::json(status, body),
            Err(e) => CachedResponse::json(
                500,
                format!(
                    "{{\"success\":false,\"errors\":[{{\"code\":{},\"message\":\"{}\"}}]}}",
                    INTERNAL_ERROR_CODE,
                    e.to_string().replace('"', "'")
                ),
            ),
        }
    }
}

/// 200 response listing `flights`.
pub fn success_response(flights: Vec<Flight>) -> CachedResponse {
    ResponseEnvelope::success(flights).into_response(200)
}

/// Error response for `error`. Never cacheable.
pub fn error_response(error: &NearbyError) -> CachedResponse {
    ResponseEnvelope::failure(error.code(), error.to_string())
        .into_response(error.status())
        .with_header(HEADER_CACHE_CONTROL, "no-store")
}
