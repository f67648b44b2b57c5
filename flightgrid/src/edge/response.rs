//! Cached response representation and entity tags.

use bytes::Bytes;
use sha2::{Digest, Sha256};

pub const HEADER_CACHE_CONTROL: &str = "Cache-Control";
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub const HEADER_ETAG: &str = "ETag";

/// Number of hex characters of the body digest kept in an ETag.
const ETAG_DIGEST_CHARS: usize = 12;

/// A complete response as stored in and served from the edge cache.
///
/// Header names compare case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl CachedResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// A JSON response.
    pub fn json(status: u16, body: impl Into<Bytes>) -> Self {
        Self::new(status, body).with_header(HEADER_CONTENT_TYPE, "application/json")
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Sets `name`, replacing any existing value.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn etag(&self) -> Option<&str> {
        self.header(HEADER_ETAG)
    }

    /// Bodyless 304 carrying this response's validators.
    pub fn not_modified(&self) -> Self {
        let mut out = CachedResponse::new(304, Bytes::new());
        for name in [HEADER_ETAG, HEADER_CACHE_CONTROL] {
            if let Some(value) = self.header(name) {
                out.set_header(name, value);
            }
        }
        out
    }
}

/// Strong entity tag for `body` produced during the window starting at
/// `tick_millis`: `"<tick>-<first 12 hex chars of SHA-256(body)>"`.
pub fn compute_etag(body: &[u8], tick_millis: i64) -> String {
    let digest = Sha256::digest(body);
    let hex: String = digest
        .iter()
        .take(ETAG_DIGEST_CHARS / 2)
        .map(|b| format!("{:02x}", b))
        .collect();
    format!("\"{}-{}\"", tick_millis, hex)
}

/// Whether an `If-None-Match` header value matches `etag`.
///
/// Accepts `*`, comma-separated lists and weak validators.
pub fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    let wanted = opaque_tag(etag);
    if_none_match.split(',').map(str::trim).any(|candidate| {
        candidate == "*" || (!candidate.is_empty() && opaque_tag(candidate) == wanted)
    })
}

fn opaque_tag(tag: &str) -> &str {
    let tag = tag.trim();
    let tag = tag.strip_prefix("W/").unwrap_or(tag);
    tag.trim_matches('"')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_etag_format() {
        let tag = compute_etag(b"{}", 1_700_000_000_000);
        assert!(tag.starts_with("\"1700000000000-"));
        assert!(tag.ends_with('"'));
        // quotes + tick + dash + 12 hex
        assert_eq!(tag.len(), 2 + 13 + 1 + 12);
    }

    #[test]
    fn test_etag_depends_on_body_and_tick() {
        assert_eq!(compute_etag(b"a", 1), compute_etag(b"a", 1));
        assert_ne!(compute_etag(b"a", 1), compute_etag(b"b", 1));
        assert_ne!(compute_etag(b"a", 1), compute_etag(b"a", 2));
    }

    #[test]
    fn test_etag_matching() {
        let tag = compute_etag(b"x", 10);
        assert!(etag_matches(&tag, &tag));
        assert!(etag_matches(tag.trim_matches('"'), &tag));
        assert!(etag_matches(&format!("W/{}", tag), &tag));
        assert!(etag_matches(&format!("\"other\", {}", tag), &tag));
        assert!(etag_matches("*", &tag));
        assert!(!etag_matches("\"other\"", &tag));
        assert!(!etag_matches("", &tag));
    }

    #[test]
    fn test_headers_case_insensitive() {
        let mut r = CachedResponse::json(200, "{}");
        assert_eq!(r.header("content-type"), Some("application/json"));
        r.set_header("content-TYPE", "text/plain");
        assert_eq!(r.headers.len(), 1);
        assert_eq!(r.header(HEADER_CONTENT_TYPE), Some("text/plain"));
    }

    #[test]
    fn test_not_modified_keeps_validators_only() {
        let r = CachedResponse::json(200, "{\"a\":1}")
            .with_header(HEADER_ETAG, "\"t-1\"")
            .with_header(HEADER_CACHE_CONTROL, "public");
        let nm = r.not_modified();
        assert_eq!(nm.status, 304);
        assert!(nm.body.is_empty());
        assert_eq!(nm.etag(), Some("\"t-1\""));
        assert_eq!(nm.header(HEADER_CACHE_CONTROL), Some("public"));
        assert!(nm.header(HEADER_CONTENT_TYPE).is_none());
    }

    #[test]
    fn test_success_range() {
        assert!(CachedResponse::new(200, "").is_success());
        assert!(CachedResponse::new(204, "").is_success());
        assert!(!CachedResponse::new(304, "").is_success());
        assert!(!CachedResponse::new(502, "").is_success());
    }
}
