//! Request descriptor handed to the router.

use axum::http::{HeaderMap, HeaderName};

/// Minimal view of an inbound request: its path and its headers.
///
/// The router takes ownership, rewrites `uri`, sets the service header, and
/// hands the value back. Header names are case-insensitive by construction.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RouteRequest {
    pub uri: String,
    pub headers: HeaderMap,
}

impl RouteRequest {
    pub fn new(uri: impl Into<String>, headers: HeaderMap) -> Self {
        Self {
            uri: uri.into(),
            headers,
        }
    }

    /// Request with no headers.
    pub fn from_uri(uri: impl Into<String>) -> Self {
        Self::new(uri, HeaderMap::new())
    }

    /// Read a header as UTF-8, if present and valid.
    pub fn header(&self, name: &HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}
