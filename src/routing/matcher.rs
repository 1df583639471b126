//! Request match conditions.
//!
//! # Responsibilities
//! - Match the request path against a literal prefix (case-sensitive)
//! - Detect WebSocket upgrade requests (case-insensitive headers)
//!
//! # Design Decisions
//! - Prefix matching is a plain string prefix test, not path-segment aware
//! - No regex to guarantee O(n) matching

use axum::body::Body;
use axum::http::{header, HeaderMap, Request};

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, req: &Request<Body>) -> bool;
}

/// Matches the request path prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn matches_path(&self, path: &str) -> bool {
        path.starts_with(&self.prefix)
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        self.matches_path(req.uri().path())
    }
}

/// Matches `Connection: upgrade` + `Upgrade: websocket` requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketUpgradeMatcher;

impl Matcher for WebSocketUpgradeMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        is_websocket_upgrade(req.headers())
    }
}

/// True when `Connection` contains the `upgrade` token and `Upgrade` is `websocket`.
///
/// Only the first value of each header is considered.
pub fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    let connection_upgrade = headers
        .get(header::CONNECTION)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_ascii_lowercase().contains("upgrade"))
        .unwrap_or(false);

    let upgrade_websocket = headers
        .get(header::UPGRADE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().eq_ignore_ascii_case("websocket"))
        .unwrap_or(false);

    connection_upgrade && upgrade_websocket
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(headers: &[(&str, &str)]) -> Request<Body> {
        let mut builder = Request::builder().uri("http://example.com/ws");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::default()).unwrap()
    }

    #[test]
    fn test_path_matcher() {
        let matcher = PathPrefixMatcher::new("/api");

        let req1 = Request::builder()
            .uri("http://example.com/api/v1")
            .body(Body::default())
            .unwrap();
        assert!(matcher.matches(&req1));

        let req2 = Request::builder()
            .uri("http://example.com/images")
            .body(Body::default())
            .unwrap();
        assert!(!matcher.matches(&req2));

        // Case-sensitive.
        assert!(!matcher.matches_path("/API/v1"));
    }

    #[test]
    fn test_websocket_upgrade_detection() {
        let matcher = WebSocketUpgradeMatcher;

        assert!(matcher.matches(&request(&[("Connection", "Upgrade"), ("Upgrade", "websocket")])));
        assert!(matcher.matches(&request(&[
            ("Connection", "keep-alive, UPGRADE"),
            ("Upgrade", "WebSocket")
        ])));

        assert!(!matcher.matches(&request(&[("Upgrade", "websocket")])));
        assert!(!matcher.matches(&request(&[("Connection", "Upgrade")])));
        assert!(!matcher.matches(&request(&[("Connection", "Upgrade"), ("Upgrade", "h2c")])));
        assert!(!matcher.matches(&request(&[])));
    }
}
