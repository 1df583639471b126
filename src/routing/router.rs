//! Proxy route table.
//!
//! # Responsibilities
//! - Parse `"<prefix>=<backend-url>"` mappings (or the legacy prefix/backend pair)
//! - Validate prefixes and backend URLs
//! - Reject duplicate prefixes
//! - Order routes so a first-match scan finds the most specific prefix
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Stable sort by descending prefix length: equal lengths keep input order
//! - O(n) prefix scan (acceptable for typical route counts)
//! - Explicit `None` on no match rather than a silent default

use std::collections::HashSet;

use thiserror::Error;
use url::Url;

use crate::routing::matcher::PathPrefixMatcher;

/// Separator between the path prefix and the backend URL in a mapping.
pub const MAPPING_SEPARATOR: char = '=';

const PATH_PREFIX_START: char = '/';
const SCHEME_SEPARATOR: &str = "://";

/// Route table construction failures.
///
/// `InvalidRoute` concerns a single mapping; `DuplicatePrefix` is the
/// cross-mapping kind raised once every mapping parsed on its own.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("proxy.route.invalid: {reason} (mapping {mapping:?})")]
    InvalidRoute { mapping: String, reason: &'static str },

    #[error("proxy.routes.invalid: duplicate path prefix {prefix}")]
    DuplicatePrefix { prefix: String },
}

impl RouteError {
    fn invalid(mapping: &str, reason: &'static str) -> Self {
        Self::InvalidRoute {
            mapping: mapping.to_string(),
            reason,
        }
    }
}

/// A single path-prefix to backend mapping.
#[derive(Debug, Clone)]
pub struct Route {
    matcher: PathPrefixMatcher,
    backend: Url,
}

impl Route {
    /// Validate and build a route from an already-split prefix and backend URL.
    pub fn new(path_prefix: &str, backend_url: &str) -> Result<Self, RouteError> {
        let mapping = format!("{path_prefix}{MAPPING_SEPARATOR}{backend_url}");
        if path_prefix.is_empty() {
            return Err(RouteError::invalid(&mapping, "empty path prefix"));
        }
        if !path_prefix.starts_with(PATH_PREFIX_START) {
            return Err(RouteError::invalid(&mapping, "path prefix must start with /"));
        }
        let backend = parse_backend_url(&mapping, backend_url)?;
        Ok(Self {
            matcher: PathPrefixMatcher::new(path_prefix),
            backend,
        })
    }

    /// The literal path prefix this route claims.
    pub fn path_prefix(&self) -> &str {
        self.matcher.prefix()
    }

    /// The validated backend URL.
    pub fn backend(&self) -> &Url {
        &self.backend
    }

    /// `host[:port]` of the backend, as written in the mapping.
    pub fn backend_authority(&self) -> String {
        let host = self.backend.host_str().unwrap_or_default();
        match self.backend.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    /// Whether the backend must be reached over TLS.
    pub fn uses_tls(&self) -> bool {
        self.backend.scheme() == "https"
    }

    /// Literal string-prefix test against a request path.
    pub fn matches(&self, path: &str) -> bool {
        self.matcher.matches_path(path)
    }
}

/// Ordered, read-only set of proxy routes.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// An empty table: proxying disabled.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a table from `"<prefix>=<backend-url>"` mappings.
    pub fn build<S: AsRef<str>>(mappings: &[S]) -> Result<Self, RouteError> {
        let mut routes = Vec::with_capacity(mappings.len());
        for mapping in mappings {
            routes.push(parse_mapping(mapping.as_ref())?);
        }

        let mut seen = HashSet::with_capacity(routes.len());
        for route in &routes {
            if !seen.insert(route.path_prefix()) {
                return Err(RouteError::DuplicatePrefix {
                    prefix: route.path_prefix().to_string(),
                });
            }
        }

        // Vec::sort_by is stable.
        routes.sort_by(|left, right| right.path_prefix().len().cmp(&left.path_prefix().len()));
        Ok(Self { routes })
    }

    /// Build a table from the legacy single prefix/backend pair.
    ///
    /// Both empty disables proxying; exactly one empty is an error.
    pub fn from_legacy(path_prefix: &str, backend_url: &str) -> Result<Self, RouteError> {
        let path_prefix = path_prefix.trim();
        let backend_url = backend_url.trim();
        if path_prefix.is_empty() && backend_url.is_empty() {
            return Ok(Self::empty());
        }
        let route = Route::new(path_prefix, backend_url)?;
        Ok(Self { routes: vec![route] })
    }

    /// First route whose prefix is a literal prefix of `path`.
    pub fn match_path(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.matches(path))
    }

    pub fn count(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }
}

fn parse_mapping(raw: &str) -> Result<Route, RouteError> {
    let mapping = raw.trim();
    if mapping.is_empty() {
        return Err(RouteError::invalid(raw, "empty mapping"));
    }
    let Some((prefix, backend)) = mapping.split_once(MAPPING_SEPARATOR) else {
        return Err(RouteError::invalid(
            mapping,
            "mapping must be in /from=http://backend form",
        ));
    };
    Route::new(prefix.trim(), backend.trim())
}

fn parse_backend_url(mapping: &str, backend_url: &str) -> Result<Url, RouteError> {
    if backend_url.trim().is_empty() {
        return Err(RouteError::invalid(mapping, "empty backend url"));
    }

    // The WHATWG parser forgives extra slashes and empty ports, so the raw
    // authority is checked first to catch inputs like `http://http://host`.
    let Some((_, rest)) = backend_url.split_once(SCHEME_SEPARATOR) else {
        return Err(RouteError::invalid(mapping, "backend url must include host"));
    };
    let raw_authority = rest
        .split(|c| c == '/' || c == '?' || c == '#')
        .next()
        .unwrap_or_default();
    if raw_authority.is_empty() {
        return Err(RouteError::invalid(mapping, "backend url must include host"));
    }
    if raw_authority.ends_with(':') {
        return Err(RouteError::invalid(mapping, "backend url must include valid host"));
    }

    let parsed = Url::parse(backend_url)
        .map_err(|_| RouteError::invalid(mapping, "backend url does not parse"))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(RouteError::invalid(mapping, "backend url must use http or https"));
    }
    match parsed.host_str() {
        Some(host) if !host.is_empty() && !host.contains("//") => Ok(parsed),
        _ => Err(RouteError::invalid(mapping, "backend url must include valid host")),
    }
}
