//! Proxy dispatch stage.
//!
//! # Responsibilities
//! - Scan the route table for the first prefix matching the decoded request path
//! - No match: pass the request on unchanged
//! - Match + WebSocket upgrade: hand off to the tunnel
//! - Match otherwise: forward as a plain reverse-proxy call

use std::sync::Arc;

use axum::extract::Request;
use futures_util::future::BoxFuture;
use percent_encoding::percent_decode_str;

use crate::http::pipeline::{Interceptor, Outcome};
use crate::net::tls::TlsError;
use crate::proxy::{BackendDialer, Forwarder, WebSocketTunnel};
use crate::routing::{Matcher, RouteTable, WebSocketUpgradeMatcher};

/// Dispatches requests whose path matches a proxy route.
pub struct ProxyDispatcher {
    routes: Arc<RouteTable>,
    forwarder: Forwarder,
    tunnel: WebSocketTunnel,
}

/// Failures building the dispatcher's outbound clients.
#[derive(Debug, thiserror::Error)]
pub enum DispatcherError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error(transparent)]
    Tls(#[from] TlsError),
}

impl ProxyDispatcher {
    pub fn new(routes: Arc<RouteTable>) -> Result<Self, DispatcherError> {
        Ok(Self::with_parts(
            routes,
            Forwarder::new()?,
            WebSocketTunnel::new(BackendDialer::new()?),
        ))
    }

    pub fn with_parts(routes: Arc<RouteTable>, forwarder: Forwarder, tunnel: WebSocketTunnel) -> Self {
        Self {
            routes,
            forwarder,
            tunnel,
        }
    }
}

impl Interceptor for ProxyDispatcher {
    fn name(&self) -> &'static str {
        "proxy"
    }

    fn intercept<'a>(&'a self, request: Request) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            // Prefixes are compared against the decoded path; the raw one is forwarded.
            let path = percent_decode_str(request.uri().path())
                .decode_utf8_lossy()
                .into_owned();
            let Some(route) = self.routes.match_path(&path) else {
                return Outcome::Continue(request);
            };

            tracing::debug!(
                path = %path,
                prefix = %route.path_prefix(),
                backend = %route.backend(),
                "Proxy route matched"
            );

            if WebSocketUpgradeMatcher.matches(&request) {
                Outcome::Handled(self.tunnel.handle(route, request).await)
            } else {
                Outcome::Handled(self.forwarder.forward(route, request).await)
            }
        })
    }
}
