//! WebSocket tunneling over a taken-over client connection.
//!
//! # Responsibilities
//! - Dial the backend (502 on failure, before any takeover)
//! - Claim the client connection (500 when the transport cannot hand it over)
//! - Replay the upgrade handshake to the backend and relay its response head
//! - Relay raw bytes once both sides have switched protocols
//!
//! # Design Decisions
//! - hyper owns the client socket until a response head is produced, so the
//!   backend handshake completes first and its head becomes our response
//! - A handshake failure after takeover closes the client connection without
//!   writing anything (abort marker)
//! - The relay runs on its own task; the request handler is already done

use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, HeaderValue, Response, StatusCode};
use bytes::Bytes;
use http_body_util::Empty;
use hyper::body::Incoming;
use hyper::client::conn::http1;
use hyper::upgrade::OnUpgrade;
use hyper_util::rt::TokioIo;

use crate::http::reply::{abort_connection, bad_gateway, plain_error};
use crate::proxy::dial::{BackendDialer, BackendStream};
use crate::proxy::relay::TunnelSession;
use crate::proxy::takeover::ConnectionTakeover;
use crate::proxy::TunnelError;
use crate::routing::Route;

/// Lifecycle of one tunnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelState {
    Dialing,
    Handshaking,
    Relaying,
    Closed,
}

fn transition(path: &str, state: TunnelState) {
    tracing::debug!(path = %path, state = ?state, "Tunnel state");
}

/// Tunnels WebSocket upgrade requests to a route's backend.
#[derive(Clone)]
pub struct WebSocketTunnel {
    dialer: BackendDialer,
}

impl WebSocketTunnel {
    pub fn new(dialer: BackendDialer) -> Self {
        Self { dialer }
    }

    pub async fn handle(&self, route: &Route, mut request: Request) -> Response<Body> {
        let path = request.uri().path().to_string();
        let upgrade_request = match build_upgrade_request(route, &request) {
            Ok(upgrade_request) => upgrade_request,
            Err(err) => {
                tracing::warn!(path = %path, error = %err, "Upgrade request could not be rebuilt");
                return bad_gateway(format!("Bad Gateway: {err}"));
            }
        };

        transition(&path, TunnelState::Dialing);
        let backend = match self.dialer.dial(route).await {
            Ok(stream) => stream,
            Err(err) => {
                tracing::warn!(
                    path = %path,
                    backend = %route.backend(),
                    error = %err,
                    "WebSocket backend unreachable"
                );
                transition(&path, TunnelState::Closed);
                return bad_gateway("Bad Gateway: failed to connect to backend");
            }
        };

        let client_upgrade = match request.take_over() {
            Ok(upgrade) => upgrade,
            Err(err) => {
                tracing::error!(path = %path, error = %err, "Connection takeover unavailable");
                transition(&path, TunnelState::Closed);
                return plain_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string());
            }
        };

        transition(&path, TunnelState::Handshaking);
        let backend_response = match handshake(upgrade_request, backend).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(path = %path, error = %err, "WebSocket handshake with backend failed");
                transition(&path, TunnelState::Closed);
                return abort_connection();
            }
        };

        relay_response(path, backend_response, client_upgrade)
    }
}

async fn handshake(
    upgrade_request: hyper::Request<Empty<Bytes>>,
    backend: BackendStream,
) -> Result<hyper::Response<Incoming>, TunnelError> {
    let (mut sender, connection) = http1::handshake(TokioIo::new(backend)).await?;
    tokio::spawn(async move {
        if let Err(err) = connection.with_upgrades().await {
            tracing::debug!(error = %err, "Backend connection ended with error");
        }
    });

    Ok(sender.send_request(upgrade_request).await?)
}

/// Same method, target and version; cloned headers with the upgrade normalized.
fn build_upgrade_request(
    route: &Route,
    request: &Request,
) -> Result<hyper::Request<Empty<Bytes>>, TunnelError> {
    let target = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let host = HeaderValue::from_str(&route.backend_authority()).map_err(axum::http::Error::from)?;

    let mut builder = hyper::Request::builder()
        .method(request.method().clone())
        .uri(target)
        .version(request.version());
    if let Some(headers) = builder.headers_mut() {
        *headers = request.headers().clone();
        headers.insert(header::HOST, host);
        headers.insert(header::CONNECTION, HeaderValue::from_static("Upgrade"));
        headers.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
    }
    Ok(builder.body(Empty::new())?)
}

fn relay_response(
    path: String,
    mut backend_response: hyper::Response<Incoming>,
    client_upgrade: OnUpgrade,
) -> Response<Body> {
    if backend_response.status() != StatusCode::SWITCHING_PROTOCOLS {
        tracing::debug!(
            path = %path,
            status = %backend_response.status(),
            "Backend declined the upgrade"
        );
        transition(&path, TunnelState::Closed);
        return backend_response.map(Body::new);
    }

    let backend_upgrade = hyper::upgrade::on(&mut backend_response);
    let (parts, _) = backend_response.into_parts();

    tokio::spawn(async move {
        match tokio::try_join!(client_upgrade, backend_upgrade) {
            Ok((client, backend)) => {
                transition(&path, TunnelState::Relaying);
                let first = TunnelSession::new(TokioIo::new(client), TokioIo::new(backend))
                    .run()
                    .await;
                tracing::debug!(path = %path, first_finished = %first, "Tunnel relay ended");
            }
            Err(err) => {
                tracing::debug!(path = %path, error = %err, "Upgrade did not complete");
            }
        }
        transition(&path, TunnelState::Closed);
    });

    Response::from_parts(parts, Body::empty())
}
