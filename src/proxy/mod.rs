//! Reverse-proxy subsystem.
//!
//! # Data Flow
//! ```text
//! Request (path matched a route)
//!     → dispatcher.rs (route lookup, upgrade detection)
//!         ├─ plain request → forward.rs (reqwest, streamed both ways)
//!         └─ WebSocket upgrade → tunnel.rs
//!                 → dial.rs (TCP or TLS, 10s connect timeout)
//!                 → takeover.rs (claim the client connection)
//!                 → backend handshake (hyper http1 client)
//!                 → relay.rs (raw bytes, both directions)
//!
//! Tunnel States:
//!     Dialing → Handshaking → Relaying → Closed
//! ```
//!
//! # Design Decisions
//! - Single attempt per request, no retries
//! - Backend failures are scoped to the request (502), never the listener
//! - Frames are relayed as opaque bytes

use thiserror::Error;

pub mod dial;
pub mod dispatcher;
pub mod forward;
pub mod relay;
pub mod takeover;
pub mod tunnel;

pub use dial::{BackendDialer, BackendStream, CONNECT_TIMEOUT};
pub use dispatcher::ProxyDispatcher;
pub use forward::Forwarder;
pub use relay::{Direction, TunnelSession, RELAY_BUFFER_SIZE};
pub use takeover::ConnectionTakeover;
pub use tunnel::{TunnelState, WebSocketTunnel};

/// Per-request tunnel failures.
#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("failed to connect to backend {authority}: {source}")]
    Dial {
        authority: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out connecting to backend {authority}")]
    Timeout { authority: String },

    #[error("invalid TLS server name {0:?}")]
    ServerName(String),

    #[error("WebSocket hijacking not supported")]
    TakeoverUnsupported,

    #[error("backend handshake failed: {0}")]
    Handshake(#[from] hyper::Error),

    #[error("invalid upgrade request: {0}")]
    Request(#[from] axum::http::Error),
}
