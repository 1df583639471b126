//! Static file server with path-prefix reverse proxying and WebSocket tunnels.

pub mod config;
pub mod handlers;
pub mod http;
pub mod lifecycle;
pub mod markdown;
pub mod net;
pub mod observability;
pub mod proxy;
pub mod routing;

pub use config::{DispatchConfiguration, ServeConfiguration};
pub use http::{serve, HttpServer, ServerError};
pub use lifecycle::Shutdown;
