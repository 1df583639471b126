//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (hyper connection, upgrades enabled)
//!     → middleware (access log) → tower-http (trace, Server header)
//!     → pipeline.rs (ordered stages, static files last)
//!     → reply.rs (shared error bodies, abort marker)
//!     → Send to client, or drop the connection when aborted
//! ```

pub mod middleware;
pub mod pipeline;
pub mod reply;
pub mod server;

pub use pipeline::{DispatchPipeline, Interceptor, Outcome};
pub use server::{serve, HttpServer, ServerError};
