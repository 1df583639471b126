//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (subscriber setup, console or JSON)
//!     → access.rs (one record per request, written when the body ends)
//!
//! Consumers:
//!     → stdout (human console or line-delimited JSON)
//! ```
//!
//! # Design Decisions
//! - Structured fields on every event for machine parsing
//! - Access records follow the common log format in console mode

pub mod access;
pub mod logging;

pub use access::{ObservedBody, RequestSummary, ResponseObservation};
pub use logging::{init_logging, LogFormat};
