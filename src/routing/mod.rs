//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path, headers)
//!     → router.rs (first route whose prefix matches the path)
//!     → matcher.rs (prefix test, WebSocket upgrade detection)
//!     → Return: matched Route or None
//!
//! Route Compilation (at startup):
//!     "<prefix>=<backend-url>" mappings
//!     → Validate each mapping
//!     → Reject duplicate prefixes
//!     → Stable sort by descending prefix length
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route
//! - First match wins (longest prefix first)

pub mod matcher;
pub mod router;

pub use matcher::{is_websocket_upgrade, Matcher, PathPrefixMatcher, WebSocketUpgradeMatcher};
pub use router::{Route, RouteError, RouteTable};
