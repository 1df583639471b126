//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize into ServeSettings)
//!     → cli.rs (command line overrides)
//!     → validation.rs (semantic checks, route table, initial file)
//!     → ServeConfiguration / DispatchConfiguration (immutable)
//!     → shared via Arc with the server and the dispatch pipeline
//! ```
//!
//! # Design Decisions
//! - Config is immutable once resolved; there is no reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde, clap) from semantic checks

pub mod cli;
pub mod dispatch;
pub mod loader;
pub mod schema;
pub mod validation;

pub use cli::CliArgs;
pub use dispatch::{DispatchConfiguration, ProtocolVersion, ServeConfiguration};
pub use loader::{load_config, ConfigError};
pub use schema::{FileConfig, ServeSettings};
pub use validation::resolve;
