//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Select console or JSON output
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the built-in default filter
//! - Dependency noise (hyper, rustls) is kept at warn

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt as subscriber_fmt, layer::SubscriberExt, EnvFilter};

const DEFAULT_FILTER: &str = "staticgate=info,hyper=warn,rustls=warn";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines, access records in common log format.
    #[default]
    Console,
    /// One JSON object per event.
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Console => f.write_str("console"),
            LogFormat::Json => f.write_str("json"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "console" => Ok(LogFormat::Console),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unsupported logging type {other}")),
        }
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(format: LogFormat) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    match format {
        LogFormat::Console => tracing_subscriber::registry()
            .with(filter)
            .with(subscriber_fmt::layer().with_target(false))
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(subscriber_fmt::layer().json().flatten_event(true))
            .try_init(),
    }
}
