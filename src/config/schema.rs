//! Configuration schema definitions.
//!
//! This module defines the on-disk configuration structure. Every field has
//! a default so an empty file (or no file) is a valid configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::observability::LogFormat;

/// Root of the TOML configuration file.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct FileConfig {
    /// Serving settings (`[serve]` table).
    pub serve: ServeSettings,
}

/// Unresolved serving settings, as read from the file and command line.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServeSettings {
    /// Interface to bind; empty means all interfaces.
    pub bind_address: String,

    /// Listening port.
    pub port: u16,

    /// Directory to serve.
    pub directory: PathBuf,

    /// `HTTP/1.0` or `HTTP/1.1`.
    pub protocol: String,

    /// PEM certificate chain for HTTPS.
    pub tls_cert: Option<PathBuf>,

    /// PEM private key for HTTPS.
    pub tls_key: Option<PathBuf>,

    /// Render Markdown files as HTML.
    pub markdown: bool,

    /// Browse mode: serve files as-is and list directories.
    pub browse: bool,

    /// Reject directory requests instead of listing them.
    pub disable_directory_listing: bool,

    /// Access log format.
    pub logging_type: LogFormat,

    /// File served for `/`; its parent directory replaces `directory`.
    pub initial_file: Option<String>,

    /// `"<prefix>=<backend-url>"` mappings; entries may be comma-delimited.
    pub proxy: Vec<String>,

    /// Legacy single-route prefix.
    pub proxy_path: String,

    /// Legacy single-route backend URL.
    pub proxy_backend: String,

    /// Maximum concurrent client connections (backpressure).
    pub max_connections: usize,
}

impl Default for ServeSettings {
    fn default() -> Self {
        Self {
            bind_address: String::new(),
            port: default_port(),
            directory: PathBuf::from("."),
            protocol: "HTTP/1.1".to_string(),
            tls_cert: None,
            tls_key: None,
            markdown: true,
            browse: false,
            disable_directory_listing: false,
            logging_type: LogFormat::default(),
            initial_file: None,
            proxy: Vec::new(),
            proxy_path: String::new(),
            proxy_backend: String::new(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_port() -> u16 {
    8000
}

fn default_max_connections() -> usize {
    1024
}
