//! Resolved, immutable serving configuration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use crate::net::tls::TlsMaterial;
use crate::observability::LogFormat;
use crate::routing::RouteTable;

/// HTTP protocol version the server speaks to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolVersion {
    /// Keep-alive off, `Connection: close` on every response.
    Http10,
    #[default]
    Http11,
}

impl ProtocolVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolVersion::Http10 => "HTTP/1.0",
            ProtocolVersion::Http11 => "HTTP/1.1",
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProtocolVersion {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "HTTP/1.0" => Ok(ProtocolVersion::Http10),
            "HTTP/1.1" => Ok(ProtocolVersion::Http11),
            other => Err(format!("unsupported protocol {other}")),
        }
    }
}

/// Everything the dispatch pipeline needs, fixed for the serving lifetime.
#[derive(Debug, Clone)]
pub struct DispatchConfiguration {
    /// Absolute directory being served.
    pub directory: PathBuf,
    pub enable_markdown: bool,
    pub browse_directories: bool,
    pub disable_directory_listing: bool,
    /// Request path (relative to the directory) substituted for `/`.
    pub initial_file: Option<String>,
    pub routes: Arc<RouteTable>,
    pub tls: Option<TlsMaterial>,
    pub protocol: ProtocolVersion,
}

/// Listener settings plus the dispatch configuration.
#[derive(Debug, Clone)]
pub struct ServeConfiguration {
    pub bind_address: String,
    pub port: u16,
    pub max_connections: usize,
    pub log_format: LogFormat,
    pub dispatch: DispatchConfiguration,
}

impl ServeConfiguration {
    /// Host to bind; empty means every interface.
    pub fn listen_host(&self) -> &str {
        if self.bind_address.is_empty() {
            "0.0.0.0"
        } else {
            &self.bind_address
        }
    }

    /// Host shown in the startup URL.
    pub fn display_host(&self) -> &str {
        match self.bind_address.as_str() {
            "" | "0.0.0.0" | "127.0.0.1" => "localhost",
            other => other,
        }
    }

    pub fn scheme(&self) -> &'static str {
        if self.dispatch.tls.is_some() {
            "https"
        } else {
            "http"
        }
    }

    /// URL announced at startup for the given bound port.
    pub fn display_url(&self, port: u16) -> String {
        let host = self.display_host();
        if host.contains(':') {
            format!("{}://[{}]:{}/", self.scheme(), host, port)
        } else {
            format!("{}://{}:{}/", self.scheme(), host, port)
        }
    }
}
