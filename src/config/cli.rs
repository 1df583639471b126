//! Command line arguments.
//!
//! Flags override values from the configuration file; anything left unset
//! keeps the file (or default) value.

use std::path::PathBuf;

use clap::Parser;

use crate::config::schema::ServeSettings;
use crate::observability::LogFormat;

#[derive(Debug, Parser)]
#[command(name = "staticgate")]
#[command(about = "Static file server with path-prefix reverse proxying and WebSocket tunnels", long_about = None)]
pub struct CliArgs {
    /// Port number, or an .html/.htm/.md file to serve for `/`
    pub target: Option<String>,

    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind (default: all interfaces)
    #[arg(long)]
    pub bind: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Directory to serve
    #[arg(short, long)]
    pub directory: Option<PathBuf>,

    /// HTTP/1.0 or HTTP/1.1
    #[arg(long)]
    pub protocol: Option<String>,

    /// PEM certificate chain for HTTPS
    #[arg(long)]
    pub tls_cert: Option<PathBuf>,

    /// PEM private key for HTTPS
    #[arg(long)]
    pub tls_key: Option<PathBuf>,

    /// Serve Markdown files as-is
    #[arg(long)]
    pub no_md: bool,

    /// Serve files directly and list directories
    #[arg(long)]
    pub browse: bool,

    /// Reject directory requests with 403
    #[arg(long, env = "STATICGATE_DISABLE_DIR_INDEX")]
    pub disable_dir_index: bool,

    /// Log output format
    #[arg(long, value_enum)]
    pub logging_type: Option<LogFormat>,

    /// Proxy mapping `<prefix>=<backend-url>` (repeatable, comma-delimited)
    #[arg(long)]
    pub proxy: Vec<String>,

    /// Backend URL for the single-route form
    #[arg(long)]
    pub proxy_backend: Option<String>,

    /// Path prefix for the single-route form
    #[arg(long)]
    pub proxy_path: Option<String>,
}

impl CliArgs {
    /// Layer the command line over file settings.
    pub fn apply(self, settings: &mut ServeSettings) {
        if let Some(bind) = self.bind {
            settings.bind_address = bind;
        }
        if let Some(port) = self.port {
            settings.port = port;
        }
        if let Some(directory) = self.directory {
            settings.directory = directory;
        }
        if let Some(protocol) = self.protocol {
            settings.protocol = protocol;
        }
        if let Some(cert) = self.tls_cert {
            settings.tls_cert = Some(cert);
        }
        if let Some(key) = self.tls_key {
            settings.tls_key = Some(key);
        }
        if self.no_md {
            settings.markdown = false;
        }
        if self.browse {
            settings.browse = true;
        }
        if self.disable_dir_index {
            settings.disable_directory_listing = true;
        }
        if let Some(format) = self.logging_type {
            settings.logging_type = format;
        }
        if !self.proxy.is_empty() {
            settings.proxy = self.proxy;
        }
        if let Some(backend) = self.proxy_backend {
            settings.proxy_backend = backend;
        }
        if let Some(path) = self.proxy_path {
            settings.proxy_path = path;
        }

        if let Some(target) = self.target.map(|target| target.trim().to_string()) {
            match target.parse::<u16>() {
                Ok(port) if port > 0 => settings.port = port,
                _ if target.is_empty() => {}
                _ => settings.initial_file = Some(target),
            }
        }
    }
}
