//! staticgate
//!
//! Serves a directory over HTTP(S), renders Markdown, and forwards
//! selected path prefixes to backend services, tunnelling WebSocket
//! upgrades byte-for-byte.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ─────────────▶ net listener ─▶ http server ─▶ dispatch pipeline
//!                                                    │
//!                       initial file ─ browse ─ markdown/guard ─ proxy ─ static
//!                                                                  │
//!                                          forward (reqwest) ◀─────┤
//!                                          tunnel (raw relay) ◀────┘
//! ```

use std::process::ExitCode;

use clap::Parser;

use staticgate::config::{self, CliArgs, FileConfig};
use staticgate::lifecycle::{spawn_signal_listener, Shutdown};
use staticgate::observability::init_logging;

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    let mut file_config = match args.config.as_deref() {
        Some(path) => match config::load_config(path) {
            Ok(loaded) => loaded,
            Err(err) => {
                eprintln!("staticgate: {err}");
                return ExitCode::FAILURE;
            }
        },
        None => FileConfig::default(),
    };
    args.apply(&mut file_config.serve);

    if let Err(err) = init_logging(file_config.serve.logging_type) {
        eprintln!("staticgate: failed to initialize logger: {err}");
        return ExitCode::FAILURE;
    }

    let serve_config = match config::resolve(file_config.serve) {
        Ok(resolved) => resolved,
        Err(err) => {
            tracing::error!(error = %err, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        directory = %serve_config.dispatch.directory.display(),
        proxy_routes = serve_config.dispatch.routes.count(),
        markdown = serve_config.dispatch.enable_markdown,
        browse = serve_config.dispatch.browse_directories,
        "Configuration loaded"
    );

    let shutdown = Shutdown::new();
    spawn_signal_listener(shutdown.clone());

    match staticgate::serve(serve_config, shutdown).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "Server failed");
            ExitCode::FAILURE
        }
    }
}
