//! Configuration resolution and validation.
//!
//! # Responsibilities
//! - Turn [`ServeSettings`] into a [`ServeConfiguration`]
//! - Check values (directory exists, port, protocol, TLS pair)
//! - Build the route table from either mapping form
//!
//! # Design Decisions
//! - First failure wins; every error is fatal at startup
//! - Pure apart from filesystem checks

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::dispatch::{DispatchConfiguration, ProtocolVersion, ServeConfiguration};
use crate::config::loader::ConfigError;
use crate::config::schema::ServeSettings;
use crate::net::tls::TlsMaterial;
use crate::routing::RouteTable;

const INITIAL_FILE_EXTENSIONS: [&str; 3] = ["html", "htm", "md"];

/// Resolve settings into the configuration the server runs with.
pub fn resolve(settings: ServeSettings) -> Result<ServeConfiguration, ConfigError> {
    let mut directory = settings.directory.clone();
    let mut initial_file = None;
    if let Some(candidate) = settings.initial_file.as_deref().map(str::trim) {
        if !candidate.is_empty() {
            let (parent, name) = resolve_initial_file(Path::new(candidate))?;
            directory = parent;
            initial_file = Some(name);
        }
    }
    let directory = resolve_directory(&directory)?;

    let protocol: ProtocolVersion = settings.protocol.parse().map_err(ConfigError::Invalid)?;
    if settings.port == 0 {
        return Err(ConfigError::Invalid(format!("invalid port {}", settings.port)));
    }
    if settings.max_connections == 0 {
        return Err(ConfigError::Invalid("max_connections must be at least 1".to_string()));
    }

    let tls = resolve_tls(settings.tls_cert.as_deref(), settings.tls_key.as_deref())?;
    let routes = resolve_routes(&settings.proxy, &settings.proxy_path, &settings.proxy_backend)?;

    Ok(ServeConfiguration {
        bind_address: settings.bind_address.trim().to_string(),
        port: settings.port,
        max_connections: settings.max_connections,
        log_format: settings.logging_type,
        dispatch: DispatchConfiguration {
            directory,
            enable_markdown: settings.markdown,
            browse_directories: settings.browse,
            disable_directory_listing: settings.disable_directory_listing && !settings.browse,
            initial_file,
            routes: Arc::new(routes),
            tls,
            protocol,
        },
    })
}

/// Split comma-delimited entries and drop blanks.
pub fn expand_mappings(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|mapping| !mapping.is_empty())
        .map(str::to_string)
        .collect()
}

/// Build the route table from list-form mappings or the legacy pair.
pub fn resolve_routes(
    mappings: &[String],
    legacy_path: &str,
    legacy_backend: &str,
) -> Result<RouteTable, ConfigError> {
    let mappings = expand_mappings(mappings);
    let legacy_path = legacy_path.trim();
    let legacy_backend = legacy_backend.trim();

    if !mappings.is_empty() {
        if !legacy_path.is_empty() || !legacy_backend.is_empty() {
            return Err(ConfigError::Invalid(
                "proxy mappings cannot be combined with proxy-path/proxy-backend".to_string(),
            ));
        }
        return Ok(RouteTable::build(&mappings)?);
    }

    if legacy_path.is_empty() != legacy_backend.is_empty() {
        return Err(ConfigError::Invalid(
            "both proxy-backend and proxy-path must be set".to_string(),
        ));
    }
    Ok(RouteTable::from_legacy(legacy_path, legacy_backend)?)
}

/// Validate an initial file and split it into (served directory, file name).
pub fn resolve_initial_file(candidate: &Path) -> Result<(PathBuf, String), ConfigError> {
    let absolute = std::path::absolute(candidate).map_err(|source| ConfigError::Io {
        path: candidate.to_path_buf(),
        source,
    })?;
    let meta = std::fs::metadata(&absolute).map_err(|source| ConfigError::Io {
        path: absolute.clone(),
        source,
    })?;
    if meta.is_dir() {
        return Err(ConfigError::Invalid(format!(
            "initial file is a directory: {}",
            absolute.display()
        )));
    }

    let extension = absolute
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    if !INITIAL_FILE_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ConfigError::Invalid(format!(
            "unsupported initial file extension .{extension}"
        )));
    }

    let name = absolute
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parent = absolute
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("/"));
    Ok((parent, name))
}

fn resolve_directory(directory: &Path) -> Result<PathBuf, ConfigError> {
    let absolute = directory.canonicalize().map_err(|source| ConfigError::Io {
        path: directory.to_path_buf(),
        source,
    })?;
    if !absolute.is_dir() {
        return Err(ConfigError::Invalid(format!(
            "path is not a directory: {}",
            absolute.display()
        )));
    }
    Ok(absolute)
}

fn resolve_tls(cert: Option<&Path>, key: Option<&Path>) -> Result<Option<TlsMaterial>, ConfigError> {
    match (cert, key) {
        (None, None) => Ok(None),
        (Some(cert_path), Some(key_path)) => {
            for path in [cert_path, key_path] {
                std::fs::metadata(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
            }
            Ok(Some(TlsMaterial::Pem {
                cert_path: cert_path.to_path_buf(),
                key_path: key_path.to_path_buf(),
            }))
        }
        _ => Err(ConfigError::Invalid(
            "tls certificate and key must be provided together".to_string(),
        )),
    }
}
