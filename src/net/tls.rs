//! TLS configuration and certificate loading.
//!
//! Server side: PEM certificate chain + private key, or a configuration
//! pre-loaded by whatever component manages certificates.
//! Client side: the connector used to reach `https` backends for tunnels.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio_rustls::rustls::crypto::ring;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::{self, ClientConfig, RootCertStore, ServerConfig};
use tokio_rustls::{TlsAcceptor, TlsConnector};

/// TLS setup failures.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no certificates found in {0}")]
    NoCertificates(PathBuf),

    #[error("no private key found in {0}")]
    NoPrivateKey(PathBuf),

    #[error("invalid TLS configuration: {0}")]
    Rustls(#[from] rustls::Error),
}

/// Certificate material the listener terminates TLS with.
#[derive(Clone)]
pub enum TlsMaterial {
    /// Certificate chain and key read from PEM files at startup.
    Pem { cert_path: PathBuf, key_path: PathBuf },
    /// A ready server configuration handed over by an external component.
    Preloaded(Arc<ServerConfig>),
}

impl std::fmt::Debug for TlsMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TlsMaterial::Pem { cert_path, key_path } => f
                .debug_struct("Pem")
                .field("cert_path", cert_path)
                .field("key_path", key_path)
                .finish(),
            TlsMaterial::Preloaded(_) => f.write_str("Preloaded"),
        }
    }
}

impl TlsMaterial {
    /// Build the acceptor used by the listener.
    pub fn acceptor(&self) -> Result<TlsAcceptor, TlsError> {
        let config = match self {
            TlsMaterial::Pem { cert_path, key_path } => {
                Arc::new(load_server_config(cert_path, key_path)?)
            }
            TlsMaterial::Preloaded(config) => Arc::clone(config),
        };
        Ok(TlsAcceptor::from(config))
    }
}

/// Load a server configuration from PEM certificate and key files.
pub fn load_server_config(cert_path: &Path, key_path: &Path) -> Result<ServerConfig, TlsError> {
    let certs = load_certs(cert_path)?;
    let key = load_private_key(key_path)?;

    let mut config = ServerConfig::builder_with_provider(Arc::new(ring::default_provider()))
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
    Ok(config)
}

/// Connector for `https` backends, trusting the bundled web PKI roots.
pub fn backend_connector() -> Result<TlsConnector, TlsError> {
    let mut root_store = RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = ClientConfig::builder_with_provider(Arc::new(ring::default_provider()))
        .with_safe_default_protocol_versions()?
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(config)))
}

fn open(path: &Path) -> Result<BufReader<File>, TlsError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| TlsError::Io {
            path: path.to_path_buf(),
            source,
        })
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificates(path.to_path_buf()));
    }
    Ok(certs)
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| TlsError::Io {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| TlsError::NoPrivateKey(path.to_path_buf()))
}
