//! Backend dialing for tunnels.
//!
//! # Responsibilities
//! - Open a TCP connection to the route's backend
//! - Wrap it in TLS when the backend scheme is `https`
//! - Bound the whole dial (connect + TLS handshake) by a timeout

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::TlsConnector;
use url::Host;

use crate::net::tls::{backend_connector, TlsError};
use crate::proxy::TunnelError;
use crate::routing::Route;

/// Bound on establishing a backend connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A connected backend, plain or TLS.
pub enum BackendStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for BackendStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            BackendStream::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            BackendStream::Tls(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for BackendStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            BackendStream::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            BackendStream::Tls(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            BackendStream::Plain(stream) => Pin::new(stream).poll_flush(cx),
            BackendStream::Tls(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            BackendStream::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            BackendStream::Tls(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Dials backends for WebSocket tunnels.
#[derive(Clone)]
pub struct BackendDialer {
    connector: TlsConnector,
    connect_timeout: Duration,
}

impl BackendDialer {
    pub fn new() -> Result<Self, TlsError> {
        Ok(Self::with_connector(backend_connector()?, CONNECT_TIMEOUT))
    }

    pub fn with_connector(connector: TlsConnector, connect_timeout: Duration) -> Self {
        Self {
            connector,
            connect_timeout,
        }
    }

    /// Connect to the route's backend, over TLS for `https` backends.
    pub async fn dial(&self, route: &Route) -> Result<BackendStream, TunnelError> {
        let authority = route.backend_authority();
        match tokio::time::timeout(self.connect_timeout, self.connect(route, &authority)).await {
            Ok(result) => result,
            Err(_) => Err(TunnelError::Timeout { authority }),
        }
    }

    async fn connect(&self, route: &Route, authority: &str) -> Result<BackendStream, TunnelError> {
        let backend = route.backend();
        let host = match backend.host() {
            Some(Host::Domain(domain)) => domain.to_string(),
            Some(Host::Ipv4(ip)) => ip.to_string(),
            Some(Host::Ipv6(ip)) => ip.to_string(),
            None => return Err(TunnelError::ServerName(authority.to_string())),
        };
        let port = backend.port_or_known_default().unwrap_or(80);

        let dial_error = |source| TunnelError::Dial {
            authority: authority.to_string(),
            source,
        };

        let stream = TcpStream::connect((host.as_str(), port))
            .await
            .map_err(dial_error)?;
        let _ = stream.set_nodelay(true);

        if !route.uses_tls() {
            return Ok(BackendStream::Plain(stream));
        }

        // Server name is the host without its port.
        let server_name = ServerName::try_from(host.clone())
            .map_err(|_| TunnelError::ServerName(host.clone()))?;
        let stream = self
            .connector
            .connect(server_name, stream)
            .await
            .map_err(dial_error)?;
        Ok(BackendStream::Tls(Box::new(stream)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::RouteTable;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn route_for(mapping: &str) -> Route {
        let table = RouteTable::build(&[mapping]).unwrap();
        let route = table.iter().next().unwrap().clone();
        route
    }

    #[tokio::test]
    async fn test_dials_plain_backend() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"hi").await.unwrap();
        });

        let dialer = BackendDialer::new().unwrap();
        let route = route_for(&format!("/ws=http://{addr}"));
        let mut stream = dialer.dial(&route).await.unwrap();
        assert!(matches!(stream, BackendStream::Plain(_)));

        let mut buf = [0u8; 2];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hi");
    }

    fn fixture(name: &str) -> std::path::PathBuf {
        std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name)
    }

    /// Connector trusting only the self-signed localhost fixture.
    fn fixture_connector() -> TlsConnector {
        use std::sync::Arc;
        use tokio_rustls::rustls::crypto::ring;
        use tokio_rustls::rustls::{ClientConfig, RootCertStore};

        let pem = std::fs::read(fixture("localhost.crt")).unwrap();
        let mut roots = RootCertStore::empty();
        for cert in rustls_pemfile::certs(&mut pem.as_slice()) {
            roots.add(cert.unwrap()).unwrap();
        }
        let config = ClientConfig::builder_with_provider(Arc::new(ring::default_provider()))
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_root_certificates(roots)
            .with_no_client_auth();
        TlsConnector::from(Arc::new(config))
    }

    #[tokio::test]
    async fn test_dials_tls_backend_by_host_name() {
        let server_config = crate::net::tls::load_server_config(
            &fixture("localhost.crt"),
            &fixture("localhost.key"),
        )
        .unwrap();
        let acceptor = tokio_rustls::TlsAcceptor::from(std::sync::Arc::new(server_config));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut tls = acceptor.accept(socket).await.unwrap();
            let mut buf = [0u8; 4];
            tls.read_exact(&mut buf).await.unwrap();
            tls.write_all(&buf).await.unwrap();
            tls.flush().await.unwrap();
        });

        let dialer = BackendDialer::with_connector(fixture_connector(), Duration::from_secs(5));
        // The certificate names "localhost", so the port must not leak into the server name.
        let route = route_for(&format!("/ws=https://localhost:{port}"));
        let mut stream = dialer.dial(&route).await.unwrap();
        assert!(matches!(stream, BackendStream::Tls(_)));

        stream.write_all(b"ping").await.unwrap();
        stream.flush().await.unwrap();
        let mut buf = [0u8; 4];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");
    }

    #[tokio::test]
    async fn test_tls_backend_with_untrusted_certificate_fails() {
        let server_config = crate::net::tls::load_server_config(
            &fixture("localhost.crt"),
            &fixture("localhost.key"),
        )
        .unwrap();
        let acceptor = tokio_rustls::TlsAcceptor::from(std::sync::Arc::new(server_config));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let _ = acceptor.accept(socket).await;
        });

        // Web PKI roots do not include the self-signed fixture.
        let dialer = BackendDialer::with_connector(backend_connector().unwrap(), Duration::from_secs(5));
        let route = route_for(&format!("/ws=https://127.0.0.1:{port}"));
        assert!(matches!(dialer.dial(&route).await, Err(TunnelError::Dial { .. })));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_dial_error() {
        // Bind then drop to get a port with nothing listening.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let dialer = BackendDialer::new().unwrap();
        let route = route_for(&format!("/ws=http://{addr}"));
        let result = dialer.dial(&route).await;
        assert!(matches!(result, Err(TunnelError::Dial { .. })));
    }
}
