//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::Request;
use axum::http::header;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use staticgate::config::{DispatchConfiguration, ProtocolVersion, ServeConfiguration};
use staticgate::net::Listener;
use staticgate::observability::LogFormat;
use staticgate::routing::RouteTable;
use staticgate::{HttpServer, Shutdown};

/// A running server bound to an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Dispatch settings for `dir` with everything optional switched off.
pub fn dispatch_config(dir: &Path) -> DispatchConfiguration {
    DispatchConfiguration {
        directory: dir.to_path_buf(),
        enable_markdown: false,
        browse_directories: false,
        disable_directory_listing: false,
        initial_file: None,
        routes: Arc::new(RouteTable::empty()),
        tls: None,
        protocol: ProtocolVersion::Http11,
    }
}

pub fn with_routes(mut config: DispatchConfiguration, mappings: &[String]) -> DispatchConfiguration {
    config.routes = Arc::new(RouteTable::build(mappings).unwrap());
    config
}

/// Start the full server stack on 127.0.0.1 with an ephemeral port.
pub async fn start_server(dispatch: DispatchConfiguration) -> TestServer {
    let config = ServeConfiguration {
        bind_address: "127.0.0.1".to_string(),
        port: 0,
        max_connections: 64,
        log_format: LogFormat::Console,
        dispatch,
    };
    let server = HttpServer::new(&config).unwrap();
    let listener = Listener::bind("127.0.0.1", 0, config.max_connections).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    tokio::spawn(server.run(listener, shutdown.subscribe()));
    TestServer { addr, shutdown }
}

/// HTTP client that neither follows redirects nor honours proxy env vars.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// Backend that answers every request with a description of it:
/// `METHOD path?query|host|x-forwarded-for|body`.
pub async fn start_echo_backend() -> SocketAddr {
    let app = axum::Router::new().fallback(|request: Request| async move {
        let (parts, body) = request.into_parts();
        let body: Bytes = axum::body::to_bytes(body, 1 << 20).await.unwrap_or_default();
        let header_value = |name: header::HeaderName| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .unwrap_or("")
                .to_string()
        };
        let target = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_default();

        (
            [("x-backend", "echo")],
            format!(
                "{} {}|{}|{}|{}",
                parts.method,
                target,
                header_value(header::HOST),
                header_value(header::HeaderName::from_static("x-forwarded-for")),
                String::from_utf8_lossy(&body)
            ),
        )
    });

    start_router_backend(app).await
}

/// Backend answering every request with a fixed body.
pub async fn start_named_backend(name: &'static str) -> SocketAddr {
    start_router_backend(axum::Router::new().fallback(move || async move { name })).await
}

/// Serve an axum router on an ephemeral port.
pub async fn start_router_backend(app: axum::Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Backend that reads one request head and answers with raw bytes.
pub async fn start_raw_backend(reply: &'static [u8]) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut head = Vec::new();
                let mut buf = [0u8; 1024];
                while !head.windows(4).any(|window| window == b"\r\n\r\n") {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => head.extend_from_slice(&buf[..n]),
                    }
                }
                let _ = stream.write_all(reply).await;
                let _ = stream.shutdown().await;
            });
        }
    });
    addr
}

/// WebSocket backend echoing every data message back.
pub async fn start_ws_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(mut socket) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                while let Some(Ok(message)) = socket.next().await {
                    if message.is_text() || message.is_binary() {
                        if socket.send(message).await.is_err() {
                            break;
                        }
                    } else if message.is_close() {
                        break;
                    }
                }
            });
        }
    });
    addr
}

/// A local port with nothing listening on it.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}
