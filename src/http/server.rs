//! HTTP server setup and connection handling.
//!
//! # Responsibilities
//! - Create the Axum Router around the dispatch pipeline
//! - Wire up middleware (access log, tracing, response headers)
//! - Accept connections, terminate TLS, drive hyper with upgrades enabled
//! - Turn aborted responses into a silently closed connection
//! - Graceful shutdown with a bounded grace period

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware,
    response::Response,
    Router,
};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto::Builder;
use hyper_util::server::graceful::{GracefulShutdown, Watcher};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::broadcast;
use tokio_rustls::TlsAcceptor;
use tower::ServiceExt;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::config::{ProtocolVersion, ServeConfiguration};
use crate::http::middleware::access_log_middleware;
use crate::http::pipeline::DispatchPipeline;
use crate::http::reply::{is_aborted, ConnectionAborted};
use crate::lifecycle::Shutdown;
use crate::net::{ConnectionGuard, ConnectionPermit, ConnectionTracker, Listener, ListenerError, TlsError};
use crate::observability::LogFormat;
use crate::proxy::dispatcher::DispatcherError;

pub const SERVER_NAME: &str = "staticgate";
pub const HEADER_READ_TIMEOUT: Duration = Duration::from_secs(15);
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(3);

/// Fatal server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("tls: {0}")]
    Tls(#[from] TlsError),

    #[error(transparent)]
    Dispatcher(#[from] DispatcherError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// The file server: one router shared by every connection.
pub struct HttpServer {
    router: Router,
    acceptor: Option<TlsAcceptor>,
    protocol: ProtocolVersion,
    log_format: LogFormat,
}

impl HttpServer {
    /// Build the pipeline, router and TLS acceptor for a configuration.
    pub fn new(config: &ServeConfiguration) -> Result<Self, ServerError> {
        let pipeline = Arc::new(DispatchPipeline::from_config(&config.dispatch)?);
        tracing::debug!(stages = ?pipeline.stage_names(), "Dispatch pipeline built");

        let acceptor = config
            .dispatch
            .tls
            .as_ref()
            .map(|material| material.acceptor())
            .transpose()?;

        let router = Self::build_router(pipeline, config.dispatch.protocol, config.log_format);
        Ok(Self {
            router,
            acceptor,
            protocol: config.dispatch.protocol,
            log_format: config.log_format,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(pipeline: Arc<DispatchPipeline>, protocol: ProtocolVersion, log_format: LogFormat) -> Router {
        let mut router = Router::new()
            .fallback(dispatch)
            .with_state(pipeline)
            // Relayed backend responses keep their own Server header.
            .layer(SetResponseHeaderLayer::if_not_present(
                header::SERVER,
                HeaderValue::from_static(SERVER_NAME),
            ));

        if protocol == ProtocolVersion::Http10 {
            router = router.layer(SetResponseHeaderLayer::overriding(
                header::CONNECTION,
                |response: &Response<Body>| {
                    if response.status() == StatusCode::SWITCHING_PROTOCOLS {
                        None
                    } else {
                        Some(HeaderValue::from_static("close"))
                    }
                },
            ));
        }

        router
            .layer(TraceLayer::new_for_http())
            .layer(middleware::from_fn_with_state(log_format, access_log_middleware))
    }

    /// The router, for in-process use without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    fn connection_builder(&self) -> Builder<TokioExecutor> {
        let mut builder = Builder::new(TokioExecutor::new());
        builder
            .http1()
            .timer(TokioTimer::new())
            .header_read_timeout(HEADER_READ_TIMEOUT)
            .keep_alive(self.protocol == ProtocolVersion::Http11);
        if self.protocol == ProtocolVersion::Http10 {
            builder = builder.http1_only();
        }
        builder
    }

    /// Log the serving address the way the configured format expects.
    pub fn log_startup(&self, config: &ServeConfiguration, local_addr: SocketAddr) {
        let url = config.display_url(local_addr.port());
        match self.log_format {
            LogFormat::Console => tracing::info!(
                "Serving {} on {} port {} ({}) ...",
                config.scheme().to_ascii_uppercase(),
                config.listen_host(),
                local_addr.port(),
                url
            ),
            LogFormat::Json => tracing::info!(
                directory = %config.dispatch.directory.display(),
                protocol = %config.dispatch.protocol,
                url = %url,
                "serving {}",
                config.scheme()
            ),
        }
    }

    /// Accept connections until shutdown is signalled, then drain.
    pub async fn run(self, listener: Listener, mut shutdown: broadcast::Receiver<()>) -> Result<(), ServerError> {
        let builder = self.connection_builder();
        let graceful = GracefulShutdown::new();
        let tracker = ConnectionTracker::new();

        loop {
            let accepted = tokio::select! {
                accepted = listener.accept() => accepted,
                _ = shutdown.recv() => break,
            };

            let (stream, peer, permit) = match accepted {
                Ok(accepted) => accepted,
                Err(ListenerError::Accept(err)) => {
                    tracing::warn!(error = %err, "Accept failed");
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            let connection = ConnectionContext {
                builder: builder.clone(),
                watcher: graceful.watcher(),
                router: self.router.clone(),
                peer,
                permit,
                guard: tracker.track(),
            };

            match self.acceptor.clone() {
                None => {
                    tokio::spawn(connection.serve(stream));
                }
                Some(acceptor) => {
                    tokio::spawn(async move {
                        match acceptor.accept(stream).await {
                            Ok(tls_stream) => connection.serve(tls_stream).await,
                            Err(err) => tracing::debug!(peer = %peer, error = %err, "TLS handshake failed"),
                        }
                    });
                }
            }
        }

        drop(listener);
        tracing::info!("shutdown initiated");
        tokio::select! {
            _ = graceful.shutdown() => {}
            _ = tokio::time::sleep(SHUTDOWN_GRACE_PERIOD) => {
                tracing::warn!(
                    open_connections = tracker.active_count(),
                    "Grace period elapsed with connections still open"
                );
            }
        }
        tracing::info!("shutdown completed");
        Ok(())
    }
}

/// Everything one accepted connection needs once it is spawned.
struct ConnectionContext {
    builder: Builder<TokioExecutor>,
    watcher: Watcher,
    router: Router,
    peer: SocketAddr,
    permit: ConnectionPermit,
    guard: ConnectionGuard,
}

impl ConnectionContext {
    async fn serve<I>(self, io: I)
    where
        I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let ConnectionContext {
            builder,
            watcher,
            router,
            peer,
            permit,
            guard,
        } = self;

        let service = service_fn(move |mut request: hyper::Request<Incoming>| {
            request.extensions_mut().insert(ConnectInfo(peer));
            let router = router.clone();
            async move {
                let response = match router.oneshot(request.map(Body::new)).await {
                    Ok(response) => response,
                    Err(never) => match never {},
                };
                if is_aborted(&response) {
                    Err(ConnectionAborted)
                } else {
                    Ok(response)
                }
            }
        });

        let connection = builder
            .serve_connection_with_upgrades(TokioIo::new(io), service)
            .into_owned();

        if let Err(err) = watcher.watch(connection).await {
            tracing::debug!(connection_id = %guard.id(), peer = %peer, error = %err, "Connection closed with error");
        }
        drop(permit);
    }
}

/// Router fallback: everything goes through the pipeline.
async fn dispatch(State(pipeline): State<Arc<DispatchPipeline>>, request: Request) -> Response {
    pipeline.dispatch(request).await
}

/// Build the server, bind, and serve until `shutdown` fires.
pub async fn serve(config: ServeConfiguration, shutdown: Shutdown) -> Result<(), ServerError> {
    let signal = shutdown.subscribe();
    let server = HttpServer::new(&config)?;
    let listener = Listener::bind(config.listen_host(), config.port, config.max_connections).await?;
    server.log_startup(&config, listener.local_addr()?);
    server.run(listener, signal).await
}
