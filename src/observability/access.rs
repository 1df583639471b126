//! Per-request access records.
//!
//! # Responsibilities
//! - Observe the response status and the bytes written to the client
//! - Emit one access record when the body finishes or is dropped
//!
//! # Design Decisions
//! - Observation lives inside the response body, so streamed and proxied
//!   bodies are counted as they leave, not when the handler returns
//! - Nothing here touches request extensions; connection takeover state
//!   passes through untouched

use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::http::{Method, StatusCode, Version};
use chrono::Local;
use hyper::body::{Body as HttpBody, Frame, SizeHint};

use crate::observability::LogFormat;

/// Status and size of one response as seen by the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseObservation {
    status: Option<StatusCode>,
    bytes_written: u64,
}

impl ResponseObservation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only the first status is kept.
    pub fn record_status(&mut self, status: StatusCode) {
        if self.status.is_none() {
            self.status = Some(status);
        }
    }

    pub fn record_bytes(&mut self, count: usize) {
        self.bytes_written += count as u64;
    }

    /// Recorded status, `200` when content went out without one.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

/// Request facts captured before the handler runs.
#[derive(Debug, Clone)]
pub struct RequestSummary {
    pub method: Method,
    pub target: String,
    pub path: String,
    pub version: Version,
    pub remote: Option<SocketAddr>,
    pub started: Instant,
}

impl RequestSummary {
    fn client(&self) -> String {
        self.remote
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| "-".to_string())
    }

    fn protocol(&self) -> &'static str {
        match self.version {
            Version::HTTP_09 => "HTTP/0.9",
            Version::HTTP_10 => "HTTP/1.0",
            Version::HTTP_2 => "HTTP/2.0",
            Version::HTTP_3 => "HTTP/3.0",
            _ => "HTTP/1.1",
        }
    }

    /// JSON mode announces requests as they arrive.
    pub fn log_started(&self, format: LogFormat) {
        if format == LogFormat::Json {
            tracing::info!(
                method = %self.method,
                path = %self.path,
                protocol = self.protocol(),
                remote = %self.client(),
                "request started"
            );
        }
    }

    pub fn log_completed(&self, format: LogFormat, observation: &ResponseObservation) {
        match format {
            LogFormat::Console => tracing::info!("{}", self.common_log_line(observation)),
            LogFormat::Json => tracing::info!(
                method = %self.method,
                path = %self.path,
                protocol = self.protocol(),
                remote = %self.client(),
                status = observation.status().as_u16(),
                bytes = observation.bytes_written(),
                duration_ms = self.started.elapsed().as_millis() as u64,
                "request completed"
            ),
        }
    }

    /// `client - - [dd/Mon/yyyy HH:MM:SS] "METHOD target PROTO" status size`
    pub fn common_log_line(&self, observation: &ResponseObservation) -> String {
        let size = match observation.bytes_written() {
            0 => "-".to_string(),
            bytes => bytes.to_string(),
        };
        format!(
            "{} - - [{}] \"{} {} {}\" {} {}",
            self.client(),
            Local::now().format("%d/%b/%Y %H:%M:%S"),
            self.method,
            self.target,
            self.protocol(),
            observation.status().as_u16(),
            size
        )
    }
}

/// Response body that counts what it yields and logs once at the end.
pub struct ObservedBody {
    inner: Body,
    summary: RequestSummary,
    observation: ResponseObservation,
    format: LogFormat,
    logged: bool,
}

impl ObservedBody {
    pub fn new(inner: Body, summary: RequestSummary, status: StatusCode, format: LogFormat) -> Self {
        let mut observation = ResponseObservation::new();
        observation.record_status(status);
        Self {
            inner,
            summary,
            observation,
            format,
            logged: false,
        }
    }

    fn finish(&mut self) {
        if !self.logged {
            self.logged = true;
            self.summary.log_completed(self.format, &self.observation);
        }
    }
}

impl HttpBody for ObservedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let polled = Pin::new(&mut self.inner).poll_frame(cx);
        match &polled {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    let len = data.len();
                    self.observation.record_bytes(len);
                }
            }
            Poll::Ready(None) | Poll::Ready(Some(Err(_))) => self.finish(),
            Poll::Pending => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for ObservedBody {
    fn drop(&mut self) {
        self.finish();
    }
}
