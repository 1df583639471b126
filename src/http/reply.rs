//! Small response helpers shared by the handlers.

use axum::body::Body;
use axum::http::{header, HeaderValue, Response, StatusCode};
use axum::response::IntoResponse;

/// Marks a response whose connection must be closed without writing it.
///
/// The connection service turns a response carrying this extension into a
/// service error, which makes hyper drop the connection silently.
#[derive(Debug, Clone, Copy)]
pub struct AbortConnection;

/// Error handed back to hyper for an aborted connection.
#[derive(Debug, thiserror::Error)]
#[error("connection aborted after takeover")]
pub struct ConnectionAborted;

/// A response that is never written: the client connection is dropped.
pub fn abort_connection() -> Response<Body> {
    let mut response = StatusCode::BAD_GATEWAY.into_response();
    response.extensions_mut().insert(AbortConnection);
    response
}

pub fn is_aborted<B>(response: &Response<B>) -> bool {
    response.extensions().get::<AbortConnection>().is_some()
}

/// Plain-text error body terminated by a newline.
pub fn plain_error(status: StatusCode, message: impl Into<String>) -> Response<Body> {
    let mut body = message.into();
    body.push('\n');
    let mut response = (status, body).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response.headers_mut().insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    response
}

pub fn bad_gateway(message: impl Into<String>) -> Response<Body> {
    plain_error(StatusCode::BAD_GATEWAY, message)
}

pub fn not_found() -> Response<Body> {
    plain_error(StatusCode::NOT_FOUND, "404 page not found")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_marker() {
        assert!(is_aborted(&abort_connection()));
        assert!(!is_aborted(&bad_gateway("Bad Gateway: boom")));
    }

    #[tokio::test]
    async fn test_plain_error_body() {
        let response = plain_error(StatusCode::FORBIDDEN, "Directory listing disabled");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"Directory listing disabled\n");
    }
}
