//! Access Log Middleware.
//! Wraps every response body in an [`ObservedBody`].

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};

use crate::observability::{LogFormat, ObservedBody, RequestSummary};

pub async fn access_log_middleware(
    State(format): State<LogFormat>,
    request: Request,
    next: Next,
) -> Response {
    let summary = RequestSummary {
        method: request.method().clone(),
        target: request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string()),
        path: request.uri().path().to_string(),
        version: request.version(),
        remote: request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr),
        started: Instant::now(),
    };
    summary.log_started(format);

    let response = next.run(request).await;
    let status = response.status();
    response.map(|body| Body::new(ObservedBody::new(body, summary, status, format)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, middleware, Router};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_middleware_keeps_status_and_body() {
        let app = Router::new()
            .fallback(|| async { (StatusCode::IM_A_TEAPOT, "short and stout") })
            .layer(middleware::from_fn_with_state(LogFormat::Console, access_log_middleware));

        let response = app
            .oneshot(Request::builder().uri("/pot").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"short and stout");
    }
}
