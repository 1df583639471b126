//! Directory guard: rejects directory requests when listings are disabled.

use axum::extract::Request;
use axum::http::StatusCode;
use futures_util::future::BoxFuture;

use crate::http::pipeline::{Interceptor, Outcome};
use crate::http::reply::plain_error;

pub const DIRECTORY_LISTING_DISABLED: &str = "Directory listing disabled";

/// Any path ending in `/` gets 403; everything else passes.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryGuard;

impl Interceptor for DirectoryGuard {
    fn name(&self) -> &'static str {
        "directory-guard"
    }

    fn intercept<'a>(&'a self, request: Request) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            if request.uri().path().ends_with('/') {
                Outcome::Handled(plain_error(StatusCode::FORBIDDEN, DIRECTORY_LISTING_DISABLED))
            } else {
                Outcome::Continue(request)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[tokio::test]
    async fn test_guard() {
        let request = Request::builder().uri("/docs/").body(Body::empty()).unwrap();
        match DirectoryGuard.intercept(request).await {
            Outcome::Handled(response) => assert_eq!(response.status(), StatusCode::FORBIDDEN),
            Outcome::Continue(_) => panic!("directory request must be rejected"),
        }

        let request = Request::builder().uri("/docs/a.txt").body(Body::empty()).unwrap();
        assert!(matches!(DirectoryGuard.intercept(request).await, Outcome::Continue(_)));
    }
}
