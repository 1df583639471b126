//! Terminal static file handler.
//!
//! # Responsibilities
//! - Serve files from the configured directory (`ServeDir`)
//! - Redirect `.../index.html` to its directory (`301`, `Location: ./`)
//! - List a trailing-slash directory that has no `index.html`
//!
//! # Design Decisions
//! - Unsafe paths (escaping the root) are a plain 404
//! - `ServeDir` handles ranges, conditional requests, MIME types and the
//!   slash redirect for directories requested without one

use std::convert::Infallible;
use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, HeaderValue, Response, StatusCode};
use tower::ServiceExt;
use tower_http::services::{ServeDir, ServeFile};

use crate::handlers::listing;
use crate::handlers::site::SiteRoot;
use crate::http::reply::not_found;

const INDEX_FILE: &str = "index.html";

/// Serves whatever no other stage handled.
#[derive(Clone)]
pub struct StaticFiles {
    site: Arc<SiteRoot>,
    serve_dir: ServeDir,
}

impl StaticFiles {
    pub fn new(site: Arc<SiteRoot>) -> Self {
        let serve_dir = ServeDir::new(site.root()).append_index_html_on_directories(true);
        Self { site, serve_dir }
    }

    pub async fn serve(&self, request: Request) -> Response<Body> {
        let path = request.uri().path().to_string();
        let Some(fs_path) = self.site.resolve(&path) else {
            return not_found();
        };

        if path.ends_with("/index.html") {
            return redirect_to_directory();
        }

        if path.ends_with('/') && is_directory(&fs_path).await && !is_file(&fs_path.join(INDEX_FILE)).await {
            match listing::respond(&fs_path, &path).await {
                Ok(response) => return response,
                Err(err) => {
                    tracing::warn!(path = %path, error = %err, "Failed to read directory");
                    return not_found();
                }
            }
        }

        let result: Result<_, Infallible> = self.serve_dir.clone().oneshot(request).await;
        match result {
            Ok(response) => response.map(Body::new),
            Err(never) => match never {},
        }
    }
}

/// Serve one file directly, bypassing the directory handling above.
pub async fn serve_file(path: &Path, request: Request) -> Response<Body> {
    let result: Result<_, Infallible> = ServeFile::new(path).oneshot(request).await;
    match result {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    }
}

fn redirect_to_directory() -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::MOVED_PERMANENTLY;
    response
        .headers_mut()
        .insert(header::LOCATION, HeaderValue::from_static("./"));
    response
}

pub(crate) async fn is_directory(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false)
}

pub(crate) async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| !meta.is_dir())
        .unwrap_or(false)
}
