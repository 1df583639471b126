//! Browse mode: direct file serving and generated listings.
//!
//! - Path without trailing slash naming a non-directory, non-Markdown file:
//!   served as-is (no `index.html` canonicalizing redirect)
//! - Path with trailing slash naming a directory: listing
//! - Anything else passes through

use std::sync::Arc;

use axum::extract::Request;
use futures_util::future::BoxFuture;

use crate::handlers::listing;
use crate::handlers::site::SiteRoot;
use crate::handlers::static_files::serve_file;
use crate::http::pipeline::{Interceptor, Outcome};
use crate::markdown::is_markdown_file;

pub struct BrowseHandler {
    site: Arc<SiteRoot>,
}

impl BrowseHandler {
    pub fn new(site: Arc<SiteRoot>) -> Self {
        Self { site }
    }
}

impl Interceptor for BrowseHandler {
    fn name(&self) -> &'static str {
        "browse"
    }

    fn intercept<'a>(&'a self, request: Request) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            let path = request.uri().path().to_string();
            if path.is_empty() {
                return Outcome::Continue(request);
            }
            let Some(fs_path) = self.site.resolve(&path) else {
                return Outcome::Continue(request);
            };
            let Ok(meta) = tokio::fs::metadata(&fs_path).await else {
                return Outcome::Continue(request);
            };

            if !path.ends_with('/') {
                if meta.is_dir() || is_markdown_file(&fs_path) {
                    return Outcome::Continue(request);
                }
                return Outcome::Handled(serve_file(&fs_path, request).await);
            }

            if !meta.is_dir() {
                return Outcome::Continue(request);
            }
            match listing::respond(&fs_path, &path).await {
                Ok(response) => Outcome::Handled(response),
                Err(err) => {
                    tracing::debug!(path = %path, error = %err, "Directory not readable, passing on");
                    Outcome::Continue(request)
                }
            }
        })
    }
}
