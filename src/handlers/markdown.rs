//! Markdown rendering stage.
//!
//! # Responsibilities
//! - Render a requested `.md` file as an HTML document
//! - For a trailing-slash directory request, substitute a directory document:
//!   `index.html`/`index.htm` win (pass through), then `README.md` (any case),
//!   then the directory's only other Markdown file
//! - With no candidate and listings disabled: 403
//!
//! # Design Decisions
//! - Read or render trouble falls through to the next stage, never errors
//! - Freshness comes from the source file's modification time

use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::Request;
use axum::http::{HeaderMap, Response, StatusCode};
use futures_util::future::BoxFuture;

use crate::handlers::content;
use crate::handlers::guard::DIRECTORY_LISTING_DISABLED;
use crate::handlers::site::SiteRoot;
use crate::http::pipeline::{Interceptor, Outcome};
use crate::http::reply::plain_error;
use crate::markdown::{self, is_markdown_file};

const DIRECTORY_INDEX_CANDIDATES: [&str; 2] = ["index.html", "index.htm"];
const README: &str = "README.md";

pub struct MarkdownHandler {
    site: Arc<SiteRoot>,
    disable_directory_listing: bool,
    directory_documents: bool,
}

impl MarkdownHandler {
    /// `directory_documents` enables README substitution for directory requests.
    pub fn new(site: Arc<SiteRoot>, disable_directory_listing: bool, directory_documents: bool) -> Self {
        Self {
            site,
            disable_directory_listing,
            directory_documents,
        }
    }

    async fn directory(&self, request: Request, directory: PathBuf) -> Outcome {
        if !request.uri().path().ends_with('/') || !self.directory_documents {
            return Outcome::Continue(request);
        }
        if directory_index_exists(&directory).await {
            return Outcome::Continue(request);
        }

        if let Some((candidate, meta)) = select_candidate(&directory).await {
            if let Some(response) = render(request.headers(), &candidate, &meta).await {
                return Outcome::Handled(response);
            }
            return Outcome::Continue(request);
        }

        if self.disable_directory_listing {
            return Outcome::Handled(plain_error(StatusCode::FORBIDDEN, DIRECTORY_LISTING_DISABLED));
        }
        Outcome::Continue(request)
    }
}

impl Interceptor for MarkdownHandler {
    fn name(&self) -> &'static str {
        "markdown"
    }

    fn intercept<'a>(&'a self, request: Request) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            let Some(fs_path) = self.site.resolve(request.uri().path()) else {
                return Outcome::Continue(request);
            };
            let Ok(meta) = tokio::fs::metadata(&fs_path).await else {
                return Outcome::Continue(request);
            };

            if meta.is_dir() {
                return self.directory(request, fs_path).await;
            }
            if request.uri().path().ends_with('/') || !is_markdown_file(&fs_path) {
                return Outcome::Continue(request);
            }

            match render(request.headers(), &fs_path, &meta).await {
                Some(response) => Outcome::Handled(response),
                None => Outcome::Continue(request),
            }
        })
    }
}

async fn render(headers: &HeaderMap, path: &Path, meta: &Metadata) -> Option<Response<Body>> {
    let source = match tokio::fs::read(path).await {
        Ok(source) => source,
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "Markdown file unreadable");
            return None;
        }
    };

    let rendered = markdown::to_html(&String::from_utf8_lossy(&source));
    let document = markdown::document(&markdown::title_for(path), &rendered);

    Some(match meta.modified() {
        Ok(modified) => content::html_with_modified(headers, document, modified),
        Err(_) => content::html(document),
    })
}

async fn directory_index_exists(directory: &Path) -> bool {
    for candidate in DIRECTORY_INDEX_CANDIDATES {
        if let Ok(meta) = tokio::fs::metadata(directory.join(candidate)).await {
            if !meta.is_dir() {
                return true;
            }
        }
    }
    false
}

/// `README.md` (any case) first, otherwise the only Markdown file present.
async fn select_candidate(directory: &Path) -> Option<(PathBuf, Metadata)> {
    let mut reader = tokio::fs::read_dir(directory).await.ok()?;
    let mut others = Vec::new();

    while let Ok(Some(entry)) = reader.next_entry().await {
        let path = entry.path();
        let Ok(meta) = tokio::fs::metadata(&path).await else {
            continue;
        };
        if meta.is_dir() || !is_markdown_file(&path) {
            continue;
        }
        if entry.file_name().to_string_lossy().eq_ignore_ascii_case(README) {
            return Some((path, meta));
        }
        others.push((path, meta));
    }

    if others.len() == 1 {
        others.pop()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;

    fn get(uri: &str) -> Request {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn handled_body(outcome: Outcome) -> String {
        let Outcome::Handled(response) = outcome else {
            panic!("expected the request to be handled");
        };
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1 << 20).await.unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    fn handler(dir: &Path, disable_listing: bool) -> MarkdownHandler {
        MarkdownHandler::new(Arc::new(SiteRoot::new(dir)), disable_listing, true)
    }

    #[tokio::test]
    async fn test_renders_markdown_file_with_title() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("guide.md"), "# Guide\n\nhello").unwrap();

        let outcome = handler(dir.path(), false).intercept(get("/guide.md")).await;
        let page = handled_body(outcome).await;
        assert!(page.contains("<title>guide</title>"));
        assert!(page.contains("<h1>Guide</h1>"));
    }

    #[tokio::test]
    async fn test_markdown_response_has_last_modified() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("guide.md"), "text").unwrap();

        let Outcome::Handled(response) = handler(dir.path(), false).intercept(get("/guide.md")).await else {
            panic!("expected the request to be handled");
        };
        assert!(response.headers().contains_key(header::LAST_MODIFIED));
    }

    #[tokio::test]
    async fn test_index_html_wins_over_readme() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>index</h1>").unwrap();
        std::fs::write(dir.path().join("README.md"), "# readme").unwrap();

        let outcome = handler(dir.path(), false).intercept(get("/")).await;
        assert!(matches!(outcome, Outcome::Continue(_)));
    }

    #[tokio::test]
    async fn test_readme_is_case_insensitive_and_preferred() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("readme.MD"), "# from readme").unwrap();
        std::fs::write(dir.path().join("other.md"), "# other").unwrap();

        let page = handled_body(handler(dir.path(), false).intercept(get("/")).await).await;
        assert!(page.contains("from readme"));
    }

    #[tokio::test]
    async fn test_single_markdown_file_is_used() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs").join("only.md"), "# only").unwrap();
        std::fs::write(dir.path().join("docs").join("image.png"), "png").unwrap();

        let page = handled_body(handler(dir.path(), false).intercept(get("/docs/")).await).await;
        assert!(page.contains("<title>only</title>"));
    }

    #[tokio::test]
    async fn test_no_candidate_respects_listing_setting() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "a").unwrap();
        std::fs::write(dir.path().join("b.md"), "b").unwrap();

        let allowed = handler(dir.path(), false).intercept(get("/")).await;
        assert!(matches!(allowed, Outcome::Continue(_)));

        let Outcome::Handled(denied) = handler(dir.path(), true).intercept(get("/")).await else {
            panic!("expected 403 when listings are disabled");
        };
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_directory_documents_off_passes_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("README.md"), "# readme").unwrap();

        let handler = MarkdownHandler::new(Arc::new(SiteRoot::new(dir.path())), false, false);
        assert!(matches!(handler.intercept(get("/")).await, Outcome::Continue(_)));
        assert!(matches!(handler.intercept(get("/README.md")).await, Outcome::Handled(_)));
    }
}
