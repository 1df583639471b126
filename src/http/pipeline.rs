//! Ordered request dispatch pipeline.
//!
//! # Responsibilities
//! - Declare handler precedence once, as an ordered list of stages
//! - Give every stage the same contract: handle the request or pass it on
//! - End in the static file handler when no stage handles the request
//!
//! # Stage Order
//! ```text
//! initial file   (non-browse, when configured; rewrites "/" only)
//! browse         (browse mode)
//! markdown       (when enabled; directory substitution off in browse mode)
//!   or guard     (markdown off, listing disabled, non-browse)
//! proxy          (route table non-empty)
//! static files   (terminal)
//! ```
//!
//! # Design Decisions
//! - The initial-file rewrite runs before the content policies so that "/"
//!   resolves to the configured file rather than a directory document
//! - Stages are stateless per request; shared state is read-only

use std::sync::Arc;

use axum::body::Body;
use axum::extract::Request;
use axum::http::Response;
use futures_util::future::BoxFuture;

use crate::config::DispatchConfiguration;
use crate::handlers::{
    BrowseHandler, DirectoryGuard, InitialFileRewrite, MarkdownHandler, SiteRoot, StaticFiles,
};
use crate::proxy::dispatcher::{DispatcherError, ProxyDispatcher};

/// Result of offering a request to a stage.
pub enum Outcome {
    /// The stage produced the response.
    Handled(Response<Body>),
    /// The stage declined; the (possibly rewritten) request moves on.
    Continue(Request),
}

/// A pipeline stage.
pub trait Interceptor: Send + Sync {
    /// Stage name for logs.
    fn name(&self) -> &'static str;

    fn intercept<'a>(&'a self, request: Request) -> BoxFuture<'a, Outcome>;
}

/// The composed handler chain.
pub struct DispatchPipeline {
    stages: Vec<Box<dyn Interceptor>>,
    terminal: StaticFiles,
}

impl DispatchPipeline {
    pub fn new(stages: Vec<Box<dyn Interceptor>>, terminal: StaticFiles) -> Self {
        Self { stages, terminal }
    }

    /// Build the chain a configuration calls for.
    pub fn from_config(config: &DispatchConfiguration) -> Result<Self, DispatcherError> {
        let site = Arc::new(SiteRoot::new(&config.directory));
        let mut stages: Vec<Box<dyn Interceptor>> = Vec::new();

        if !config.browse_directories {
            if let Some(initial_file) = &config.initial_file {
                stages.push(Box::new(InitialFileRewrite::new(initial_file)));
            }
        }

        if config.browse_directories {
            stages.push(Box::new(BrowseHandler::new(Arc::clone(&site))));
        }

        if config.enable_markdown {
            stages.push(Box::new(MarkdownHandler::new(
                Arc::clone(&site),
                config.disable_directory_listing,
                !config.browse_directories,
            )));
        } else if config.disable_directory_listing && !config.browse_directories {
            stages.push(Box::new(DirectoryGuard));
        }

        if !config.routes.is_empty() {
            stages.push(Box::new(ProxyDispatcher::new(Arc::clone(&config.routes))?));
        }

        Ok(Self::new(stages, StaticFiles::new(site)))
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Run a request through the stages, then the static handler.
    pub async fn dispatch(&self, request: Request) -> Response<Body> {
        let mut request = request;
        for stage in &self.stages {
            match stage.intercept(request).await {
                Outcome::Handled(response) => {
                    tracing::trace!(stage = stage.name(), "Request handled");
                    return response;
                }
                Outcome::Continue(next) => request = next,
            }
        }
        self.terminal.serve(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProtocolVersion;
    use crate::routing::RouteTable;

    fn config(directory: &std::path::Path) -> DispatchConfiguration {
        DispatchConfiguration {
            directory: directory.to_path_buf(),
            enable_markdown: true,
            browse_directories: false,
            disable_directory_listing: false,
            initial_file: None,
            routes: Arc::new(RouteTable::empty()),
            tls: None,
            protocol: ProtocolVersion::Http11,
        }
    }

    #[test]
    fn test_default_stages() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = DispatchPipeline::from_config(&config(dir.path())).unwrap();
        assert_eq!(pipeline.stage_names(), vec!["markdown"]);
    }

    #[test]
    fn test_full_non_browse_stages() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.initial_file = Some("index.md".to_string());
        config.routes = Arc::new(RouteTable::build(&["/api=http://127.0.0.1:9000"]).unwrap());
        let pipeline = DispatchPipeline::from_config(&config).unwrap();
        assert_eq!(
            pipeline.stage_names(),
            vec!["initial-file", "markdown", "proxy"]
        );
    }

    #[test]
    fn test_guard_replaces_markdown_when_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.enable_markdown = false;
        config.disable_directory_listing = true;
        let pipeline = DispatchPipeline::from_config(&config).unwrap();
        assert_eq!(pipeline.stage_names(), vec!["directory-guard"]);
    }

    #[test]
    fn test_browse_mode_skips_initial_file_and_guard() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.browse_directories = true;
        config.enable_markdown = false;
        config.disable_directory_listing = true;
        config.initial_file = Some("index.html".to_string());
        let pipeline = DispatchPipeline::from_config(&config).unwrap();
        assert_eq!(pipeline.stage_names(), vec!["browse"]);
    }

    #[tokio::test]
    async fn test_dispatch_runs_on_spawned_tasks() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("README.md"), "# Notes").unwrap();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut config = config(dir.path());
        config.routes = Arc::new(RouteTable::build(&[format!("/ws=http://{addr}")]).unwrap());
        let pipeline = Arc::new(DispatchPipeline::from_config(&config).unwrap());

        let markdown = Request::builder().uri("/").body(Body::empty()).unwrap();
        let upgrade = Request::builder()
            .uri("/ws")
            .header("Connection", "Upgrade")
            .header("Upgrade", "websocket")
            .body(Body::empty())
            .unwrap();

        // Both stage futures must be Send to cross into the runtime.
        let rendered = tokio::spawn({
            let pipeline = Arc::clone(&pipeline);
            async move { pipeline.dispatch(markdown).await }
        });
        let tunneled = tokio::spawn(async move { pipeline.dispatch(upgrade).await });

        assert_eq!(rendered.await.unwrap().status(), axum::http::StatusCode::OK);
        assert_eq!(
            tunneled.await.unwrap().status(),
            axum::http::StatusCode::BAD_GATEWAY
        );
    }
}
