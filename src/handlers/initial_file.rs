//! Initial file rewrite: a request for `/` is served as the configured file.

use axum::extract::Request;
use axum::http::uri::{PathAndQuery, Uri};
use futures_util::future::BoxFuture;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::http::pipeline::{Interceptor, Outcome};

/// Characters escaped inside one path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

pub struct InitialFileRewrite {
    target: String,
}

impl InitialFileRewrite {
    pub fn new(file: &str) -> Self {
        Self {
            target: encode_path(&clean_path(&file.replace('\\', "/"))),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    fn rewrite(&self, uri: &Uri) -> Option<Uri> {
        let path_and_query = match uri.query() {
            Some(query) => format!("{}?{}", self.target, query),
            None => self.target.clone(),
        };
        let path_and_query = PathAndQuery::try_from(path_and_query).ok()?;

        let mut parts = uri.clone().into_parts();
        parts.path_and_query = Some(path_and_query);
        Uri::from_parts(parts).ok()
    }
}

impl Interceptor for InitialFileRewrite {
    fn name(&self) -> &'static str {
        "initial-file"
    }

    fn intercept<'a>(&'a self, mut request: Request) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            if request.uri().path() == "/" {
                match self.rewrite(request.uri()) {
                    Some(uri) => *request.uri_mut() = uri,
                    None => tracing::warn!(target = %self.target, "Initial file is not a valid request path"),
                }
            }
            Outcome::Continue(request)
        })
    }
}

/// Lexically resolve `.` and `..` into an absolute path.
fn clean_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("/{}", segments.join("/"))
}

fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}
