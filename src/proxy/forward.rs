//! Standard reverse-proxy forwarding for non-upgrade requests.
//!
//! # Responsibilities
//! - Build the backend URL (backend path + request path, merged query)
//! - Forward method, headers and body; rewrite Host to the backend
//! - Stream the backend response back unmodified (minus hop-by-hop headers)
//! - Turn any backend failure into a 502 for this request only
//!
//! # Design Decisions
//! - Bodies are streamed in both directions, never buffered
//! - Redirects are returned to the client, never followed
//! - No retries: one attempt per request

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, Request};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Response, Uri};
use hyper::body::Body as HttpBody;
use url::Url;

use crate::http::reply::bad_gateway;
use crate::proxy::dial::CONNECT_TIMEOUT;
use crate::routing::Route;

/// Headers that describe a single hop and are never forwarded.
const HOP_BY_HOP_HEADERS: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
];

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Forwards plain HTTP requests to route backends.
#[derive(Clone)]
pub struct Forwarder {
    client: reqwest::Client,
}

impl Forwarder {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }

    pub async fn forward(&self, route: &Route, request: Request) -> Response<Body> {
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        match self.try_forward(route, request).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(
                    method = %method,
                    path = %path,
                    backend = %route.backend(),
                    error = %err,
                    "Proxy request failed"
                );
                bad_gateway(format!("Bad Gateway: {err}"))
            }
        }
    }

    async fn try_forward(&self, route: &Route, request: Request) -> Result<Response<Body>, reqwest::Error> {
        let (parts, body) = request.into_parts();
        let target = target_url(route.backend(), &parts.uri);

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        headers.remove(header::UPGRADE);
        // reqwest derives Host from the target URL.
        headers.remove(header::HOST);
        if let Some(ConnectInfo(remote)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
            append_forwarded_for(&mut headers, remote.ip());
        }

        let mut outbound = self.client.request(parts.method, target).headers(headers);
        if !body.is_end_stream() {
            outbound = outbound.body(reqwest::Body::wrap_stream(body.into_data_stream()));
        }

        let upstream = outbound.send().await?;

        let status = upstream.status();
        let mut response_headers = upstream.headers().clone();
        strip_hop_by_hop(&mut response_headers);

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = response_headers;
        Ok(response)
    }
}

/// Backend URL for a request: paths joined with a single slash, queries merged with `&`.
pub fn target_url(backend: &Url, uri: &Uri) -> Url {
    let mut target = backend.clone();
    target.set_path(&join_paths(backend.path(), uri.path()));

    let backend_query = backend.query().filter(|q| !q.is_empty());
    let request_query = uri.query().filter(|q| !q.is_empty());
    let query = match (backend_query, request_query) {
        (Some(b), Some(r)) => Some(format!("{b}&{r}")),
        (Some(q), None) | (None, Some(q)) => Some(q.to_string()),
        (None, None) => None,
    };
    target.set_query(query.as_deref());
    target
}

fn join_paths(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) => format!("{base}/{path}"),
        _ => format!("{base}{path}"),
    }
}

/// Remove hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|token| HeaderName::from_bytes(token.trim().as_bytes()).ok())
        .collect();
    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP_HEADERS.iter() {
        headers.remove(name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, client: std::net::IpAddr) {
    let value = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(prior) if !prior.is_empty() => format!("{prior}, {client}"),
        _ => client.to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_target_url_joins_paths() {
        let uri: Uri = "/api/users?id=7".parse().unwrap();
        assert_eq!(
            target_url(&url("http://127.0.0.1:9000"), &uri).as_str(),
            "http://127.0.0.1:9000/api/users?id=7"
        );
        assert_eq!(
            target_url(&url("http://127.0.0.1:9000/base/"), &uri).as_str(),
            "http://127.0.0.1:9000/base/api/users?id=7"
        );
        assert_eq!(
            target_url(&url("http://127.0.0.1:9000/base"), &uri).as_str(),
            "http://127.0.0.1:9000/base/api/users?id=7"
        );
    }

    #[test]
    fn test_target_url_merges_queries() {
        let uri: Uri = "/x?b=2".parse().unwrap();
        assert_eq!(
            target_url(&url("http://backend.local/?a=1"), &uri).as_str(),
            "http://backend.local/x?a=1&b=2"
        );

        let bare: Uri = "/x".parse().unwrap();
        assert_eq!(
            target_url(&url("http://backend.local/?a=1"), &bare).as_str(),
            "http://backend.local/x?a=1"
        );
    }

    #[test]
    fn test_strip_hop_by_hop_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-session"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-session", HeaderValue::from_static("abc"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("text/html"));

        strip_hop_by_hop(&mut headers);

        assert_eq!(headers.len(), 1);
        assert_eq!(headers[header::ACCEPT], "text/html");
    }

    #[test]
    fn test_forwarded_for_appends() {
        let mut headers = HeaderMap::new();
        append_forwarded_for(&mut headers, "10.0.0.1".parse().unwrap());
        assert_eq!(headers[X_FORWARDED_FOR], "10.0.0.1");

        append_forwarded_for(&mut headers, "10.0.0.2".parse().unwrap());
        assert_eq!(headers[X_FORWARDED_FOR], "10.0.0.1, 10.0.0.2");
    }
}
