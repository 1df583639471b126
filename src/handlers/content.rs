//! Responses for generated content (rendered Markdown, listings).

use std::time::SystemTime;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Response, StatusCode};
use chrono::{DateTime, Utc};

pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// HTML response with no freshness information.
pub fn html(body: String) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(HTML_CONTENT_TYPE));
    response
}

/// HTML response whose freshness follows `modified`.
///
/// A request carrying `If-Modified-Since` at or after `modified` (second
/// precision) gets `304 Not Modified` with no body.
pub fn html_with_modified(request_headers: &HeaderMap, body: String, modified: SystemTime) -> Response<Body> {
    let modified: DateTime<Utc> = modified.into();
    let last_modified = modified.format(HTTP_DATE_FORMAT).to_string();

    if not_modified_since(request_headers, modified) {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NOT_MODIFIED;
        if let Ok(value) = HeaderValue::from_str(&last_modified) {
            response.headers_mut().insert(header::LAST_MODIFIED, value);
        }
        return response;
    }

    let mut response = html(body);
    if let Ok(value) = HeaderValue::from_str(&last_modified) {
        response.headers_mut().insert(header::LAST_MODIFIED, value);
    }
    response
}

fn not_modified_since(request_headers: &HeaderMap, modified: DateTime<Utc>) -> bool {
    let Some(since) = request_headers
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| DateTime::parse_from_rfc2822(value).ok())
    else {
        return false;
    };
    modified.timestamp() <= since.timestamp()
}
