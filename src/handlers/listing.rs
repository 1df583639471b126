//! Generated directory listings.

use std::io;
use std::path::Path;

use axum::body::Body;
use axum::http::Response;

use crate::handlers::content;
use crate::handlers::site::SiteRoot;
use crate::markdown::escape_html;

/// One directory entry as shown in a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Read a directory's entries, sorted case-insensitively by name.
pub async fn read_entries(directory: &Path) -> io::Result<Vec<ListingEntry>> {
    let mut reader = tokio::fs::read_dir(directory).await?;
    let mut entries = Vec::new();
    while let Some(entry) = reader.next_entry().await? {
        // Follows symlinks, like the file handlers do.
        let is_dir = tokio::fs::metadata(entry.path())
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false);
        entries.push(ListingEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            is_dir,
        });
    }
    entries.sort_by_key(|entry| entry.name.to_lowercase());
    Ok(entries)
}

/// Listing page response for a directory reached via `request_path`.
pub async fn respond(directory: &Path, request_path: &str) -> io::Result<Response<Body>> {
    let entries = read_entries(directory).await?;
    Ok(content::html(render(&SiteRoot::display_path(request_path), &entries)))
}

/// Render the listing page for `display_path` (the decoded request path).
pub fn render(display_path: &str, entries: &[ListingEntry]) -> String {
    let title = escape_html(display_path);
    let mut page = String::with_capacity(256 + entries.len() * 64);
    page.push_str("<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\"><title>Index of ");
    page.push_str(&title);
    page.push_str("</title></head><body><h1>Index of ");
    page.push_str(&title);
    page.push_str("</h1><ul>");

    for entry in entries {
        let mut label = entry.name.clone();
        if entry.is_dir {
            label.push('/');
        }
        let mut link = join_link(display_path, &entry.name);
        if entry.is_dir && !link.ends_with('/') {
            link.push('/');
        }
        page.push_str("<li><a href=\"");
        page.push_str(&escape_html(&link));
        page.push_str("\">");
        page.push_str(&escape_html(&label));
        page.push_str("</a></li>");
    }

    page.push_str("</ul></body></html>");
    page
}

fn join_link(base: &str, name: &str) -> String {
    if base.ends_with('/') {
        format!("{base}{name}")
    } else {
        format!("{base}/{name}")
    }
}
