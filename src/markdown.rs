//! Markdown to HTML conversion.
//!
//! GitHub-flavoured extensions (tables, strikethrough, task lists,
//! footnotes) with every soft line break rendered as a hard break.

use std::path::Path;

use pulldown_cmark::{html, Event, Options, Parser};
use pulldown_cmark_escape::escape_html as write_escaped;

/// Render Markdown source to an HTML fragment. Never fails.
pub fn to_html(source: &str) -> String {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_FOOTNOTES;

    let parser = Parser::new_ext(source, options).map(|event| match event {
        Event::SoftBreak => Event::HardBreak,
        other => other,
    });

    let mut rendered = String::with_capacity(source.len() + source.len() / 2);
    html::push_html(&mut rendered, parser);
    rendered
}

/// Wrap a rendered fragment in a minimal HTML document.
pub fn document(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\"><title>{}</title></head><body>{}</body></html>",
        escape_html(title),
        body
    )
}

/// Escape text for HTML element content and quoted attribute values.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    // Writing into a String cannot fail.
    let _ = write_escaped(&mut escaped, text);
    escaped
}

/// Whether a file name has a `.md` extension (any case).
pub fn is_markdown_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("md"))
        .unwrap_or(false)
}

/// Document title: the file's base name without its extension.
pub fn title_for(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soft_breaks_become_hard_breaks() {
        let html = to_html("line one\nline two");
        assert!(html.contains("line one<br />"));
    }

    #[test]
    fn test_gfm_tables_and_strikethrough() {
        let html = to_html("| a | b |\n|---|---|\n| 1 | 2 |\n\n~~gone~~");
        assert!(html.contains("<table>"));
        assert!(html.contains("<del>gone</del>"));
    }

    #[test]
    fn test_document_escapes_title() {
        let doc = document("<notes>", "<p>x</p>");
        assert!(doc.starts_with("<!DOCTYPE html><html lang=\"en\">"));
        assert!(doc.contains("<title>&lt;notes&gt;</title>"));
        assert!(doc.ends_with("<body><p>x</p></body></html>"));
    }

    #[test]
    fn test_escape_html_covers_attribute_quotes() {
        assert_eq!(escape_html(r#"a "b" & 'c'"#), "a &quot;b&quot; &amp; &#39;c&#39;");
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_markdown_detection_and_title() {
        assert!(is_markdown_file(Path::new("README.MD")));
        assert!(!is_markdown_file(Path::new("index.html")));
        assert_eq!(title_for(Path::new("docs/Guide.md")), "Guide");
    }
}
