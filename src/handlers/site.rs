//! Mapping request paths onto the served directory.

use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;

/// The directory being served.
#[derive(Debug, Clone)]
pub struct SiteRoot {
    root: PathBuf,
}

impl SiteRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path for a request path, or `None` if it would leave the root.
    ///
    /// The path is percent-decoded and rebuilt component by component:
    /// empty and `.` components are skipped; `..`, backslashes and NUL bytes
    /// are rejected.
    pub fn resolve(&self, request_path: &str) -> Option<PathBuf> {
        let decoded = percent_decode_str(request_path).decode_utf8().ok()?;
        if decoded.contains('\\') || decoded.contains('\0') {
            return None;
        }

        let mut resolved = self.root.clone();
        for component in decoded.split('/') {
            match component {
                "" | "." => continue,
                ".." => return None,
                name => resolved.push(name),
            }
        }
        Some(resolved)
    }

    /// Decoded form of a request path, for display in listings.
    pub fn display_path(request_path: &str) -> String {
        percent_decode_str(request_path)
            .decode_utf8_lossy()
            .into_owned()
    }
}
