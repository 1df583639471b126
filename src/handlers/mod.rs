//! Request handling stages for the served directory.
//!
//! Each stage implements [`crate::http::pipeline::Interceptor`]; the
//! pipeline runs them in order and falls back to [`StaticFiles`].

pub mod browse;
pub mod content;
pub mod guard;
pub mod initial_file;
pub mod listing;
pub mod markdown;
pub mod site;
pub mod static_files;

pub use browse::BrowseHandler;
pub use guard::DirectoryGuard;
pub use initial_file::InitialFileRewrite;
pub use markdown::MarkdownHandler;
pub use site::SiteRoot;
pub use static_files::StaticFiles;
