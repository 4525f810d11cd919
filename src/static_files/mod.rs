//! Document root handling.
//!
//! Everything that touches the served directory lives here: the
//! [`DocumentRoot`] security boundary, the path [`resolver`], the
//! [`template`] used for error pages and the startup [`scaffold`].

pub mod resolver;
pub mod scaffold;
pub mod template;

use std::io;
use std::path::{Path, PathBuf};

pub use resolver::{ResolvedResource, resolve};
pub use template::ErrorTemplate;

/// File served for `/` and for directory requests.
pub const INDEX_FILE: &str = "index.html";

/// Extensions the server is willing to serve. Anything else is 403.
pub const ALLOWED_EXTENSIONS: [&str; 7] = [".html", ".css", ".js", ".ico", ".png", ".jpg", ".gif"];

/// Checks an extension (with leading dot) against the allowlist, ignoring case.
pub fn is_allowed_extension(extension: &str) -> bool {
    ALLOWED_EXTENSIONS
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(extension))
}

/// The canonical directory files are served from.
///
/// Built once at startup and shared read-only by every connection.
#[derive(Debug, Clone)]
pub struct DocumentRoot {
    path: PathBuf,
}

impl DocumentRoot {
    /// Canonicalizes `path` and checks that it is a directory.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = std::fs::canonicalize(path.as_ref())?;
        if !path.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("document root {} is not a directory", path.display()),
            ));
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether `candidate` lies at or below the root.
    ///
    /// Compares whole components, so a sibling such as `/srv/www-old` never
    /// matches a root of `/srv/www`. Case is significant except on Windows,
    /// where `/srv/WWW` and `/srv/www` name the same directory.
    #[cfg(not(windows))]
    pub fn contains(&self, candidate: &Path) -> bool {
        candidate.starts_with(&self.path)
    }

    #[cfg(windows)]
    pub fn contains(&self, candidate: &Path) -> bool {
        let mut rest = candidate.components();
        self.path.components().all(|root_part| match rest.next() {
            Some(part) => part
                .as_os_str()
                .to_string_lossy()
                .eq_ignore_ascii_case(&root_part.as_os_str().to_string_lossy()),
            None => false,
        })
    }
}
