//! Maps request targets onto files below the document root.
//!
//! The checks run in a fixed order and that order decides the status code:
//!
//! 1. hidden/parent segments in the request are refused (403)
//! 2. the canonical path must stay inside the root (403)
//! 3. extensionless paths may pick up a `.html` sibling, directories their
//!    `index.html`
//! 4. the final extension must be allowlisted (403)
//! 5. the final path must be an existing file (404)
//!
//! Because 4 runs before 5, an existing file with a refused extension is a
//! 403 and never reveals whether it exists.

use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;

use crate::error::{ForbiddenReason, Rejection, ResolveError};
use crate::http::mime::mime_for;
use crate::static_files::{DocumentRoot, INDEX_FILE, is_allowed_extension};

/// A request target that passed every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedResource {
    /// Canonical path of the file to serve
    pub path: PathBuf,
    /// Lowercase extension with its leading dot (e.g. ".css")
    pub extension: String,
}

impl ResolvedResource {
    pub fn mime(&self) -> &'static str {
        mime_for(&self.extension)
    }
}

/// Resolves a raw request target against the document root.
///
/// Refusals come back as [`ResolveError::Rejected`]. The only other failure
/// is a permission error while checking the final file, which the caller
/// treats as an internal error. Any other lookup failure is a 404.
pub async fn resolve(
    root: &DocumentRoot,
    requested: &str,
) -> Result<ResolvedResource, ResolveError> {
    let target = strip_query(requested);
    let relative = if target == "/" {
        INDEX_FILE
    } else {
        target.strip_prefix('/').unwrap_or(target)
    };

    let decoded = urlencoding::decode(relative)
        .map_err(|_| Rejection::Forbidden(ForbiddenReason::MalformedPath))?;
    let normalized = decoded.replace('\\', "/");
    let segments: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();

    if let Some(bad) = segments.iter().find(|s| **s == ".." || s.starts_with('.')) {
        return Err(Rejection::Forbidden(ForbiddenReason::HiddenSegment(bad.to_string())).into());
    }

    let mut joined = root.path().to_path_buf();
    joined.extend(&segments);

    let canonical = canonicalize_lenient(&joined).await;
    if !root.contains(&canonical) {
        return Err(Rejection::Forbidden(ForbiddenReason::OutsideRoot).into());
    }

    let mut path = canonical;
    let mut extension = extension_of(&path);

    let sibling = html_sibling(&path);
    if extension.is_empty() && root.contains(&sibling) && is_file(&sibling).await {
        path = confine(root, &sibling).await?;
        extension = ".html".to_string();
    } else if is_dir(&path).await {
        let index = path.join(INDEX_FILE);
        if is_file(&index).await {
            path = confine(root, &index).await?;
            extension = ".html".to_string();
        }
    }

    if !is_allowed_extension(&extension) {
        return Err(Rejection::Forbidden(ForbiddenReason::DisallowedExtension(extension)).into());
    }

    // Only a permission problem is the server's fault; missing components,
    // overlong names and symlink loops all come from the requested path.
    match fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => {}
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => return Err(e.into()),
        _ => return Err(Rejection::NotFound.into()),
    }

    Ok(ResolvedResource { path, extension })
}

/// Drops the query string and fragment, which never name files.
fn strip_query(target: &str) -> &str {
    match target.find(['?', '#']) {
        Some(idx) => &target[..idx],
        None => target,
    }
}

/// Canonicalizes a path that may not exist yet.
///
/// The deepest existing ancestor is canonicalized (resolving any symlinks in
/// it) and the missing tail is appended unchanged.
async fn canonicalize_lenient(path: &Path) -> PathBuf {
    let mut existing = path;
    let mut tail: Vec<&OsStr> = Vec::new();

    loop {
        match fs::canonicalize(existing).await {
            Ok(mut canonical) => {
                canonical.extend(tail.iter().rev());
                return canonical;
            }
            Err(_) => match (existing.parent(), existing.file_name()) {
                (Some(parent), Some(name)) => {
                    tail.push(name);
                    existing = parent;
                }
                _ => return path.to_path_buf(),
            },
        }
    }
}

/// Re-canonicalizes a rewritten path, which may itself be a symlink.
async fn confine(root: &DocumentRoot, path: &Path) -> Result<PathBuf, Rejection> {
    let canonical = canonicalize_lenient(path).await;
    if root.contains(&canonical) {
        Ok(canonical)
    } else {
        Err(Rejection::Forbidden(ForbiddenReason::OutsideRoot))
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_ascii_lowercase()))
        .unwrap_or_default()
}

fn html_sibling(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".html");
    PathBuf::from(name)
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

async fn is_dir(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}
