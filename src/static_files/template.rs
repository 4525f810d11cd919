//! Error page rendering.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;

use crate::http::response::StatusCode;
use crate::static_files::DocumentRoot;

pub const CODE_TOKEN: &str = "{{ERROR_CODE}}";
pub const MESSAGE_TOKEN: &str = "{{ERROR_MESSAGE}}";
pub const DETAIL_TOKEN: &str = "{{ERROR_DETAIL}}";

/// Source of error page bodies.
///
/// The template file is read again for every error, so edits show up
/// without a restart. A missing or unreadable template falls back to a
/// small built-in page.
#[derive(Debug, Clone, Default)]
pub struct ErrorTemplate {
    path: Option<PathBuf>,
}

impl ErrorTemplate {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Always renders the built-in page.
    pub fn builtin() -> Self {
        Self { path: None }
    }

    /// The template named `file_name` at the top of the document root.
    pub fn in_root(root: &DocumentRoot, file_name: &str) -> Self {
        Self::new(root.path().join(file_name))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Renders the page for `status`. `detail` is plain text and is escaped.
    pub async fn render(&self, status: StatusCode, detail: &str) -> String {
        let detail = escape_html(detail);

        if let Some(path) = &self.path {
            match fs::read_to_string(path).await {
                Ok(template) => return fill(&template, status, &detail),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(
                        template = %path.display(),
                        error = %e,
                        "Error template unreadable, using built-in page"
                    );
                }
            }
        }

        builtin_page(status, &detail)
    }
}

/// Substitutes every occurrence of the three tokens.
pub fn fill(template: &str, status: StatusCode, detail: &str) -> String {
    template
        .replace(CODE_TOKEN, &status.as_u16().to_string())
        .replace(MESSAGE_TOKEN, status.reason_phrase())
        .replace(DETAIL_TOKEN, detail)
}

pub fn builtin_page(status: StatusCode, detail: &str) -> String {
    format!(
        "<h1>{} {}</h1><p>{}</p>",
        status.as_u16(),
        status.reason_phrase(),
        detail
    )
}

/// Escapes text for inclusion in HTML element content.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
