//! Error kinds shared by the request pipeline.

use thiserror::Error;

use crate::http::response::StatusCode;

/// Failures that end a connection.
///
/// The split decides what the handler does next: a transport error means the
/// peer is gone and nothing more can be written, an internal error still gets
/// a best-effort 500.
#[derive(Debug, Error)]
pub enum ServeError {
    /// The socket failed or the peer disconnected.
    #[error("transport error: {0}")]
    Transport(#[source] std::io::Error),

    /// Anything else that went wrong while producing a response.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServeError {
    pub fn is_transport(&self) -> bool {
        matches!(self, ServeError::Transport(_))
    }
}

/// Why the path resolver refused a request with 403.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForbiddenReason {
    /// A `..` segment or a segment starting with `.`
    #[error("hidden or parent segment `{0}`")]
    HiddenSegment(String),

    /// Percent-decoding produced bytes that are not UTF-8
    #[error("undecodable path")]
    MalformedPath,

    /// The canonical path escapes the document root
    #[error("path resolves outside the document root")]
    OutsideRoot,

    /// The final extension is not in the allowlist
    #[error("extension `{0}` is not allowed")]
    DisallowedExtension(String),
}

/// Outcome of a refused path resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("forbidden: {0}")]
    Forbidden(ForbiddenReason),

    #[error("not found")]
    NotFound,
}

impl Rejection {
    pub fn status(&self) -> StatusCode {
        match self {
            Rejection::Forbidden(_) => StatusCode::Forbidden,
            Rejection::NotFound => StatusCode::NotFound,
        }
    }
}

/// Result of a failed resolution: either a refusal or an unexpected
/// filesystem error that becomes a 500.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
}
