//! Extension to content-type mapping.

/// Content type for anything not in the table.
pub const DEFAULT_MIME: &str = "application/octet-stream";

/// Returns the content type for a file extension.
///
/// Matching is case-insensitive and the leading dot is optional.
///
/// ```
/// # use hearth::http::mime::mime_for;
/// assert_eq!(mime_for(".HTML"), "text/html; charset=utf-8");
/// assert_eq!(mime_for("png"), "image/png");
/// assert_eq!(mime_for(".exe"), "application/octet-stream");
/// ```
pub fn mime_for(extension: &str) -> &'static str {
    let ext = extension.trim_start_matches('.').to_ascii_lowercase();
    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" => "text/javascript; charset=utf-8",
        "ico" => "image/x-icon",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        _ => DEFAULT_MIME,
    }
}
