//! Full request/response exchanges over an in-memory stream.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use hearth::config::Config;
use hearth::http::connection::{Connection, ServeContext};
use hearth::static_files::scaffold::{DEFAULT_INDEX_HTML, ensure_webroot};
use hearth::static_files::{DocumentRoot, ErrorTemplate};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

struct Parsed {
    status_line: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Parsed {
    fn from_bytes(raw: &[u8]) -> Self {
        let split = raw
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .expect("response has no header terminator");
        let head = std::str::from_utf8(&raw[..split]).unwrap();
        let mut lines = head.split("\r\n");
        let status_line = lines.next().unwrap().to_string();
        let headers = lines
            .map(|l| {
                let (k, v) = l.split_once(": ").unwrap();
                (k.to_string(), v.to_string())
            })
            .collect();

        Self {
            status_line,
            headers,
            body: raw[split + 4..].to_vec(),
        }
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

fn context(root: DocumentRoot) -> Arc<ServeContext> {
    Arc::new(ServeContext::new(root, &Config::default()))
}

fn site() -> (TempDir, Arc<ServeContext>) {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("index.html"), "<h1>home</h1>").unwrap();
    fs::write(dir.path().join("secret.txt"), "secret").unwrap();
    let root = DocumentRoot::open(dir.path()).unwrap();
    (dir, context(root))
}

async fn exchange(ctx: Arc<ServeContext>, request: &[u8]) -> Vec<u8> {
    let (mut client, server) = tokio::io::duplex(64 * 1024);
    let handle = tokio::spawn(Connection::new(server, ctx).serve());

    client.write_all(request).await.unwrap();
    let mut out = Vec::new();
    client.read_to_end(&mut out).await.unwrap();

    handle.await.unwrap();
    out
}

async fn get(ctx: Arc<ServeContext>, path: &str) -> Parsed {
    let request = format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", path);
    Parsed::from_bytes(&exchange(ctx, request.as_bytes()).await)
}

#[tokio::test]
async fn test_get_root_on_scaffolded_webroot() {
    let dir = tempfile::tempdir().unwrap();
    let root = ensure_webroot(&dir.path().join("webroot")).await.unwrap();

    let resp = get(context(root), "/").await;

    assert_eq!(resp.status_line, "HTTP/1.1 200 OK");
    assert_eq!(
        resp.headers,
        vec![
            (
                "Content-Type".to_string(),
                "text/html; charset=utf-8".to_string()
            ),
            (
                "Content-Length".to_string(),
                DEFAULT_INDEX_HTML.len().to_string()
            ),
            ("Connection".to_string(), "close".to_string()),
        ]
    );
    assert_eq!(resp.body, DEFAULT_INDEX_HTML.as_bytes());
}

#[tokio::test]
async fn test_traversal_is_forbidden() {
    let (_dir, ctx) = site();
    let resp = get(ctx, "/../../etc/passwd").await;

    assert_eq!(resp.status_line, "HTTP/1.1 403 Forbidden");
    assert_eq!(resp.header("Content-Type"), Some("text/html; charset=utf-8"));
    assert_eq!(resp.header("Connection"), Some("close"));
    assert!(resp.body_text().contains("<h1>403 Forbidden</h1>"));
}

#[tokio::test]
async fn test_missing_stylesheet_is_not_found() {
    let (_dir, ctx) = site();
    let resp = get(ctx, "/style.css").await;

    assert_eq!(resp.status_line, "HTTP/1.1 404 Not Found");
    let body = resp.body_text();
    assert!(body.contains("<h1>404 Not Found</h1>"));
    assert!(body.contains("/style.css"));
    assert_eq!(resp.header("Content-Length"), Some(resp.body.len().to_string().as_str()));
}

#[tokio::test]
async fn test_post_is_method_not_allowed() {
    let (_dir, ctx) = site();
    let raw = exchange(ctx, b"POST /index.html HTTP/1.1\r\nContent-Length: 0\r\n\r\n").await;
    let resp = Parsed::from_bytes(&raw);

    assert_eq!(resp.status_line, "HTTP/1.1 405 Method Not Allowed");
    assert!(resp.body_text().contains("405 Method Not Allowed"));
}

#[tokio::test]
async fn test_head_and_unknown_methods_are_not_allowed() {
    for method in ["HEAD", "DELETE", "get", "BREW"] {
        let (_dir, ctx) = site();
        let request = format!("{} / HTTP/1.1\r\n\r\n", method);
        let resp = Parsed::from_bytes(&exchange(ctx, request.as_bytes()).await);
        assert_eq!(resp.status_line, "HTTP/1.1 405 Method Not Allowed", "{method}");
    }
}

#[tokio::test]
async fn test_error_template_substitution() {
    let (dir, ctx) = site();
    fs::write(
        dir.path().join("error.html"),
        "<html><title>{{ERROR_CODE}}</title><h1>{{ERROR_MESSAGE}}</h1><p>{{ERROR_DETAIL}}</p></html>",
    )
    .unwrap();

    let resp = get(ctx, "/missing.css").await;

    assert_eq!(resp.status_line, "HTTP/1.1 404 Not Found");
    assert_eq!(
        resp.body_text(),
        "<html><title>404</title><h1>Not Found</h1>\
         <p>The requested resource &#39;/missing.css&#39; was not found on this server.</p></html>"
    );
    assert_eq!(resp.header("Content-Type"), Some("text/html; charset=utf-8"));
}

#[tokio::test]
async fn test_error_template_is_reread_each_time() {
    let (dir, ctx) = site();
    let template = dir.path().join("error.html");

    fs::write(&template, "first {{ERROR_CODE}}").unwrap();
    let resp = get(Arc::clone(&ctx), "/nope.css").await;
    assert_eq!(resp.body_text(), "first 404");

    fs::write(&template, "second {{ERROR_CODE}}").unwrap();
    let resp = get(Arc::clone(&ctx), "/nope.css").await;
    assert_eq!(resp.body_text(), "second 404");

    fs::remove_file(&template).unwrap();
    let resp = get(ctx, "/nope.css").await;
    assert!(resp.body_text().starts_with("<h1>404 Not Found</h1>"));
}

#[tokio::test]
async fn test_existing_disallowed_file_is_forbidden() {
    let (_dir, ctx) = site();
    let resp = get(ctx, "/secret.txt").await;

    assert_eq!(resp.status_line, "HTTP/1.1 403 Forbidden");
    assert!(!resp.body_text().contains("secret\n"));
}

#[tokio::test]
async fn test_malformed_request_line_is_bad_request() {
    let (_dir, ctx) = site();
    let resp = Parsed::from_bytes(&exchange(ctx, b"GARBAGE\r\nHost: x\r\n\r\n").await);

    assert_eq!(resp.status_line, "HTTP/1.1 400 Bad Request");
    assert!(resp.body_text().contains("The request line could not be parsed."));
}

#[tokio::test]
async fn test_two_token_request_line_is_bad_request() {
    let (_dir, ctx) = site();
    let resp = Parsed::from_bytes(&exchange(ctx, b"GET /index.html\r\n\r\n").await);

    assert_eq!(resp.status_line, "HTTP/1.1 400 Bad Request");
}

#[tokio::test]
async fn test_non_utf8_request_line_is_bad_request() {
    let (_dir, ctx) = site();
    let resp = Parsed::from_bytes(&exchange(ctx, b"GET /\xff\xfe HTTP/1.1\r\n\r\n").await);

    assert_eq!(resp.status_line, "HTTP/1.1 400 Bad Request");
}

#[tokio::test]
async fn test_empty_request_line_gets_no_response() {
    let (_dir, ctx) = site();
    let raw = exchange(ctx, b"\r\n").await;

    assert!(raw.is_empty());
}

#[tokio::test]
async fn test_immediate_close_gets_no_response() {
    let (_dir, ctx) = site();
    let (mut client, server) = tokio::io::duplex(1024);
    let handle = tokio::spawn(Connection::new(server, ctx).serve());

    client.shutdown().await.unwrap();
    let mut out = Vec::new();
    client.read_to_end(&mut out).await.unwrap();
    handle.await.unwrap();

    assert!(out.is_empty());
}

#[tokio::test]
async fn test_headers_without_blank_line_until_eof() {
    let (_dir, ctx) = site();
    let (mut client, server) = tokio::io::duplex(64 * 1024);
    let handle = tokio::spawn(Connection::new(server, ctx).serve());

    client.write_all(b"GET / HTTP/1.1\r\nHost: x\r\n").await.unwrap();
    client.shutdown().await.unwrap();
    let mut out = Vec::new();
    client.read_to_end(&mut out).await.unwrap();
    handle.await.unwrap();

    let resp = Parsed::from_bytes(&out);
    assert_eq!(resp.status_line, "HTTP/1.1 200 OK");
    assert_eq!(resp.body, b"<h1>home</h1>");
}

#[tokio::test]
async fn test_repeated_gets_are_identical() {
    let (_dir, ctx) = site();
    let request = b"GET /index.html HTTP/1.1\r\nHost: localhost\r\n\r\n";

    let first = exchange(Arc::clone(&ctx), request).await;
    let second = exchange(Arc::clone(&ctx), request).await;
    let third = exchange(ctx, request).await;

    assert!(!first.is_empty());
    assert_eq!(first, second);
    assert_eq!(second, third);
}

#[tokio::test]
async fn test_content_length_matches_file_bytes() {
    let dir = tempfile::tempdir().unwrap();
    // Larger than the duplex buffer so the body is written in pieces.
    let image: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    fs::write(dir.path().join("big.png"), &image).unwrap();
    let ctx = context(DocumentRoot::open(dir.path()).unwrap());

    let resp = get(ctx, "/big.png").await;

    assert_eq!(resp.status_line, "HTTP/1.1 200 OK");
    assert_eq!(resp.header("Content-Type"), Some("image/png"));
    assert_eq!(resp.header("Content-Length"), Some("200000"));
    assert_eq!(resp.body.len(), image.len());
    assert_eq!(resp.body, image);
}

#[tokio::test]
async fn test_detail_is_html_escaped() {
    let (_dir, ctx) = site();
    let resp = get(ctx, "/<script>.css").await;

    assert_eq!(resp.status_line, "HTTP/1.1 404 Not Found");
    let body = resp.body_text();
    assert!(body.contains("&lt;script&gt;.css"));
    assert!(!body.contains("<script>"));
}

fn tight_context(dir: &TempDir) -> Arc<ServeContext> {
    let root = DocumentRoot::open(dir.path()).unwrap();
    Arc::new(ServeContext {
        template: ErrorTemplate::in_root(&root, "error.html"),
        root,
        read_timeout: Duration::from_millis(200),
        max_line: 64,
    })
}

#[tokio::test]
async fn test_overlong_request_line_is_bad_request() {
    let (dir, _) = site();
    let ctx = tight_context(&dir);
    let request = format!("GET /{} HTTP/1.1\r\n\r\n", "a".repeat(200));

    let resp = Parsed::from_bytes(&exchange(ctx, request.as_bytes()).await);

    assert_eq!(resp.status_line, "HTTP/1.1 400 Bad Request");
    assert!(resp.body_text().contains("The request line is too long."));
}

#[tokio::test]
async fn test_overlong_header_is_bad_request() {
    let (dir, _) = site();
    let ctx = tight_context(&dir);
    let request = format!("GET / HTTP/1.1\r\nX-Big: {}\r\n\r\n", "b".repeat(200));

    let resp = Parsed::from_bytes(&exchange(ctx, request.as_bytes()).await);

    assert_eq!(resp.status_line, "HTTP/1.1 400 Bad Request");
    assert!(resp.body_text().contains("header line is too long"));
}

#[tokio::test]
async fn test_slow_client_times_out_without_response() {
    let (dir, _) = site();
    let ctx = tight_context(&dir);
    let (mut client, server) = tokio::io::duplex(1024);
    let handle = tokio::spawn(Connection::new(server, ctx).serve());

    // Request line but never the blank line that ends the headers.
    client.write_all(b"GET / HTTP/1.1\r\n").await.unwrap();
    let mut out = Vec::new();
    client.read_to_end(&mut out).await.unwrap();
    handle.await.unwrap();

    assert!(out.is_empty());
}

#[tokio::test]
async fn test_peer_gone_before_response_is_handled() {
    let (_dir, ctx) = site();
    let (mut client, server) = tokio::io::duplex(64 * 1024);

    client
        .write_all(b"GET /index.html HTTP/1.1\r\n\r\n")
        .await
        .unwrap();
    drop(client);

    // The request is still buffered, but the response has nowhere to go.
    tokio::time::timeout(Duration::from_secs(5), Connection::new(server, ctx).serve())
        .await
        .expect("serve should return once the write fails");
}

#[cfg(unix)]
mod internal_errors {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    /// A directory whose entries cannot be looked up. `None` when the tests
    /// run with privileges that bypass permission bits.
    fn locked_dir(dir: &TempDir) -> Option<PathBuf> {
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::write(locked.join("app.css"), "a{}").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        if fs::read_dir(&locked).is_ok() {
            unlock(&locked);
            return None;
        }
        Some(locked)
    }

    fn unlock(path: &Path) {
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[tokio::test]
    async fn test_unexpected_io_error_is_internal_server_error() {
        let (dir, ctx) = site();
        fs::write(
            dir.path().join("error.html"),
            "<title>{{ERROR_CODE}}</title><h1>{{ERROR_MESSAGE}}</h1><p>{{ERROR_DETAIL}}</p>",
        )
        .unwrap();
        let Some(locked) = locked_dir(&dir) else {
            return;
        };

        let resp = get(ctx, "/locked/app.css").await;
        unlock(&locked);

        assert_eq!(resp.status_line, "HTTP/1.1 500 Internal Server Error");
        assert_eq!(resp.header("Content-Type"), Some("text/html; charset=utf-8"));
        assert_eq!(resp.header("Connection"), Some("close"));
        assert_eq!(
            resp.body_text(),
            "<title>500</title><h1>Internal Server Error</h1>\
             <p>The server encountered an unexpected error.</p>"
        );
        assert_eq!(
            resp.header("Content-Length"),
            Some(resp.body.len().to_string().as_str())
        );
    }

    #[tokio::test]
    async fn test_failed_internal_error_response_is_not_propagated() {
        let (dir, ctx) = site();
        let Some(locked) = locked_dir(&dir) else {
            return;
        };
        let (mut client, server) = tokio::io::duplex(64 * 1024);

        client
            .write_all(b"GET /locked/app.css HTTP/1.1\r\n\r\n")
            .await
            .unwrap();
        drop(client);

        let finished =
            tokio::time::timeout(Duration::from_secs(5), Connection::new(server, ctx).serve())
                .await;
        unlock(&locked);

        assert!(finished.is_ok(), "serve should return after the 500 fails to send");
    }
}
