use std::fs;
use std::sync::Arc;

use hearth::config::{Config, LoggingConfig};
use hearth::http::connection::{Connection, ServeContext};
use hearth::logging;
use hearth::static_files::DocumentRoot;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

// The subscriber is process-global, so everything lives in one test.
#[tokio::test]
async fn test_file_sink_receives_events() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("server.log");
    fs::write(&file, "previous run\n").unwrap();

    let cfg = LoggingConfig {
        level: "info".to_string(),
        file: file.clone(),
    };
    let guard = logging::init(&cfg).unwrap();
    assert!(guard.is_some());

    tracing::warn!(path = "/secret.txt", "Forbidden");
    tracing::trace!("below the configured level");

    // One full exchange: every header line is logged at the default level.
    let site = tempfile::tempdir().unwrap();
    fs::write(site.path().join("index.html"), "<h1>home</h1>").unwrap();
    let root = DocumentRoot::open(site.path()).unwrap();
    let ctx = Arc::new(ServeContext::new(root, &Config::default()));

    let (mut client, server) = tokio::io::duplex(64 * 1024);
    let handle = tokio::spawn(Connection::new(server, ctx).serve());
    client
        .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nUser-Agent: hearth-test\r\n\r\n")
        .await
        .unwrap();
    let mut out = Vec::new();
    client.read_to_end(&mut out).await.unwrap();
    handle.await.unwrap();
    drop(guard);

    let contents = fs::read_to_string(&file).unwrap();
    assert!(contents.starts_with("previous run\n"));
    assert!(contents.contains("WARN"));
    assert!(contents.contains("Forbidden"));
    assert!(contents.contains("path=\"/secret.txt\""));
    assert!(!contents.contains("below the configured level"));
    assert!(!contents.contains("\x1b["));

    assert!(contents.contains("Client connected"));
    assert!(contents.contains("GET / HTTP/1.1"));
    assert!(contents.contains("Host: localhost"));
    assert!(contents.contains("User-Agent: hearth-test"));
    assert!(contents.contains("Served file"));
    assert!(contents.contains("Client disconnected"));

    // A second subscriber cannot be installed.
    assert!(logging::init(&cfg).is_err());
}
