//! First-run setup of the document root.

use std::path::Path;

use anyhow::Context;
use tokio::fs;

use crate::static_files::{DocumentRoot, INDEX_FILE};

/// Page written into a fresh document root.
pub const DEFAULT_INDEX_HTML: &str = "<!DOCTYPE html>
<html lang=\"en\">
<head>
<meta charset=\"utf-8\">
<title>hearth</title>
</head>
<body>
<h1>It works!</h1>
<p>This page was created by hearth. Replace it with your own index.html.</p>
</body>
</html>
";

/// Makes sure the document root exists and has an index page.
///
/// Existing files are never overwritten.
pub async fn ensure_webroot(path: &Path) -> anyhow::Result<DocumentRoot> {
    fs::create_dir_all(path)
        .await
        .with_context(|| format!("creating document root {}", path.display()))?;

    let index = path.join(INDEX_FILE);
    if fs::metadata(&index).await.is_err() {
        fs::write(&index, DEFAULT_INDEX_HTML)
            .await
            .with_context(|| format!("writing {}", index.display()))?;
        tracing::info!(path = %index.display(), "Created default index page");
    }

    DocumentRoot::open(path)
        .with_context(|| format!("opening document root {}", path.display()))
}
