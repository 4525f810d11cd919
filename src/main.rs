use std::sync::Arc;

use hearth::config::Config;
use hearth::http::connection::ServeContext;
use hearth::static_files::scaffold;
use hearth::{logging, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut cfg = Config::load()?;
    let _log_guard = logging::init(&cfg.logging)?;
    cfg.apply_args(std::env::args().skip(1));

    let root = scaffold::ensure_webroot(&cfg.static_files.root).await?;
    tracing::info!(root = %root.path().display(), "Serving document root");
    let ctx = Arc::new(ServeContext::new(root, &cfg));

    tokio::select! {
        res = server::listener::run(&cfg.server, ctx) => {
            res?;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
