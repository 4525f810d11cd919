use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{Instrument, info};

use crate::config::ServerConfig;
use crate::http::connection::{Connection, ServeContext};

/// Pause after a failed `accept()` before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub async fn run(cfg: &ServerConfig, ctx: Arc<ServeContext>) -> anyhow::Result<()> {
    let addr = cfg.listen_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Listening on {}", addr);

    serve(listener, ctx, cfg.max_connections).await
}

/// Accept loop.
///
/// At most `max_connections` connections are handled at once. When the cap
/// is reached the loop stops accepting until a connection finishes, leaving
/// new clients waiting in the OS accept queue.
pub async fn serve(
    listener: TcpListener,
    ctx: Arc<ServeContext>,
    max_connections: usize,
) -> anyhow::Result<()> {
    let limit = Arc::new(Semaphore::new(max_connections.max(1)));
    let mut tasks = JoinSet::new();

    loop {
        let permit = Arc::clone(&limit).acquire_owned().await?;
        reap(&mut tasks);

        let (socket, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::error!(error = %e, "Failed to accept connection");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };

        let ctx = Arc::clone(&ctx);
        let span = tracing::info_span!("conn", %peer);
        tasks.spawn(
            async move {
                let _permit = permit;
                Connection::new(socket, ctx).serve().await;
            }
            .instrument(span),
        );
    }
}

/// Collects finished connection tasks and reports any that panicked.
fn reap(tasks: &mut JoinSet<()>) {
    while let Some(res) = tasks.try_join_next() {
        if let Err(e) = res {
            if e.is_panic() {
                tracing::error!(error = %e, "Connection task panicked");
            }
        }
    }
}
