//! Log sink setup.
//!
//! Handlers only emit `tracing` events. Formatted lines for the log file are
//! sent over a channel to a single writer thread owned by `tracing-appender`,
//! so concurrent connections never interleave mid-line and never wait on the
//! file. Console output goes through the regular `fmt` layer.

use std::fs::OpenOptions;

use tracing_appender::non_blocking::{NonBlockingBuilder, WorkerGuard};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingConfig;

/// Installs the global subscriber.
///
/// The returned guard flushes the file writer when dropped and must be kept
/// alive for as long as the server runs. `None` means the log file could not
/// be opened and only console logging is active; that failure is reported on
/// stderr and is not fatal.
pub fn init(cfg: &LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&cfg.level))?;

    let file = match OpenOptions::new().create(true).append(true).open(&cfg.file) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!(
                "failed to open log file {}: {}; logging to console only",
                cfg.file.display(),
                e
            );
            None
        }
    };

    let (file_layer, guard) = match file {
        Some(file) => {
            let (writer, guard) = NonBlockingBuilder::default().lossy(false).finish(file);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_level(true))
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}
