//! Structured Logger
//!
//! Wraps `tracing` with a human-readable stderr layer and, when a log
//! directory is configured, a daily-rotated NDJSON file layer. Stdout is
//! left alone because `docintake run` streams session events there.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Keeps the background file writer alive. Drop it last in `main`.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Initialize the global logger.
///
/// `RUST_LOG` wins over `level` when set. Calling this twice is harmless:
/// the second subscriber is discarded.
pub fn init_logger(log_dir: Option<&Path>, level: &str) -> LogGuard {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            // `docintake.log.YYYY-MM-DD`
            let appender = RollingFileAppender::new(Rotation::DAILY, dir, "docintake.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().json().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(true);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    LogGuard { _file: guard }
}
