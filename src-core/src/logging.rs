//! Logging bootstrap.
//!
//! Logs go to stderr and to a daily rolling file in the platform log
//! directory (see [`glance_types::logging::log_dir`]).

use glance_types::logging::{ensure_log_dir, LOG_FILE_PREFIX};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

fn default_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }))
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the default level. The returned guard flushes the
/// log file when dropped and must live as long as the process logs. If the
/// log directory cannot be created only stderr logging is installed and
/// `None` is returned.
pub fn init_logging(verbose: bool) -> Option<WorkerGuard> {
    let stderr = fmt::layer().with_writer(std::io::stderr).with_target(verbose);

    let dir = match ensure_log_dir() {
        Ok(dir) => dir,
        Err(e) => {
            let _ = tracing_subscriber::registry()
                .with(default_filter(verbose))
                .with(stderr)
                .try_init();
            tracing::warn!("Log directory unavailable, logging to stderr only: {}", e);
            return None;
        }
    };

    let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);
    let file = fmt::layer().with_writer(file_writer).with_ansi(false);

    let _ = tracing_subscriber::registry()
        .with(default_filter(verbose))
        .with(stderr)
        .with(file)
        .try_init();

    tracing::debug!("Logging to {:?}", dir);
    Some(guard)
}
