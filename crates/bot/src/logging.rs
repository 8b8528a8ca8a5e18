use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

const LOG_FILE_PREFIX: &str = "funding-renew.log";
const DEFAULT_FILTER: &str = "funding_renew_bot=info,warn";

/// `RUST_LOG` when set and valid, otherwise [`DEFAULT_FILTER`].
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global tracing subscriber: one JSON line per event in a
/// daily-rolling file under `log_dir`, and compact lines on stderr.
///
/// The returned [`WorkerGuard`] must outlive the run; dropping it flushes the
/// file writer.
pub fn init_tracing(logging: &LoggingConfig) -> Result<WorkerGuard> {
    std::fs::create_dir_all(&logging.log_dir)
        .with_context(|| format!("creating log dir {}", logging.log_dir))?;

    let (file_writer, guard) = tracing_appender::non_blocking(
        tracing_appender::rolling::daily(&logging.log_dir, LOG_FILE_PREFIX),
    );

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .json();
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter())
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .context("installing tracing subscriber")?;

    Ok(guard)
}
