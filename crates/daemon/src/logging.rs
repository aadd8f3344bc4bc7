//! Logging setup
//!
//! `RUST_LOG` filter (default `callq=info,tower_http=info`), JSON lines when
//! `CALLQ_LOG_FORMAT=json`, and an optional daily-rolling file under
//! `CALLQ_LOG_DIR`.

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "callq=info,tower_http=info";
const LOG_FILE_PREFIX: &str = "callq.log";

/// Install the global subscriber. Keep the returned guard alive until exit
/// or buffered file lines are lost.
pub fn init_logging() -> Result<Option<WorkerGuard>> {
    let log_format = std::env::var("CALLQ_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))
        .context("Failed to create env filter")?;

    let (file_layer, guard) = match std::env::var("CALLQ_LOG_DIR") {
        Ok(dir) if !dir.trim().is_empty() => {
            let dir = shellexpand::tilde(dir.trim()).into_owned();
            let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().json().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        _ => (None, None),
    };

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer);

    match log_format.as_str() {
        "json" => {
            // Production: JSON structured logging
            registry.with(fmt::layer().json()).init();
        }
        _ => {
            // Development: Pretty formatting with colors
            registry.with(fmt::layer().pretty()).init();
        }
    }

    Ok(guard)
}
