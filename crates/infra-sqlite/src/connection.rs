// SQLite Connection Pool Setup

use crate::error::map_sqlx_error;
use callq_core::error::{AppError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

const MAX_CONNECTIONS: u32 = 10;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

/// Create SQLite connection pool with WAL mode.
///
/// `key` is issued as `PRAGMA key` on every connection (SQLCipher builds
/// encrypt with it, plain SQLite ignores it). In-memory databases get a
/// single connection that is never recycled, so all callers share one
/// database.
pub async fn create_pool(database_url: &str, key: Option<&str>) -> Result<SqlitePool> {
    if !database_url.starts_with("sqlite:") {
        return Err(AppError::Config(format!(
            "Unsupported store URL (expected sqlite:...): {}",
            database_url
        )));
    }

    let mut options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| AppError::Config(format!("Invalid store URL: {}", e)))?
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT)
        .create_if_missing(true);

    if let Some(key) = key {
        options = options.pragma("key", format!("'{}'", key.replace('\'', "''")));
    }

    let pool_options = if is_in_memory(database_url) {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(MAX_CONNECTIONS)
    };

    let pool = pool_options
        .connect_with(options)
        .await
        .map_err(map_sqlx_error)?;

    debug!(in_memory = is_in_memory(database_url), "SQLite pool ready");
    Ok(pool)
}
