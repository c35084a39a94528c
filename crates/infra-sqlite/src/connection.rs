// SQLite Connection Pool Setup

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

/// Create SQLite connection pool with WAL mode
///
/// In-memory databases are private to a connection, so they get a single
/// connection that is never recycled.
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, Box<dyn std::error::Error>> {
    let in_memory = database_url.contains(":memory:");

    let mut options = SqliteConnectOptions::from_str(database_url)?
        .busy_timeout(Duration::from_secs(5))
        .create_if_missing(true);
    if !in_memory {
        options = options.journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);
    }

    let mut pool_options = SqlitePoolOptions::new();
    pool_options = if in_memory {
        pool_options
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        pool_options.max_connections(10)
    };

    let pool = pool_options
        .connect_with(options)
        .await
        .map_err(|e| stella_core::error::AppError::Database(e.to_string()))?;

    Ok(pool)
}
