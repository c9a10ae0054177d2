//! SQLite connection pool for the issue store.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::config::Config;

/// Open the issue database named in `config`, creating it when missing.
///
/// Change rows reference their issue, so foreign keys are switched on for
/// every connection. Concurrent digests of different reports wait on the
/// write lock instead of failing immediately.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = &config.db.path;
    if db_path.as_os_str().is_empty() {
        bail!("db.path must not be empty");
    }
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create database directory: {}", parent.display()))?;
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(30))
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open issue database: {}", db_path.display()))
}
