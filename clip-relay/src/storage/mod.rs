//! Storage handle for cliplink-relay.
//!
//! [`Database`] is opened once at startup and cloned into every component;
//! nothing reaches the pool through global state.

mod schema;

use crate::config::StorageConfig;
use crate::error::{StorageError, StorageResult};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// SQLite-backed storage handle.
///
/// Uses WAL mode for concurrent reads/writes. Cloning is cheap (shared pool).
#[derive(Clone, Debug)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if missing) the database file named in `config`.
    pub async fn open(config: &StorageConfig) -> StorageResult<Self> {
        if config.database.as_os_str().is_empty() || config.database.is_dir() {
            return Err(StorageError::InvalidPath {
                path: config.database.clone(),
            });
        }

        let options = SqliteConnectOptions::new()
            .filename(&config.database)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .connect_with(options)
            .await?;

        let db = Self { pool };
        schema::run_migrations(&db.pool).await?;
        tracing::info!(path = %config.database.display(), "database opened");
        Ok(db)
    }

    /// Create an in-memory database (for testing).
    ///
    /// Single connection: every `:memory:` connection is its own database.
    pub async fn in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str(":memory:")?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        schema::run_migrations(&db.pool).await?;
        Ok(db)
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Delete every row from every table, keeping the schema.
    pub async fn clear(&self) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;
        for table in schema::TABLES {
            sqlx::query(&format!("DELETE FROM {table}"))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        tracing::info!("database cleared");
        Ok(())
    }

    /// Close the pool, waiting for connections to be returned.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Map a decode failure of a stored column to [`StorageError::Corrupt`].
pub(crate) fn corrupt<E: std::fmt::Display>(table: &'static str) -> impl Fn(E) -> StorageError {
    move |err| StorageError::Corrupt {
        table,
        reason: err.to_string(),
    }
}

/// Current time as Unix epoch milliseconds.
pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
