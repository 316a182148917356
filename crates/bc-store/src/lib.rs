//! Durable store for the publication queue.
//!
//! The store *is* the queue: there is no in-memory work list. Claiming a row
//! is a single conditional `UPDATE ... WHERE status IN (...)`, which is the
//! only mutual-exclusion primitive the worker relies on.

pub mod audit;
pub mod error;
pub mod recovery;
pub mod repository;
pub mod sqlite;

pub use audit::AuditLogWriter;
pub use error::StoreError;
pub use recovery::{RecoveryConfig, RecoveryTask};
pub use repository::PublicationRepository;
pub use sqlite::SqlitePublicationRepository;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;

/// Open a SQLite pool with the journaling discipline the worker needs:
/// WAL mode, `synchronous=NORMAL`, and a generous busy-timeout so that
/// concurrent claims back off instead of failing outright.
pub async fn connect(uri: &str, busy_timeout_seconds: u64, max_connections: u32) -> Result<SqlitePool, StoreError> {
    let options = SqliteConnectOptions::from_str(uri)
        .map_err(|e| StoreError::Connect(e.to_string()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(busy_timeout_seconds));

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .map_err(|e| StoreError::Connect(e.to_string()))?;

    Ok(pool)
}
