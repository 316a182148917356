//! Append-only audit trail of publication/post state transitions.

use crate::error::StoreError;
use serde_json::Value;
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct AuditLogWriter {
    pool: SqlitePool,
}

impl AuditLogWriter {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a row. `meta` is stored as UTF-8 JSON; non-ASCII content (e.g.
    /// Cyrillic error text) is preserved rather than escaped.
    pub async fn log(
        &self,
        entity_type: &str,
        entity_id: i64,
        action: &str,
        meta: Value,
    ) -> Result<(), StoreError> {
        let now = bc_common::clock::now_utc_naive();
        let meta_text = serde_json::to_string(&meta)?;

        sqlx::query(
            "INSERT INTO audit_log (entity_type, entity_id, action, meta, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(entity_type)
        .bind(entity_id)
        .bind(action)
        .bind(meta_text)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
