//! SQLite implementation of [`PublicationRepository`].

use crate::error::StoreError;
use crate::repository::PublicationRepository;
use async_trait::async_trait;
use bc_common::{
    BlacklistRule, BlacklistRuleType, Channel, Post, PostStatus, Publication, PublicationStatus,
};
use chrono::NaiveDateTime;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

pub struct SqlitePublicationRepository {
    pool: SqlitePool,
}

impl SqlitePublicationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn parse_publication(row: &sqlx::sqlite::SqliteRow) -> Result<Publication, StoreError> {
        let status_text: String = row.try_get("status")?;
        let status = PublicationStatus::from_str(&status_text)
            .map_err(StoreError::NotFound)?;

        Ok(Publication {
            id: row.try_get("id")?,
            post_id: row.try_get("post_id")?,
            planned_at: row.try_get("planned_at")?,
            ready_at: row.try_get("ready_at")?,
            status,
            attempts: row.try_get("attempts")?,
            locked_at: row.try_get("locked_at")?,
            locked_by: row.try_get("locked_by")?,
            message_id: row.try_get("message_id")?,
            sent_at: row.try_get("sent_at")?,
            last_error: row.try_get("last_error")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn parse_post(row: &sqlx::sqlite::SqliteRow) -> Result<Post, StoreError> {
        let status_text: String = row.try_get("status")?;
        let status = PostStatus::from_str(&status_text).map_err(StoreError::NotFound)?;

        let blacklist_check_status_text: String = row.try_get("blacklist_check_status")?;
        let blacklist_check_status = match blacklist_check_status_text.as_str() {
            "blocked" => bc_common::BlacklistCheckStatus::Blocked,
            _ => bc_common::BlacklistCheckStatus::Ok,
        };

        let media_json: String = row.try_get("media")?;
        let buttons_json: String = row.try_get("buttons")?;
        let options_json: String = row.try_get("options")?;

        Ok(Post {
            id: row.try_get("id")?,
            channel_id: row.try_get("channel_id")?,
            title: row.try_get("title")?,
            body_html: row.try_get("body_html")?,
            media: serde_json::from_str(&media_json)?,
            buttons: serde_json::from_str(&buttons_json)?,
            options: serde_json::from_str(&options_json)?,
            blacklist_check_status,
            blacklist_reason: row.try_get("blacklist_reason")?,
            status,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn parse_channel(row: &sqlx::sqlite::SqliteRow) -> Result<Channel, StoreError> {
        Ok(Channel {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            destination: row.try_get("destination")?,
            credential_token: row.try_get("credential_token")?,
            timezone: row.try_get("timezone")?,
            daily_time: row.try_get("daily_time")?,
            allowed_window_start: row.try_get("allowed_window_start")?,
            allowed_window_end: row.try_get("allowed_window_end")?,
        })
    }

    fn parse_blacklist_rule(row: &sqlx::sqlite::SqliteRow) -> Result<BlacklistRule, StoreError> {
        let type_text: String = row.try_get("type")?;
        let rule_type = BlacklistRuleType::from_str(&type_text).map_err(StoreError::NotFound)?;
        Ok(BlacklistRule {
            id: row.try_get("id")?,
            rule_type,
            pattern: row.try_get("pattern")?,
            is_enabled: row.try_get::<i64, _>("is_enabled")? != 0,
        })
    }
}

#[async_trait]
impl PublicationRepository for SqlitePublicationRepository {
    async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS channels (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                destination TEXT NOT NULL,
                credential_token TEXT NOT NULL,
                timezone TEXT NOT NULL DEFAULT 'Europe/Moscow',
                daily_time TEXT NOT NULL DEFAULT '10:00',
                allowed_window_start TEXT NOT NULL DEFAULT '08:00',
                allowed_window_end TEXT NOT NULL DEFAULT '22:00'
            );

            CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                channel_id INTEGER NOT NULL REFERENCES channels(id),
                title TEXT NOT NULL DEFAULT '',
                body_html TEXT NOT NULL DEFAULT '',
                media TEXT NOT NULL DEFAULT '[]',
                buttons TEXT NOT NULL DEFAULT '[]',
                options TEXT NOT NULL DEFAULT '{}',
                blacklist_check_status TEXT NOT NULL DEFAULT 'ok',
                blacklist_reason TEXT,
                status TEXT NOT NULL DEFAULT 'draft',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS publications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                post_id INTEGER NOT NULL REFERENCES posts(id),
                planned_at TEXT NOT NULL,
                ready_at TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'scheduled',
                attempts INTEGER NOT NULL DEFAULT 0,
                locked_at TEXT,
                locked_by TEXT,
                message_id TEXT,
                sent_at TEXT,
                last_error TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_publications_status_ready
                ON publications(status, ready_at, planned_at, id);
            CREATE INDEX IF NOT EXISTS idx_publications_post_id
                ON publications(post_id);
            CREATE INDEX IF NOT EXISTS idx_publications_channel_window
                ON publications(post_id, planned_at);

            CREATE TABLE IF NOT EXISTS blacklist_rules (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                type TEXT NOT NULL,
                pattern TEXT NOT NULL,
                is_enabled INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                entity_type TEXT NOT NULL,
                entity_id INTEGER NOT NULL,
                action TEXT NOT NULL,
                meta TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("initialized publication store schema");
        Ok(())
    }

    async fn count_publications_in_range(
        &self,
        channel_id: i64,
        day_start: NaiveDateTime,
        day_end: NaiveDateTime,
    ) -> Result<i64, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) as c
            FROM publications p
            JOIN posts po ON po.id = p.post_id
            WHERE po.channel_id = ? AND p.planned_at >= ? AND p.planned_at < ?
            "#,
        )
        .bind(channel_id)
        .bind(day_start)
        .bind(day_end)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("c")?)
    }

    async fn create_publication(
        &self,
        post_id: i64,
        planned_at: NaiveDateTime,
        ready_at: NaiveDateTime,
    ) -> Result<i64, StoreError> {
        let now = bc_common::clock::now_utc_naive();
        let result = sqlx::query(
            r#"
            INSERT INTO publications (post_id, planned_at, ready_at, status, attempts, created_at, updated_at)
            VALUES (?, ?, ?, 'scheduled', 0, ?, ?)
            "#,
        )
        .bind(post_id)
        .bind(planned_at)
        .bind(ready_at)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn recover_stuck_leases(
        &self,
        processing_ttl_seconds: i64,
        max_attempts: i32,
    ) -> Result<u64, StoreError> {
        let cutoff = bc_common::clock::now_utc_naive() - chrono::Duration::seconds(processing_ttl_seconds);
        let now = bc_common::clock::now_utc_naive();
        let result = sqlx::query(
            r#"
            UPDATE publications
            SET status = 'retry', ready_at = ?, locked_at = NULL, locked_by = NULL,
                last_error = 'processing_ttl_expired', updated_at = ?
            WHERE status = 'processing' AND locked_at <= ? AND attempts < ?
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(cutoff)
        .bind(max_attempts)
        .execute(&self.pool)
        .await?;

        let count = result.rows_affected();
        if count > 0 {
            info!(count, "recovered stuck publication leases");
        }
        Ok(count)
    }

    async fn select_due_batch(
        &self,
        batch_size: i64,
        max_attempts: i32,
    ) -> Result<Vec<Publication>, StoreError> {
        let now = bc_common::clock::now_utc_naive();
        let rows = sqlx::query(
            r#"
            SELECT * FROM publications
            WHERE status IN ('scheduled', 'retry') AND ready_at <= ? AND attempts < ?
            ORDER BY ready_at ASC, planned_at ASC, id ASC
            LIMIT ?
            "#,
        )
        .bind(now)
        .bind(max_attempts)
        .bind(batch_size)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::parse_publication).collect()
    }

    async fn claim(&self, id: i64, worker_id: &str) -> Result<bool, StoreError> {
        let now = bc_common::clock::now_utc_naive();
        let result = sqlx::query(
            r#"
            UPDATE publications
            SET status = 'processing', locked_at = ?, locked_by = ?, updated_at = ?
            WHERE id = ? AND status IN ('scheduled', 'retry')
            "#,
        )
        .bind(now)
        .bind(worker_id)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        let won = result.rows_affected() == 1;
        debug!(id, worker_id, won, "claim attempt");
        Ok(won)
    }

    async fn reload(&self, id: i64) -> Result<Option<Publication>, StoreError> {
        let row = sqlx::query("SELECT * FROM publications WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::parse_publication).transpose()
    }

    async fn load_post(&self, post_id: i64) -> Result<Option<Post>, StoreError> {
        let row = sqlx::query("SELECT * FROM posts WHERE id = ?")
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::parse_post).transpose()
    }

    async fn load_channel(&self, channel_id: i64) -> Result<Option<Channel>, StoreError> {
        let row = sqlx::query("SELECT * FROM channels WHERE id = ?")
            .bind(channel_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::parse_channel).transpose()
    }

    async fn list_enabled_blacklist_rules(&self) -> Result<Vec<BlacklistRule>, StoreError> {
        let rows = sqlx::query("SELECT * FROM blacklist_rules WHERE is_enabled = 1")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::parse_blacklist_rule).collect()
    }

    async fn mark_sent(&self, id: i64, message_id: &str, sent_at: NaiveDateTime) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE publications
            SET status = 'sent', message_id = ?, sent_at = ?, last_error = NULL,
                locked_at = NULL, locked_by = NULL, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(message_id)
        .bind(sent_at)
        .bind(sent_at)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_already_sent(&self, id: i64, sent_at: NaiveDateTime) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE publications
            SET status = 'sent', sent_at = ?, locked_at = NULL, locked_by = NULL, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(sent_at)
        .bind(sent_at)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_retry(
        &self,
        id: i64,
        last_error: &str,
        ready_at: NaiveDateTime,
    ) -> Result<(), StoreError> {
        let now = bc_common::clock::now_utc_naive();
        sqlx::query(
            r#"
            UPDATE publications
            SET status = 'retry', attempts = attempts + 1, last_error = ?,
                ready_at = ?, locked_at = NULL, locked_by = NULL, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(last_error)
        .bind(ready_at)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_failed(&self, id: i64, last_error: &str) -> Result<(), StoreError> {
        let now = bc_common::clock::now_utc_naive();
        sqlx::query(
            r#"
            UPDATE publications
            SET status = 'failed', attempts = attempts + 1, last_error = ?,
                locked_at = NULL, locked_by = NULL, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(last_error)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn count_non_terminal_for_post(
        &self,
        post_id: i64,
        exclude_id: i64,
    ) -> Result<i64, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) as c FROM publications
            WHERE post_id = ? AND id != ? AND status NOT IN ('sent', 'failed', 'canceled')
            "#,
        )
        .bind(post_id)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("c")?)
    }

    async fn set_post_status(&self, post_id: i64, status: PostStatus) -> Result<(), StoreError> {
        let now = bc_common::clock::now_utc_naive();
        sqlx::query("UPDATE posts SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(now)
            .bind(post_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
