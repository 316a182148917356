//! Publication repository trait.
//!
//! This is the sole seam between the worker/scheduler and persistence. The
//! conditional-update claim (`claim`) is the only mutual-exclusion point in
//! the whole system; everything else is a plain read or write.

use crate::error::StoreError;
use async_trait::async_trait;
use bc_common::{BlacklistRule, Channel, Post, PostStatus, Publication};
use chrono::NaiveDateTime;

#[async_trait]
pub trait PublicationRepository: Send + Sync {
    /// Create tables and indexes if they don't already exist.
    async fn init_schema(&self) -> Result<(), StoreError>;

    // -- scheduling / slot computation ------------------------------------

    /// Count Publications for `channel_id` with `planned_at` in `[day_start, day_end)`.
    /// Used by the slot scheduler to derive a per-day ordinal.
    async fn count_publications_in_range(
        &self,
        channel_id: i64,
        day_start: NaiveDateTime,
        day_end: NaiveDateTime,
    ) -> Result<i64, StoreError>;

    /// Insert a new Publication in `scheduled` status. Returns its id.
    async fn create_publication(
        &self,
        post_id: i64,
        planned_at: NaiveDateTime,
        ready_at: NaiveDateTime,
    ) -> Result<i64, StoreError>;

    // -- worker loop --------------------------------------------------------

    /// Restore leases held past `processing_ttl_seconds` back to `retry`,
    /// without incrementing `attempts` (spec: a hung send doesn't consume a
    /// retry budget). Only rows still under `max_attempts` are eligible, so
    /// the guarantee holds structurally rather than by accident of call
    /// order. Returns the number of rows restored.
    async fn recover_stuck_leases(
        &self,
        processing_ttl_seconds: i64,
        max_attempts: i32,
    ) -> Result<u64, StoreError>;

    /// Rows with `status IN (scheduled, retry)`, `ready_at <= now`,
    /// `attempts < max_attempts`, ordered by (ready_at, planned_at, id).
    async fn select_due_batch(
        &self,
        batch_size: i64,
        max_attempts: i32,
    ) -> Result<Vec<Publication>, StoreError>;

    /// Conditional claim: `UPDATE ... WHERE id = ? AND status IN ('scheduled','retry')`.
    /// Returns `true` iff this call won the row (exactly one row affected).
    async fn claim(&self, id: i64, worker_id: &str) -> Result<bool, StoreError>;

    /// Re-read a single Publication by id.
    async fn reload(&self, id: i64) -> Result<Option<Publication>, StoreError>;

    async fn load_post(&self, post_id: i64) -> Result<Option<Post>, StoreError>;

    async fn load_channel(&self, channel_id: i64) -> Result<Option<Channel>, StoreError>;

    async fn list_enabled_blacklist_rules(&self) -> Result<Vec<BlacklistRule>, StoreError>;

    /// Mark a claimed row sent after a successful remote send.
    async fn mark_sent(&self, id: i64, message_id: &str, sent_at: NaiveDateTime) -> Result<(), StoreError>;

    /// Idempotent-completion path: `message_id` was already set by a prior
    /// crashed run. Just flips status/sent_at, doesn't touch message_id.
    async fn mark_already_sent(&self, id: i64, sent_at: NaiveDateTime) -> Result<(), StoreError>;

    /// Record a retryable failure: increment attempts, clear lock, schedule
    /// the next attempt at `ready_at`.
    async fn mark_retry(
        &self,
        id: i64,
        last_error: &str,
        ready_at: NaiveDateTime,
    ) -> Result<(), StoreError>;

    /// Record a terminal failure: increment attempts, clear lock, status=failed.
    async fn mark_failed(&self, id: i64, last_error: &str) -> Result<(), StoreError>;

    /// Count non-terminal Publications belonging to `post_id`, excluding `exclude_id`.
    /// Used to decide whether a Post's derived status can flip to a terminal one.
    async fn count_non_terminal_for_post(
        &self,
        post_id: i64,
        exclude_id: i64,
    ) -> Result<i64, StoreError>;

    async fn set_post_status(&self, post_id: i64, status: PostStatus) -> Result<(), StoreError>;
}
