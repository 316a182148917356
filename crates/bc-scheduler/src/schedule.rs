//! Ties content validation, slot computation, and persistence into the one
//! entry point an administrative surface (out of scope here) would call to
//! move a draft Post into the publication queue.

use crate::slots::{adjust_to_window, calculate_next_slot};
use bc_common::clock;
use bc_store::{PublicationRepository, StoreError};
use bc_validate::{PostPayload, ValidationOutcome};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("post rejected by content validation: {0}")]
    Rejected(String),
    #[error("channel {0} not found")]
    ChannelNotFound(i64),
}

/// Validates `payload` against the channel's enabled blacklist rules, picks
/// the next slot, adjusts it into the channel's allowed window, and creates
/// the Publication row. Returns the new Publication's id.
pub async fn schedule_post(
    repo: &dyn PublicationRepository,
    channel_id: i64,
    post_id: i64,
    payload: &PostPayload,
) -> Result<i64, ScheduleError> {
    let channel = repo
        .load_channel(channel_id)
        .await?
        .ok_or(ScheduleError::ChannelNotFound(channel_id))?;

    let rules = repo.list_enabled_blacklist_rules().await?;
    let ValidationOutcome { ok, reason } = bc_validate::validate(payload, &rules);
    if !ok {
        return Err(ScheduleError::Rejected(reason.unwrap_or_default()));
    }

    let now = clock::now_utc_naive();
    let (planned_at, _slot_index) = calculate_next_slot(&channel, repo, now).await?;
    let planned_at = adjust_to_window(&channel, planned_at);

    let publication_id = repo.create_publication(post_id, planned_at, planned_at).await?;
    Ok(publication_id)
}
