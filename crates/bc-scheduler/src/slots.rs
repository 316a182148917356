//! Slot scheduler: computes the next delivery instant (UTC) and a per-day
//! ordinal for a channel, then adjusts it into the channel's allowed window.

use bc_common::clock::{local_to_utc_naive, utc_naive_to_local};
use bc_common::Channel;
use bc_store::{PublicationRepository, StoreError};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

const MAX_DAY_ADVANCES: i64 = 365;

fn parse_hhmm(s: &str) -> NaiveTime {
    NaiveTime::parse_from_str(s, "%H:%M").unwrap_or_else(|_| NaiveTime::from_hms_opt(0, 0, 0).unwrap())
}

/// `(planned_utc, slot_index)`. See module docs for the packing algorithm:
/// deterministic FIFO within a day, one-second spacing, 365-iteration cap
/// against pathological loops.
pub async fn calculate_next_slot(
    channel: &Channel,
    repo: &dyn PublicationRepository,
    now_utc: NaiveDateTime,
) -> Result<(NaiveDateTime, i64), StoreError> {
    let daily_time = parse_hhmm(&channel.daily_time);
    let local_now = utc_naive_to_local(now_utc, &channel.timezone);

    let mut candidate_local_date = local_now.date();
    if NaiveDateTime::new(candidate_local_date, daily_time) <= local_now {
        candidate_local_date += Duration::days(1);
    }

    for _ in 0..MAX_DAY_ADVANCES {
        let candidate_local = NaiveDateTime::new(candidate_local_date, daily_time);
        let planned_base_utc = local_to_utc_naive(candidate_local, &channel.timezone);

        let day_start = planned_base_utc.date().and_hms_opt(0, 0, 0).unwrap();
        let day_end = day_start + Duration::days(1);

        let slot_index = repo
            .count_publications_in_range(channel.id, day_start, day_end)
            .await?;

        let candidate_utc = planned_base_utc + Duration::seconds(slot_index);
        if candidate_utc > now_utc {
            return Ok((candidate_utc, slot_index));
        }

        candidate_local_date += Duration::days(1);
    }

    Ok((now_utc + Duration::minutes(1), 0))
}

/// Shifts `planned_utc` into `[allowed_window_start, allowed_window_end]`
/// (inclusive) in the channel's local time. Idempotent (L2): a value
/// already in-window is returned unchanged.
pub fn adjust_to_window(channel: &Channel, planned_utc: NaiveDateTime) -> NaiveDateTime {
    let window_start = parse_hhmm(&channel.allowed_window_start);
    let window_end = parse_hhmm(&channel.allowed_window_end);

    let local = utc_naive_to_local(planned_utc, &channel.timezone);
    let local_time = local.time();

    if local_time >= window_start && local_time <= window_end {
        return planned_utc;
    }

    let shifted_date = if local_time < window_start {
        local.date()
    } else {
        local.date() + Duration::days(1)
    };

    let shifted_local = NaiveDateTime::new(shifted_date, window_start);
    local_to_utc_naive(shifted_local, &channel.timezone)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bc_common::{BlacklistRule, Post, PostStatus, Publication};
    use std::sync::Mutex;

    struct FakeRepo {
        counts: Mutex<Vec<i64>>,
    }

    impl FakeRepo {
        fn returning(counts: Vec<i64>) -> Self {
            Self {
                counts: Mutex::new(counts),
            }
        }
    }

    #[async_trait]
    impl PublicationRepository for FakeRepo {
        async fn init_schema(&self) -> Result<(), StoreError> {
            Ok(())
        }
        async fn count_publications_in_range(
            &self,
            _channel_id: i64,
            _day_start: NaiveDateTime,
            _day_end: NaiveDateTime,
        ) -> Result<i64, StoreError> {
            let mut counts = self.counts.lock().unwrap();
            if counts.is_empty() {
                Ok(0)
            } else {
                Ok(counts.remove(0))
            }
        }
        async fn create_publication(
            &self,
            _post_id: i64,
            _planned_at: NaiveDateTime,
            _ready_at: NaiveDateTime,
        ) -> Result<i64, StoreError> {
            Ok(1)
        }
        async fn recover_stuck_leases(
            &self,
            _processing_ttl_seconds: i64,
            _max_attempts: i32,
        ) -> Result<u64, StoreError> {
            Ok(0)
        }
        async fn select_due_batch(
            &self,
            _batch_size: i64,
            _max_attempts: i32,
        ) -> Result<Vec<Publication>, StoreError> {
            Ok(vec![])
        }
        async fn claim(&self, _id: i64, _worker_id: &str) -> Result<bool, StoreError> {
            Ok(false)
        }
        async fn reload(&self, _id: i64) -> Result<Option<Publication>, StoreError> {
            Ok(None)
        }
        async fn load_post(&self, _post_id: i64) -> Result<Option<Post>, StoreError> {
            Ok(None)
        }
        async fn load_channel(&self, _channel_id: i64) -> Result<Option<Channel>, StoreError> {
            Ok(None)
        }
        async fn list_enabled_blacklist_rules(&self) -> Result<Vec<BlacklistRule>, StoreError> {
            Ok(vec![])
        }
        async fn mark_sent(
            &self,
            _id: i64,
            _message_id: &str,
            _sent_at: NaiveDateTime,
        ) -> Result<(), StoreError> {
            Ok(())
        }
        async fn mark_already_sent(&self, _id: i64, _sent_at: NaiveDateTime) -> Result<(), StoreError> {
            Ok(())
        }
        async fn mark_retry(
            &self,
            _id: i64,
            _last_error: &str,
            _ready_at: NaiveDateTime,
        ) -> Result<(), StoreError> {
            Ok(())
        }
        async fn mark_failed(&self, _id: i64, _last_error: &str) -> Result<(), StoreError> {
            Ok(())
        }
        async fn count_non_terminal_for_post(
            &self,
            _post_id: i64,
            _exclude_id: i64,
        ) -> Result<i64, StoreError> {
            Ok(0)
        }
        async fn set_post_status(&self, _post_id: i64, _status: PostStatus) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn channel() -> Channel {
        Channel {
            id: 1,
            title: "test".to_string(),
            destination: "@test".to_string(),
            credential_token: "tok".to_string(),
            timezone: "Europe/Moscow".to_string(),
            daily_time: "10:00".to_string(),
            allowed_window_start: "08:00".to_string(),
            allowed_window_end: "22:00".to_string(),
        }
    }

    #[tokio::test]
    async fn s1_happy_path_matches_spec_scenario() {
        // 2025-01-14 09:00 UTC = 12:00 MSK, after today's 10:00 daily_time,
        // so the slot lands tomorrow at 10:00 MSK = 07:00 UTC.
        let now = NaiveDate::from_ymd_opt(2025, 1, 14)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let repo = FakeRepo::returning(vec![0]);
        let (planned, slot_index) = calculate_next_slot(&channel(), &repo, now).await.unwrap();

        assert_eq!(slot_index, 0);
        assert_eq!(
            planned,
            NaiveDate::from_ymd_opt(2025, 1, 15)
                .unwrap()
                .and_hms_opt(7, 0, 0)
                .unwrap()
        );
    }

    #[tokio::test]
    async fn slot_index_packs_seconds_within_a_day() {
        let now = NaiveDate::from_ymd_opt(2025, 1, 14)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let repo = FakeRepo::returning(vec![3]);
        let (planned, slot_index) = calculate_next_slot(&channel(), &repo, now).await.unwrap();

        assert_eq!(slot_index, 3);
        assert_eq!(
            planned,
            NaiveDate::from_ymd_opt(2025, 1, 15)
                .unwrap()
                .and_hms_opt(7, 0, 3)
                .unwrap()
        );
    }

    #[test]
    fn adjust_to_window_is_idempotent() {
        let c = channel();
        let planned = NaiveDate::from_ymd_opt(2025, 1, 15)
            .unwrap()
            .and_hms_opt(7, 0, 0)
            .unwrap();
        let once = adjust_to_window(&c, planned);
        let twice = adjust_to_window(&c, once);
        assert_eq!(once, twice);
    }

    #[test]
    fn before_window_shifts_to_todays_window_start() {
        let c = channel();
        // 03:00 MSK = 00:00 UTC, before the 08:00 MSK window start.
        let planned = NaiveDate::from_ymd_opt(2025, 1, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let adjusted = adjust_to_window(&c, planned);
        let local = utc_naive_to_local(adjusted, &c.timezone);
        assert_eq!(local.time(), NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert_eq!(local.date(), NaiveDate::from_ymd_opt(2025, 1, 15).unwrap());
    }

    #[test]
    fn after_window_shifts_to_tomorrows_window_start() {
        let c = channel();
        // 23:00 MSK = 20:00 UTC, after the 22:00 MSK window end.
        let planned = NaiveDate::from_ymd_opt(2025, 1, 15)
            .unwrap()
            .and_hms_opt(20, 0, 0)
            .unwrap();
        let adjusted = adjust_to_window(&c, planned);
        let local = utc_naive_to_local(adjusted, &c.timezone);
        assert_eq!(local.time(), NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert_eq!(local.date(), NaiveDate::from_ymd_opt(2025, 1, 16).unwrap());
    }
}
