//! Clock & timezone utility.
//!
//! Every timestamp persisted by the store is tz-naive but canonically UTC.
//! Conversion to a channel's IANA zone happens only at scheduling and
//! display boundaries; nothing in the store or the worker ever reasons
//! about a non-UTC `DateTime`.

use chrono::{NaiveDateTime, Utc};
use chrono_tz::Tz;
use std::str::FromStr;

/// Default IANA zone used when a channel's configured timezone is unknown.
pub const DEFAULT_TIMEZONE: &str = "Europe/Moscow";

/// Current instant, UTC, with tz info stripped — the store's convention.
pub fn now_utc_naive() -> NaiveDateTime {
    Utc::now().naive_utc()
}

fn resolve_tz(tz_name: &str) -> Tz {
    match Tz::from_str(tz_name) {
        Ok(tz) => tz,
        Err(_) => {
            tracing::warn!(tz = tz_name, "unknown timezone, falling back to default");
            match Tz::from_str(DEFAULT_TIMEZONE) {
                Ok(tz) => tz,
                Err(_) => {
                    tracing::warn!(
                        default_tz = DEFAULT_TIMEZONE,
                        "default timezone also unresolvable, falling back to UTC"
                    );
                    chrono_tz::UTC
                }
            }
        }
    }
}

/// Convert a naive local datetime in `tz_name` to a naive UTC datetime.
pub fn local_to_utc_naive(dt_local: NaiveDateTime, tz_name: &str) -> NaiveDateTime {
    let tz = resolve_tz(tz_name);
    match dt_local.and_local_timezone(tz) {
        chrono::LocalResult::Single(dt) => dt.naive_utc(),
        chrono::LocalResult::Ambiguous(dt, _) => dt.naive_utc(),
        chrono::LocalResult::None => {
            tracing::warn!(
                tz = tz_name,
                "local datetime does not exist in timezone (DST gap), treating as UTC"
            );
            dt_local
        }
    }
}

/// Convert a naive UTC datetime to a naive local datetime in `tz_name`.
pub fn utc_naive_to_local(dt_utc: NaiveDateTime, tz_name: &str) -> NaiveDateTime {
    let tz = resolve_tz(tz_name);
    let utc_dt = chrono::DateTime::<Utc>::from_naive_utc_and_offset(dt_utc, Utc);
    utc_dt.with_timezone(&tz).naive_local()
}
