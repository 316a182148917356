//! Shared domain types, clock/timezone utility, error enum, and logging
//! init for the scheduled channel publisher.
//!
//! Enums round-trip as lowercase strings (`Display`/`FromStr`) to match the
//! store's convention of persisting status columns as readable text rather
//! than integers, so a row can be inspected with a plain SQL client.

pub mod clock;
pub mod error;
pub mod logging;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default number of attempts a Publication may accumulate before it is
/// forced into `failed` regardless of retryability.
pub const DEFAULT_MAX_ATTEMPTS: i32 = 5;

/// Default minutes added to a retry's `ready_at` absent a server-provided delay.
pub const DEFAULT_RETRY_MINUTES: i64 = 30;

/// Default worker poll interval, seconds.
pub const DEFAULT_WORKER_INTERVAL_SECONDS: i64 = 20;

/// Default age at which a `processing` lease is considered abandoned.
pub const DEFAULT_PROCESSING_TTL_SECONDS: i64 = 900;

/// Default number of due rows claimed per worker iteration.
pub const DEFAULT_BATCH_SIZE: i64 = 20;

/// Destination identity: a remote chat with its cadence and credentials.
/// Owned by the admin interface; the core only ever reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: i64,
    pub title: String,
    /// Raw destination identifier as stored; normalize with
    /// `bc_messaging::normalize_chat_id` before use.
    pub destination: String,
    pub credential_token: String,
    /// IANA timezone name, e.g. "Europe/Moscow".
    pub timezone: String,
    /// Local time-of-day the channel publishes at, "HH:MM".
    pub daily_time: String,
    /// Local time-of-day window start, inclusive, "HH:MM".
    pub allowed_window_start: String,
    /// Local time-of-day window end, inclusive, "HH:MM".
    pub allowed_window_end: String,
}

impl Channel {
    pub fn default_timezone() -> &'static str {
        crate::clock::DEFAULT_TIMEZONE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Scheduled,
    Queued,
    Sent,
    Failed,
    Canceled,
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PostStatus::Draft => "draft",
            PostStatus::Scheduled => "scheduled",
            PostStatus::Queued => "queued",
            PostStatus::Sent => "sent",
            PostStatus::Failed => "failed",
            PostStatus::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

impl FromStr for PostStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(PostStatus::Draft),
            "scheduled" => Ok(PostStatus::Scheduled),
            "queued" => Ok(PostStatus::Queued),
            "sent" => Ok(PostStatus::Sent),
            "failed" => Ok(PostStatus::Failed),
            "canceled" => Ok(PostStatus::Canceled),
            other => Err(format!("unknown post status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlacklistCheckStatus {
    Ok,
    Blocked,
}

impl fmt::Display for BlacklistCheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BlacklistCheckStatus::Ok => "ok",
            BlacklistCheckStatus::Blocked => "blocked",
        })
    }
}

/// Media item kind attached to a Post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
    Document,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
            MediaKind::Document => "document",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaItem {
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Button {
    pub text: String,
    pub url: String,
}

/// Recognized keys from spec §6.3; unknown keys are ignored by callers that
/// deserialize into this struct via `#[serde(default)]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostOptions {
    #[serde(default)]
    pub disable_notification: bool,
    #[serde(default)]
    pub protect_content: bool,
    #[serde(default)]
    pub disable_preview: bool,
    #[serde(default)]
    pub pin: bool,
}

/// Authored content awaiting or assigned to publication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub channel_id: i64,
    pub title: String,
    pub body_html: String,
    pub media: Vec<MediaItem>,
    pub buttons: Vec<Button>,
    pub options: PostOptions,
    pub blacklist_check_status: BlacklistCheckStatus,
    pub blacklist_reason: Option<String>,
    pub status: PostStatus,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}

pub const MAX_BODY_HTML_LEN: usize = 4096;
pub const MAX_MEDIA_ITEMS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublicationStatus {
    Scheduled,
    Retry,
    Processing,
    Sent,
    Failed,
    Canceled,
}

impl PublicationStatus {
    /// Terminal states are never exited by the core (spec I5).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PublicationStatus::Sent | PublicationStatus::Failed | PublicationStatus::Canceled
        )
    }
}

impl fmt::Display for PublicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PublicationStatus::Scheduled => "scheduled",
            PublicationStatus::Retry => "retry",
            PublicationStatus::Processing => "processing",
            PublicationStatus::Sent => "sent",
            PublicationStatus::Failed => "failed",
            PublicationStatus::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

impl FromStr for PublicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(PublicationStatus::Scheduled),
            "retry" => Ok(PublicationStatus::Retry),
            "processing" => Ok(PublicationStatus::Processing),
            "sent" => Ok(PublicationStatus::Sent),
            "failed" => Ok(PublicationStatus::Failed),
            "canceled" => Ok(PublicationStatus::Canceled),
            other => Err(format!("unknown publication status: {other}")),
        }
    }
}

/// One scheduled attempt stream for a Post. Created by the admin interface
/// at scheduling time, owned by the worker thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Publication {
    pub id: i64,
    pub post_id: i64,
    /// Human-meaningful target instant, naive UTC.
    pub planned_at: chrono::NaiveDateTime,
    /// Earliest instant the worker may attempt, naive UTC.
    pub ready_at: chrono::NaiveDateTime,
    pub status: PublicationStatus,
    pub attempts: i32,
    pub locked_at: Option<chrono::NaiveDateTime>,
    pub locked_by: Option<String>,
    /// Remote message id on success, stored as text.
    pub message_id: Option<String>,
    pub sent_at: Option<chrono::NaiveDateTime>,
    pub last_error: Option<String>,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlacklistRuleType {
    Word,
    Domain,
    Regex,
}

impl fmt::Display for BlacklistRuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BlacklistRuleType::Word => "word",
            BlacklistRuleType::Domain => "domain",
            BlacklistRuleType::Regex => "regex",
        })
    }
}

impl FromStr for BlacklistRuleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "word" => Ok(BlacklistRuleType::Word),
            "domain" => Ok(BlacklistRuleType::Domain),
            "regex" => Ok(BlacklistRuleType::Regex),
            other => Err(format!("unknown blacklist rule type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlacklistRule {
    pub id: i64,
    #[serde(rename = "type")]
    pub rule_type: BlacklistRuleType,
    pub pattern: String,
    pub is_enabled: bool,
}

/// Append-only record of a state transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: i64,
    pub entity_type: String,
    pub entity_id: i64,
    pub action: String,
    pub meta: serde_json::Value,
    pub created_at: chrono::NaiveDateTime,
}
