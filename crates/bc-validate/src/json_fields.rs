//! Parsing of the admin interface's raw JSON-text fields (`media`,
//! `buttons`, `options`) into typed values, with the empty-string-as-default
//! convention the admin form relies on.

use bc_common::{Button, MediaItem, PostOptions};
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Некорректный JSON в поле {field}: {source}")]
pub struct JsonFieldError {
    pub field: &'static str,
    #[source]
    pub source: serde_json::Error,
}

/// Deserialize `raw` as `T`, treating a blank string as `empty_literal`
/// (e.g. `"[]"` or `"{}"`).
fn parse_json_field<T: DeserializeOwned>(
    raw: &str,
    empty_literal: &str,
    field: &'static str,
) -> Result<T, JsonFieldError> {
    let effective = if raw.trim().is_empty() {
        empty_literal
    } else {
        raw
    };
    serde_json::from_str(effective).map_err(|source| JsonFieldError { field, source })
}

/// A Post's content, parsed from the admin interface's raw field
/// submissions. Owns no identity — it becomes part of a [`bc_common::Post`]
/// once persisted.
#[derive(Debug, Clone)]
pub struct PostPayload {
    pub body_html: String,
    pub media: Vec<MediaItem>,
    pub buttons: Vec<Button>,
    pub options: PostOptions,
}

pub fn parse_post_payload(
    body_html: impl Into<String>,
    media_raw: &str,
    buttons_raw: &str,
    options_raw: &str,
) -> Result<PostPayload, JsonFieldError> {
    Ok(PostPayload {
        body_html: body_html.into(),
        media: parse_json_field(media_raw, "[]", "media")?,
        buttons: parse_json_field(buttons_raw, "[]", "buttons")?,
        options: parse_json_field(options_raw, "{}", "options")?,
    })
}
