//! Normalizations for values crossing the messaging client boundary.

use bc_common::{Button, MediaKind};
use serde_json::{json, Value};

/// Aliases {image,img → photo; gif,file → document}; anything outside
/// {photo,video,document} collapses to `photo`.
pub fn normalize_media_type(raw: &str) -> MediaKind {
    match raw.to_ascii_lowercase().as_str() {
        "photo" | "image" | "img" => MediaKind::Photo,
        "video" => MediaKind::Video,
        "document" | "gif" | "file" => MediaKind::Document,
        _ => MediaKind::Photo,
    }
}

/// Strips `t.me` URL prefixes; `@name` and numeric ids (optionally
/// negative) pass through unchanged; bare names matching
/// `[A-Za-z0-9_]{5,}` get an `@` prefix; anything else passes through
/// verbatim. Idempotent (L3).
pub fn normalize_chat_id(raw: &str) -> String {
    let stripped = raw
        .trim()
        .trim_start_matches("https://t.me/")
        .trim_start_matches("http://t.me/")
        .trim_start_matches("t.me/");

    if stripped.starts_with('@') {
        return stripped.to_string();
    }

    let is_numeric = {
        let s = stripped.strip_prefix('-').unwrap_or(stripped);
        !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
    };
    if is_numeric {
        return stripped.to_string();
    }

    let is_bare_name = stripped.len() >= 5
        && stripped
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if is_bare_name {
        return format!("@{stripped}");
    }

    stripped.to_string()
}

/// Drops buttons missing text or url, groups each survivor into its own
/// row, and returns `{inline_keyboard: [[{text,url}],...]}`, or `None` if
/// nothing survives.
pub fn build_inline_keyboard(buttons: &[Button]) -> Option<Value> {
    let rows: Vec<Value> = buttons
        .iter()
        .filter(|b| !b.text.is_empty() && !b.url.is_empty())
        .map(|b| json!([{"text": b.text, "url": b.url}]))
        .collect();

    if rows.is_empty() {
        None
    } else {
        Some(json!({"inline_keyboard": rows}))
    }
}
