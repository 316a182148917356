//! Content validation: length/media caps, link scheme constraints, and
//! blacklist rule matching that gates a Post's entry into the publication
//! queue.
//!
//! Validation runs at the admin-interface boundary, before a raw JSON-field
//! submission becomes a fully-typed [`bc_common::Post`]. Checks run in order
//! and the first failure wins, matching the admin UI's expectation of a
//! single human-readable reason per rejected post.

pub mod json_fields;
pub mod links;

use bc_common::{BlacklistRule, BlacklistRuleType, Button, MediaItem, PostOptions};
use regex::RegexBuilder;

pub use json_fields::{parse_post_payload, JsonFieldError, PostPayload};

/// Result of [`validate`]. `reason` is `None` iff `ok` is `true`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub ok: bool,
    pub reason: Option<String>,
}

impl ValidationOutcome {
    fn ok() -> Self {
        Self {
            ok: true,
            reason: None,
        }
    }

    fn blocked(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: Some(reason.into()),
        }
    }
}

pub const MAX_BODY_HTML_LEN: usize = bc_common::MAX_BODY_HTML_LEN;
pub const MAX_MEDIA_ITEMS: usize = bc_common::MAX_MEDIA_ITEMS;

/// Validate an already-parsed payload against length/media caps, link
/// schemes, and the supplied (already-filtered-to-enabled) blacklist rules.
///
/// Length and media caps and link-scheme checks are independent of the
/// blacklist and are checked first; callers that already validated JSON
/// shape via [`parse_post_payload`] skip straight to this.
pub fn validate(payload: &PostPayload, rules: &[BlacklistRule]) -> ValidationOutcome {
    if payload.body_html.chars().count() > MAX_BODY_HTML_LEN {
        return ValidationOutcome::blocked(format!(
            "Текст поста превышает {MAX_BODY_HTML_LEN} символов"
        ));
    }

    if payload.media.len() > MAX_MEDIA_ITEMS {
        return ValidationOutcome::blocked(format!(
            "Превышено максимальное количество медиа ({MAX_MEDIA_ITEMS})"
        ));
    }

    let hrefs = links::extract_links(&payload.body_html);
    let mut hosts = Vec::with_capacity(hrefs.len());
    for href in &hrefs {
        match url::Url::parse(href) {
            Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => {
                if let Some(host) = parsed.host_str() {
                    hosts.push(host.to_ascii_lowercase());
                }
            }
            _ => {
                return ValidationOutcome::blocked(format!(
                    "Недопустимая схема ссылки: {href}"
                ));
            }
        }
    }

    for rule in rules.iter().filter(|r| r.is_enabled) {
        if let Some(reason) = check_rule(rule, &payload.body_html, &hosts) {
            return ValidationOutcome::blocked(reason);
        }
    }

    ValidationOutcome::ok()
}

fn check_rule(rule: &BlacklistRule, body_html: &str, hosts: &[String]) -> Option<String> {
    match rule.rule_type {
        BlacklistRuleType::Word => {
            if body_html.to_lowercase().contains(&rule.pattern.to_lowercase()) {
                return Some(format!("Запрещённое слово: {}", rule.pattern));
            }
            None
        }
        BlacklistRuleType::Domain => {
            let needle = rule.pattern.to_ascii_lowercase();
            if hosts.iter().any(|h| h.contains(&needle)) {
                return Some(format!("Запрещённый домен: {}", rule.pattern));
            }
            None
        }
        BlacklistRuleType::Regex => {
            match RegexBuilder::new(&rule.pattern).case_insensitive(true).build() {
                Ok(re) => {
                    if re.is_match(body_html) {
                        Some(format!("Совпадение с правилом: {}", rule.pattern))
                    } else {
                        None
                    }
                }
                Err(e) => {
                    tracing::warn!(pattern = %rule.pattern, error = %e, "invalid blacklist regex, skipping");
                    None
                }
            }
        }
    }
}

/// Drops buttons missing text or url, matching `build_inline_keyboard`'s
/// own filtering so validation and send-time keyboard construction agree
/// on what counts as a usable button.
pub fn usable_buttons(buttons: &[Button]) -> Vec<&Button> {
    buttons
        .iter()
        .filter(|b| !b.text.is_empty() && !b.url.is_empty())
        .collect()
}

#[allow(unused)]
fn _assert_media_item_shape(_: &MediaItem) {}
#[allow(unused)]
fn _assert_options_shape(_: &PostOptions) {}
