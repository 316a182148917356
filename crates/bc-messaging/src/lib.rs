//! Messaging client for the remote chat-messaging API.
//!
//! Implements the send protocol against a token-authenticated HTTP endpoint
//! rooted at `{api_base}/bot{token}/{method}`: text, single photo/video/
//! document, media group, and pin, plus channel-access verification.
//! Classifies transport and protocol errors into retryable/non-retryable so
//! the worker never has to inspect a status code itself.

pub mod normalize;
pub mod publishing;

pub use normalize::{build_inline_keyboard, normalize_chat_id, normalize_media_type};
pub use publishing::send_publication;

use bc_common::{MediaItem, MediaKind, PostOptions};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// e.g. "https://api.telegram.org"
    pub api_base: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.telegram.org".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(20),
        }
    }
}

/// Response envelope shared by every method on the wire protocol.
#[derive(Debug, Deserialize)]
struct TelegramEnvelope<T> {
    ok: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct MessageResult {
    message_id: i64,
}

#[derive(Debug, Deserialize)]
struct ChatResult {
    #[serde(rename = "type")]
    chat_type: String,
}

#[derive(Debug, Deserialize)]
struct ChatMemberResult {
    status: String,
}

/// Outcome of any send operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendResult {
    pub ok: bool,
    pub message_id: Option<String>,
    pub error: Option<String>,
    pub retry_after_seconds: Option<i64>,
    pub retryable: bool,
}

impl SendResult {
    fn success(message_id: i64) -> Self {
        Self {
            ok: true,
            message_id: Some(message_id.to_string()),
            error: None,
            retry_after_seconds: None,
            retryable: false,
        }
    }

    fn failure(error: impl Into<String>, retryable: bool, retry_after_seconds: Option<i64>) -> Self {
        Self {
            ok: false,
            message_id: None,
            error: Some(error.into()),
            retry_after_seconds,
            retryable,
        }
    }
}

/// Outcome of [`TelegramClient::verify_access`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyResult {
    pub ok: bool,
    pub reason: Option<String>,
}

pub struct TelegramClient {
    config: ClientConfig,
    token: String,
    client: reqwest::Client,
}

impl TelegramClient {
    pub fn new(config: ClientConfig, token: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            config,
            token: token.into(),
            client,
        })
    }

    fn url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.config.api_base, self.token, method)
    }

    async fn call<T: for<'de> Deserialize<'de>>(&self, method: &str, body: Value) -> SendResultOrT<T> {
        debug!(method, "calling messaging API");

        let response = match self.client.post(self.url(method)).json(&body).send().await {
            Ok(r) => r,
            Err(e) => {
                return SendResultOrT::Err(SendResult::failure(
                    format!("network_error: {e}"),
                    true,
                    None,
                ));
            }
        };

        let status = response.status();
        let envelope: TelegramEnvelope<T> = match response.json().await {
            Ok(e) => e,
            Err(e) => {
                return SendResultOrT::Err(SendResult::failure(
                    format!("network_error: failed to parse response: {e}"),
                    true,
                    None,
                ));
            }
        };

        if envelope.ok {
            match envelope.result {
                Some(result) => SendResultOrT::Ok(result),
                None => SendResultOrT::Err(SendResult::failure(
                    "messaging API reported ok with no result",
                    true,
                    None,
                )),
            }
        } else {
            SendResultOrT::Err(classify_error(status, &envelope))
        }
    }

    pub async fn send_text(
        &self,
        chat_id: &str,
        body_html: &str,
        options: &PostOptions,
        keyboard: Option<Value>,
    ) -> SendResult {
        let mut body = json!({
            "chat_id": chat_id,
            "text": body_html,
            "parse_mode": "HTML",
            "disable_web_page_preview": options.disable_preview,
            "disable_notification": options.disable_notification,
            "protect_content": options.protect_content,
        });
        if let Some(kb) = keyboard {
            body["reply_markup"] = kb;
        }

        match self.call::<MessageResult>("sendMessage", body).await {
            SendResultOrT::Ok(r) => SendResult::success(r.message_id),
            SendResultOrT::Err(e) => e,
        }
    }

    pub async fn send_single_media(
        &self,
        chat_id: &str,
        kind: MediaKind,
        url: &str,
        caption: Option<&str>,
        options: &PostOptions,
        keyboard: Option<Value>,
    ) -> SendResult {
        let method = match kind {
            MediaKind::Photo => "sendPhoto",
            MediaKind::Video => "sendVideo",
            MediaKind::Document => "sendDocument",
        };
        let media_field = match kind {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
            MediaKind::Document => "document",
        };

        let mut body = json!({
            "chat_id": chat_id,
            media_field: url,
            "parse_mode": "HTML",
            "disable_notification": options.disable_notification,
            "protect_content": options.protect_content,
        });
        if let Some(caption) = caption {
            body["caption"] = json!(caption);
        }
        if let Some(kb) = keyboard {
            body["reply_markup"] = kb;
        }

        match self.call::<MessageResult>(method, body).await {
            SendResultOrT::Ok(r) => SendResult::success(r.message_id),
            SendResultOrT::Err(e) => e,
        }
    }

    /// Sends a media group. Caption attaches only to the first item.
    /// Inline keyboards are not supported on this method by the remote
    /// protocol; the follow-up-message workaround lives in
    /// [`publishing::send_publication`].
    pub async fn send_media_group(
        &self,
        chat_id: &str,
        items: &[MediaItem],
        caption_on_first: Option<&str>,
        options: &PostOptions,
    ) -> SendResult {
        let media: Vec<Value> = items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let mut entry = json!({
                    "type": item.kind.to_string(),
                    "media": item.url,
                });
                if i == 0 {
                    if let Some(caption) = caption_on_first {
                        entry["caption"] = json!(caption);
                        entry["parse_mode"] = json!("HTML");
                    }
                }
                entry
            })
            .collect();

        let body = json!({
            "chat_id": chat_id,
            "media": media,
            "disable_notification": options.disable_notification,
            "protect_content": options.protect_content,
        });

        match self.call::<Vec<MessageResult>>("sendMediaGroup", body).await {
            SendResultOrT::Ok(results) => match results.first() {
                Some(first) => SendResult::success(first.message_id),
                None => SendResult::failure("empty media group response", true, None),
            },
            SendResultOrT::Err(e) => e,
        }
    }

    pub async fn pin(&self, chat_id: &str, message_id: &str) -> SendResult {
        let body = json!({"chat_id": chat_id, "message_id": message_id});
        match self.call::<Value>("pinChatMessage", body).await {
            SendResultOrT::Ok(_) => SendResult {
                ok: true,
                message_id: Some(message_id.to_string()),
                error: None,
                retry_after_seconds: None,
                retryable: false,
            },
            SendResultOrT::Err(e) => e,
        }
    }

    /// `getChat` + `getMe` + `getChatMember`. Success requires the chat to
    /// exist and the bot to be a member; for `type = "channel"` the bot
    /// must be `creator` or `administrator`; for groups it must not be
    /// `left`/`kicked`/`restricted`.
    pub async fn verify_access(&self, chat_id: &str) -> VerifyResult {
        let chat = match self
            .call::<ChatResult>("getChat", json!({"chat_id": chat_id}))
            .await
        {
            SendResultOrT::Ok(c) => c,
            SendResultOrT::Err(e) => {
                return VerifyResult {
                    ok: false,
                    reason: e.error,
                }
            }
        };

        let me = match self.call::<BotUser>("getMe", json!({})).await {
            SendResultOrT::Ok(me) => me,
            SendResultOrT::Err(e) => {
                return VerifyResult {
                    ok: false,
                    reason: e.error,
                }
            }
        };

        let member = match self
            .call::<ChatMemberResult>(
                "getChatMember",
                json!({"chat_id": chat_id, "user_id": me.id}),
            )
            .await
        {
            SendResultOrT::Ok(m) => m,
            SendResultOrT::Err(e) => {
                return VerifyResult {
                    ok: false,
                    reason: e.error,
                }
            }
        };

        let ok = if chat.chat_type == "channel" {
            matches!(member.status.as_str(), "creator" | "administrator")
        } else {
            !matches!(member.status.as_str(), "left" | "kicked" | "restricted")
        };

        if ok {
            VerifyResult { ok: true, reason: None }
        } else {
            VerifyResult {
                ok: false,
                reason: Some(format!(
                    "bot status '{}' insufficient for chat type '{}'",
                    member.status, chat.chat_type
                )),
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct BotUser {
    id: i64,
}

enum SendResultOrT<T> {
    Ok(T),
    Err(SendResult),
}

fn classify_error<T>(status: reqwest::StatusCode, envelope: &TelegramEnvelope<T>) -> SendResult {
    let description = envelope
        .description
        .clone()
        .unwrap_or_else(|| format!("HTTP {status}"));

    if let Some(retry_after) = envelope.parameters.as_ref().and_then(|p| p.retry_after) {
        return SendResult::failure(description, true, Some(retry_after));
    }

    let code = status.as_u16();
    if matches!(code, 400 | 401 | 403 | 404) {
        return SendResult::failure(description, false, None);
    }
    if code == 429 {
        return SendResult::failure(description, true, None);
    }

    warn!(status = code, description = %description, "unclassified messaging API failure, treating as retryable");
    SendResult::failure(description, true, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_against(server: &MockServer) -> TelegramClient {
        TelegramClient::new(
            ClientConfig {
                api_base: server.uri(),
                ..ClientConfig::default()
            },
            "TESTTOKEN",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn happy_text_send_returns_message_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTESTTOKEN/sendMessage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": {"message_id": 42}
            })))
            .mount(&server)
            .await;

        let client = client_against(&server).await;
        let result = client
            .send_text("123", "<b>hi</b>", &PostOptions::default(), None)
            .await;

        assert!(result.ok);
        assert_eq!(result.message_id.as_deref(), Some("42"));
    }

    #[tokio::test]
    async fn rate_limit_sets_retry_after_and_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTESTTOKEN/sendMessage"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "ok": false,
                "description": "Too Many Requests",
                "parameters": {"retry_after": 120}
            })))
            .mount(&server)
            .await;

        let client = client_against(&server).await;
        let result = client
            .send_text("123", "hi", &PostOptions::default(), None)
            .await;

        assert!(!result.ok);
        assert!(result.retryable);
        assert_eq!(result.retry_after_seconds, Some(120));
    }

    #[tokio::test]
    async fn chat_not_found_is_non_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTESTTOKEN/sendMessage"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "ok": false,
                "description": "Bad Request: chat not found"
            })))
            .mount(&server)
            .await;

        let client = client_against(&server).await;
        let result = client
            .send_text("123", "hi", &PostOptions::default(), None)
            .await;

        assert!(!result.ok);
        assert!(!result.retryable);
    }

    #[tokio::test]
    async fn server_error_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTESTTOKEN/sendMessage"))
            .respond_with(ResponseTemplate::new(502).set_body_json(json!({
                "ok": false,
                "description": "Bad Gateway"
            })))
            .mount(&server)
            .await;

        let client = client_against(&server).await;
        let result = client
            .send_text("123", "hi", &PostOptions::default(), None)
            .await;

        assert!(!result.ok);
        assert!(result.retryable);
    }
}
