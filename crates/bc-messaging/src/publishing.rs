//! Orchestrates a single publication send across the text / single-media /
//! media-group variants, the media-group keyboard workaround, and pin
//! semantics. This is the one entry point the worker calls per publication.

use crate::{build_inline_keyboard, SendResult, TelegramClient};
use bc_common::Post;
use tracing::warn;

const MEDIA_GROUP_FOLLOWUP_TEXT: &str = "Подробнее:";

/// Sends `post`'s content to `chat_id`, choosing the text / single-media /
/// media-group variant by media count, and applying the media-group
/// keyboard workaround and pin semantics described on [`TelegramClient`].
pub async fn send_publication(client: &TelegramClient, chat_id: &str, post: &Post) -> SendResult {
    let keyboard = build_inline_keyboard(&post.buttons);
    let caption = if post.body_html.is_empty() {
        None
    } else {
        Some(post.body_html.as_str())
    };

    let result = match post.media.len() {
        0 => {
            client
                .send_text(chat_id, &post.body_html, &post.options, keyboard)
                .await
        }
        1 => {
            let item = &post.media[0];
            client
                .send_single_media(chat_id, item.kind, &item.url, caption, &post.options, keyboard)
                .await
        }
        _ => {
            send_media_group_with_keyboard(client, chat_id, post, caption, keyboard).await
        }
    };

    if result.ok && post.options.pin {
        if let Some(message_id) = &result.message_id {
            let pin_result = client.pin(chat_id, message_id).await;
            if !pin_result.ok {
                warn!(
                    chat_id,
                    message_id,
                    error = ?pin_result.error,
                    "pin failed, publication remains successful"
                );
            }
        }
    }

    result
}

/// Media count >= 2. The remote protocol doesn't support inline keyboards
/// on media groups: when a keyboard is present, send the group, then a
/// follow-up text message carrying the keyboard. The follow-up's
/// `message_id` becomes the recorded id; if it fails, the send is reported
/// failed even though the group message was delivered (the group message
/// is effectively orphaned).
async fn send_media_group_with_keyboard(
    client: &TelegramClient,
    chat_id: &str,
    post: &Post,
    caption: Option<&str>,
    keyboard: Option<serde_json::Value>,
) -> SendResult {
    let group_result = client
        .send_media_group(chat_id, &post.media, caption, &post.options)
        .await;

    if !group_result.ok {
        return group_result;
    }

    let Some(keyboard) = keyboard else {
        return group_result;
    };

    client
        .send_text(
            chat_id,
            MEDIA_GROUP_FOLLOWUP_TEXT,
            &post.options,
            Some(keyboard),
        )
        .await
}
