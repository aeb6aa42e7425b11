//! DTOs for the Telegram Bot API JSON envelope.
//!
//! Responses are decoded into these transport DTOs first, then mapped into
//! domain updates in one pass. Update kinds the bot does not handle decode
//! with `message: None`.

use serde::{Deserialize, Serialize};

use crate::domain::{BotUpdate, IncomingMessage, OutgoingMessage};

#[derive(Debug, Deserialize)]
pub(super) struct ApiResponseDto<T> {
    pub(super) ok: bool,
    pub(super) result: Option<T>,
    pub(super) description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct UpdateDto {
    pub(super) update_id: i64,
    pub(super) message: Option<MessageDto>,
}

#[derive(Debug, Deserialize)]
pub(super) struct MessageDto {
    pub(super) chat: ChatDto,
    pub(super) text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ChatDto {
    pub(super) id: i64,
    #[serde(rename = "type")]
    pub(super) kind: String,
}

impl UpdateDto {
    pub(super) fn into_domain(self) -> BotUpdate {
        BotUpdate {
            update_id: self.update_id,
            message: self.message.map(|message| IncomingMessage {
                chat_id: message.chat.id,
                chat_kind: message.chat.kind,
                text: message.text,
            }),
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct GetUpdatesDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) offset: Option<i64>,
    pub(super) timeout: u64,
    pub(super) allowed_updates: [&'static str; 1],
}

impl GetUpdatesDto {
    pub(super) fn new(offset: Option<i64>, timeout: u64) -> Self {
        Self {
            offset,
            timeout,
            allowed_updates: ["message"],
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct SendMessageDto<'a> {
    pub(super) chat_id: i64,
    pub(super) text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) reply_markup: Option<InlineKeyboardDto<'a>>,
}

#[derive(Debug, Serialize)]
pub(super) struct InlineKeyboardDto<'a> {
    pub(super) inline_keyboard: [[UrlButtonDto<'a>; 1]; 1],
}

#[derive(Debug, Serialize)]
pub(super) struct UrlButtonDto<'a> {
    pub(super) text: &'a str,
    pub(super) url: &'a str,
}

impl<'a> From<&'a OutgoingMessage> for SendMessageDto<'a> {
    fn from(message: &'a OutgoingMessage) -> Self {
        Self {
            chat_id: message.chat_id,
            text: message.text.as_str(),
            reply_markup: message.button.as_ref().map(|button| InlineKeyboardDto {
                inline_keyboard: [[UrlButtonDto {
                    text: button.text.as_str(),
                    url: button.url.as_str(),
                }]],
            }),
        }
    }
}
