//! Telegram Bot API outbound adapter.
//!
//! A thin HTTP implementation of the `BotApi` port over `getUpdates` and
//! `sendMessage`.

mod dto;
mod http_api;

pub use http_api::TelegramBotApi;
