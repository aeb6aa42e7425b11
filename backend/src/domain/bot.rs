//! Companion bot commands.
//!
//! The bot's only job is handing out the mini-app link for the current chat.
//! Commands are answered through the [`BotApi`] port; the long-polling loop
//! lives in the inbound adapter.

use std::sync::Arc;

use tracing::{Instrument, Span, debug, info, warn};
use url::Url;

use super::ports::{BotApi, BotApiError};
use super::{RunMode, decode_group_id, deep_link, encode_group_id};

/// One update received from the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotUpdate {
    /// Monotonic update identifier.
    pub update_id: i64,
    /// Message carried by the update, if any.
    pub message: Option<IncomingMessage>,
}

/// A chat message addressed to the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    /// Chat the message was posted in.
    pub chat_id: i64,
    /// Chat kind reported by the platform (`private`, `group`, ...).
    pub chat_kind: String,
    /// Text body; `None` for stickers, photos and the like.
    pub text: Option<String>,
}

/// Inline button opening a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlButton {
    /// Button label.
    pub text: String,
    /// Target URL.
    pub url: Url,
}

/// A reply to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Destination chat.
    pub chat_id: i64,
    /// Message body.
    pub text: String,
    /// Optional inline URL button.
    pub button: Option<UrlButton>,
}

impl OutgoingMessage {
    fn text(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            button: None,
        }
    }
}

/// Commands the bot understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    /// `/start`
    Start,
    /// `/help`
    Help,
    /// `/webapp`
    WebApp,
}

impl BotCommand {
    /// Parse the leading command of `text`, accepting `/cmd@botname` and
    /// trailing arguments.
    ///
    /// # Examples
    /// ```
    /// use taskboard::domain::BotCommand;
    ///
    /// assert_eq!(BotCommand::parse("/webapp@task_bot now"), Some(BotCommand::WebApp));
    /// assert_eq!(BotCommand::parse("hello"), None);
    /// ```
    pub fn parse(text: &str) -> Option<Self> {
        let first = text.split_whitespace().next()?;
        let name = first.strip_prefix('/')?;
        let name = name.split_once('@').map_or(name, |(command, _)| command);
        match name.to_ascii_lowercase().as_str() {
            "start" => Some(Self::Start),
            "help" => Some(Self::Help),
            "webapp" => Some(Self::WebApp),
            _ => None,
        }
    }
}

const WELCOME_TEXT: &str = "Welcome! Use /help to see available commands.";
const HELP_TEXT: &str = "Available commands:\n\
/start - Start the bot\n\
/help - Show this help message\n\
/webapp - Open the Task Board web app";
const OPEN_TEXT: &str = "Open the task board";
const OPEN_BUTTON: &str = "Open App";
const LINK_ERROR_TEXT: &str = "Something went wrong while opening the task board.";

/// Turns incoming messages into replies.
#[derive(Debug, Clone)]
pub struct BotCommandHandler {
    webapp_url: Option<Url>,
    mode: RunMode,
    span: Span,
}

impl BotCommandHandler {
    /// Create a handler linking to `webapp_url`.
    pub fn new(webapp_url: Option<Url>, mode: RunMode, span: Span) -> Self {
        Self {
            webapp_url,
            mode,
            span,
        }
    }

    /// Replies for `message`; empty for anything that is not a command.
    pub fn replies(&self, message: &IncomingMessage) -> Vec<OutgoingMessage> {
        let _entered = self.span.enter();
        let chat_id = message.chat_id;
        let Some(command) = message.text.as_deref().and_then(BotCommand::parse) else {
            if self.mode.is_development() {
                debug!(
                    chat_id,
                    chat_kind = %message.chat_kind,
                    text = message.text.as_deref().unwrap_or("[non-text message]"),
                    "ignored message"
                );
            }
            return Vec::new();
        };

        match command {
            BotCommand::Start => vec![OutgoingMessage::text(chat_id, WELCOME_TEXT)],
            BotCommand::Help => vec![OutgoingMessage::text(chat_id, HELP_TEXT)],
            BotCommand::WebApp => self.webapp_replies(message),
        }
    }

    fn webapp_replies(&self, message: &IncomingMessage) -> Vec<OutgoingMessage> {
        let chat_id = message.chat_id;
        let Some(base) = self.webapp_url.as_ref() else {
            warn!(chat_id, "webapp url is not configured");
            return vec![OutgoingMessage::text(chat_id, LINK_ERROR_TEXT)];
        };

        let link = deep_link(base, chat_id);
        let encoded = encode_group_id(&chat_id.to_string());
        info!(chat_id, chat_kind = %message.chat_kind, encoded = %encoded, "issued task board link");

        let mut replies = vec![OutgoingMessage {
            chat_id,
            text: OPEN_TEXT.to_owned(),
            button: Some(UrlButton {
                text: OPEN_BUTTON.to_owned(),
                url: link.clone(),
            }),
        }];

        if self.mode.is_development() {
            let decoded = decode_group_id(&encoded)
                .map_or_else(|error| error.to_string(), |group| group.to_string());
            replies.push(OutgoingMessage::text(
                chat_id,
                format!(
                    "Debug info:\nGroup ID: {chat_id}\nEncoded ID: {encoded}\n\n\
                     Decoded check: {decoded}\n\nWeb app URL: {link}"
                ),
            ));
        }
        replies
    }
}

/// Fetches updates and answers them through a [`BotApi`].
pub struct BotService<B: ?Sized> {
    api: Arc<B>,
    handler: BotCommandHandler,
    poll_timeout_secs: u64,
    span: Span,
}

impl<B> BotService<B>
where
    B: BotApi + ?Sized,
{
    /// Create a service long-polling with `poll_timeout_secs`.
    pub fn new(api: Arc<B>, handler: BotCommandHandler, poll_timeout_secs: u64, span: Span) -> Self {
        Self {
            api,
            handler,
            poll_timeout_secs,
            span,
        }
    }

    /// Fetch one batch of updates starting at `offset` and answer them.
    ///
    /// Returns the offset for the next poll. A failed reply is logged and
    /// does not hold back the offset.
    pub async fn poll_once(&self, offset: Option<i64>) -> Result<Option<i64>, BotApiError> {
        let span = self.span.clone();
        async move {
            let updates = self.api.get_updates(offset, self.poll_timeout_secs).await?;
            let mut next = offset;
            for update in updates {
                next = Some(next.map_or(update.update_id + 1, |current| {
                    current.max(update.update_id + 1)
                }));
                let Some(message) = update.message.as_ref() else {
                    continue;
                };
                for reply in self.handler.replies(message) {
                    if let Err(error) = self.api.send_message(&reply).await {
                        warn!(chat_id = reply.chat_id, error = %error, "failed to send reply");
                    }
                }
            }
            Ok(next)
        }
        .instrument(span)
        .await
    }
}
