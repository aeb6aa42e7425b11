//! Reqwest-backed Telegram Bot API adapter.
//!
//! Owns transport details only: request serialisation, timeouts, HTTP error
//! mapping and envelope decoding. The bot token is part of every request URL,
//! so transport errors are stripped of their URL before they are surfaced.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::dto::{ApiResponseDto, GetUpdatesDto, SendMessageDto, UpdateDto};
use crate::domain::ports::{BotApi, BotApiError};
use crate::domain::{BotUpdate, OutgoingMessage};

const DEFAULT_API_BASE: &str = "https://api.telegram.org";
/// Headroom on top of the long-poll timeout before the request is abandoned.
const REQUEST_GRACE: Duration = Duration::from_secs(10);

/// Bot API adapter bound to one bot token.
pub struct TelegramBotApi {
    client: Client,
    base: Url,
}

impl TelegramBotApi {
    /// Build an adapter for `token` against the public API.
    ///
    /// `poll_timeout` is the longest long-poll the caller will request.
    ///
    /// # Errors
    ///
    /// Returns an error when the token cannot form a URL or the reqwest
    /// client cannot be constructed.
    pub fn new(token: &str, poll_timeout: Duration) -> Result<Self, BotApiError> {
        let api_base = Url::parse(DEFAULT_API_BASE)
            .map_err(|err| BotApiError::transport(err.to_string()))?;
        Self::with_api_base(api_base, token, poll_timeout)
    }

    /// Build an adapter against a custom API base URL.
    ///
    /// # Errors
    ///
    /// Returns an error when the token cannot form a URL or the reqwest
    /// client cannot be constructed.
    pub fn with_api_base(
        api_base: Url,
        token: &str,
        poll_timeout: Duration,
    ) -> Result<Self, BotApiError> {
        let base = bot_base(&api_base, token)?;
        let client = Client::builder()
            .timeout(poll_timeout + REQUEST_GRACE)
            .build()
            .map_err(map_transport_error)?;
        Ok(Self { client, base })
    }

    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T, BotApiError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = self
            .base
            .join(method)
            .map_err(|err| BotApiError::transport(err.to_string()))?;
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(map_transport_error)?;
        decode_envelope(status, bytes.as_ref())
    }
}

fn bot_base(api_base: &Url, token: &str) -> Result<Url, BotApiError> {
    if token.trim().is_empty() || token.contains('/') {
        return Err(BotApiError::rejected("bot token is not valid"));
    }
    api_base
        .join(&format!("./bot{token}/"))
        .map_err(|err| BotApiError::transport(err.to_string()))
}

#[async_trait]
impl BotApi for TelegramBotApi {
    async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<BotUpdate>, BotApiError> {
        let updates: Vec<UpdateDto> = self
            .call("getUpdates", &GetUpdatesDto::new(offset, timeout_secs))
            .await?;
        Ok(updates.into_iter().map(UpdateDto::into_domain).collect())
    }

    async fn send_message(&self, message: &OutgoingMessage) -> Result<(), BotApiError> {
        let _sent: serde_json::Value = self
            .call("sendMessage", &SendMessageDto::from(message))
            .await?;
        Ok(())
    }
}

fn decode_envelope<T: DeserializeOwned>(status: StatusCode, body: &[u8]) -> Result<T, BotApiError> {
    let envelope: ApiResponseDto<T> = match serde_json::from_slice(body) {
        Ok(envelope) => envelope,
        Err(_) if !status.is_success() => return Err(map_status_error(status, body)),
        Err(err) => {
            return Err(BotApiError::transport(format!(
                "invalid bot api payload: {err}"
            )));
        }
    };
    match (envelope.ok, envelope.result) {
        (true, Some(result)) => Ok(result),
        (true, None) => Err(BotApiError::transport("bot api response has no result")),
        (false, _) => Err(BotApiError::rejected(
            envelope
                .description
                .unwrap_or_else(|| format!("status {}", status.as_u16())),
        )),
    }
}

fn map_transport_error(error: reqwest::Error) -> BotApiError {
    BotApiError::transport(error.without_url().to_string())
}

fn map_status_error(status: StatusCode, body: &[u8]) -> BotApiError {
    let preview = body_preview(body);
    let message = if preview.is_empty() {
        format!("status {}", status.as_u16())
    } else {
        format!("status {}: {}", status.as_u16(), preview)
    };
    if status.is_client_error() {
        BotApiError::rejected(message)
    } else {
        BotApiError::transport(message)
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}
