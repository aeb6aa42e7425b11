//! Companion bot entry-point: long-polls the Bot API and answers commands.

use std::sync::Arc;
use std::time::Duration;

use ortho_config::OrthoConfig;
use tracing::{info, info_span, warn};
use tracing_subscriber::{EnvFilter, fmt};

use taskboard::domain::{BotCommandHandler, BotService};
use taskboard::inbound::bot::{DEFAULT_RETRY_DELAY, run_polling};
use taskboard::inbound::shutdown::ShutdownListener;
use taskboard::outbound::telegram::TelegramBotApi;
use taskboard::settings::AppSettings;

fn startup_error(error: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::other(error.to_string())
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = AppSettings::load().map_err(startup_error)?;
    let mode = settings.run_mode().map_err(startup_error)?;
    let webapp_url = settings.webapp_url().map_err(startup_error)?;
    if webapp_url.is_none() {
        warn!("webapp_url is not configured; /webapp will reply with an error");
    }
    let timeout_secs = settings.bot_poll_timeout_secs();
    let token = settings.bot_token().map_err(startup_error)?;
    let api = TelegramBotApi::new(token, Duration::from_secs(timeout_secs))
        .map_err(startup_error)?;

    let handler = BotCommandHandler::new(webapp_url, mode, info_span!("bot_commands"));
    let service = BotService::new(Arc::new(api), handler, timeout_secs, info_span!("bot"));

    info!(mode = %mode, "companion bot starting");
    let shutdown = ShutdownListener::install();
    run_polling(&service, DEFAULT_RETRY_DELAY, async {
        let signal = shutdown.wait().await;
        info!(%signal, "shutdown requested; stopping bot");
    })
    .await;
    Ok(())
}
