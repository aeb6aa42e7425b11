//! Long-polling driver for the companion bot.
//!
//! [`run_polling`] repeatedly asks [`BotService::poll_once`] for the next
//! batch, carrying the returned offset forward. Transport failures are logged
//! and retried after a back-off; only the shutdown signal ends the loop.

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use crate::domain::BotService;
use crate::domain::ports::BotApi;

/// Pause after a failed poll before trying again.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Poll until `shutdown` resolves.
///
/// Returns the last acknowledged offset so callers can log where polling
/// stopped.
pub async fn run_polling<B, S>(
    service: &BotService<B>,
    retry_delay: Duration,
    shutdown: S,
) -> Option<i64>
where
    B: BotApi + ?Sized,
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut offset = None;
    info!("bot polling started");
    loop {
        tokio::select! {
            () = &mut shutdown => break,
            polled = service.poll_once(offset) => match polled {
                Ok(next) => offset = next,
                Err(error) => {
                    warn!(error = %error, retry_in = ?retry_delay, "bot poll failed");
                    tokio::select! {
                        () = &mut shutdown => break,
                        () = tokio::time::sleep(retry_delay) => {}
                    }
                }
            },
        }
    }
    info!(offset = ?offset, "bot polling stopped");
    offset
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{BotApiError, MockBotApi};
    use crate::domain::{BotCommandHandler, BotUpdate, IncomingMessage, RunMode};
    use mockall::Sequence;
    use std::sync::Arc;
    use tokio::sync::oneshot;
    use tracing::Span;

    fn update(update_id: i64, text: &str) -> BotUpdate {
        BotUpdate {
            update_id,
            message: Some(IncomingMessage {
                chat_id: 1,
                chat_kind: "group".to_owned(),
                text: Some(text.to_owned()),
            }),
        }
    }

    fn service(api: MockBotApi) -> BotService<MockBotApi> {
        let handler = BotCommandHandler::new(None, RunMode::Production, Span::none());
        BotService::new(Arc::new(api), handler, 0, Span::none())
    }

    #[tokio::test]
    async fn advances_offset_and_retries_after_errors() {
        let (stop, stopped) = oneshot::channel::<()>();
        let stop = std::sync::Mutex::new(Some(stop));
        let mut api = MockBotApi::new();
        let mut seq = Sequence::new();
        api.expect_get_updates()
            .withf(|offset, _| offset.is_none())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(BotApiError::transport("connection reset")));
        api.expect_get_updates()
            .withf(|offset, _| offset.is_none())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(vec![update(10, "hello"), update(11, "/start")]));
        api.expect_send_message().times(1).returning(|_| Ok(()));
        api.expect_get_updates()
            .withf(|offset, _| *offset == Some(12))
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_, _| {
                if let Some(stop) = stop.lock().expect("lock").take() {
                    let _ = stop.send(());
                }
                Ok(Vec::new())
            });
        api.expect_get_updates()
            .withf(|offset, _| *offset == Some(12))
            .returning(|_, _| Ok(Vec::new()));

        let service = service(api);
        let offset = tokio::time::timeout(
            Duration::from_secs(2),
            run_polling(&service, Duration::from_millis(5), async {
                let _ = stopped.await;
            }),
        )
        .await
        .expect("polling stops on shutdown");

        assert_eq!(offset, Some(12));
    }

    #[tokio::test]
    async fn shutdown_interrupts_the_back_off() {
        let mut api = MockBotApi::new();
        api.expect_get_updates()
            .times(1)
            .returning(|_, _| Err(BotApiError::rejected("Unauthorized")));
        let service = service(api);

        let offset = tokio::time::timeout(
            Duration::from_secs(2),
            run_polling(
                &service,
                Duration::from_secs(3600),
                tokio::time::sleep(Duration::from_millis(20)),
            ),
        )
        .await
        .expect("shutdown ends the back-off");

        assert_eq!(offset, None);
    }
}
