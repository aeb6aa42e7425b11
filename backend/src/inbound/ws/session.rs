//! Per-connection WebSocket handler.
//!
//! Keeps WebSocket framing and heartbeats at the edge while the mounted
//! [`TaskBoard`] owns list and mutation state. The public contract pings
//! every 5s and considers a connection idle after 10s without client
//! traffic. Tests shorten these intervals to speed up feedback.

use std::sync::Arc;
use std::time::{Duration, Instant};

use actix_ws::{CloseCode, CloseReason, Closed, Message, MessageStream, ProtocolError, Session};
use tokio::sync::mpsc;
use tokio::time;
use tracing::{Instrument, Span, debug, warn};

use crate::domain::{
    BoardView, Error, GroupId, LaunchContext, PlatformIdentity, TaskBoard, TaskId,
};
use crate::inbound::ws::messages::{BoardFrame, ClientCommand, ErrorFrame, HelloFrame, ServerFrame};
use crate::inbound::ws::state::WsState;

/// Time between heartbeats to the client (5s in production, shorter in tests).
#[cfg(not(test))]
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
#[cfg(test)]
const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(50);

/// Max idle time before disconnecting the client (10s in production, shorter in tests).
#[cfg(not(test))]
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);
#[cfg(test)]
const CLIENT_TIMEOUT: Duration = Duration::from_millis(100);

/// Pending mutation failures waiting to be reported.
const FAILURE_BUFFER: usize = 16;

/// Launch parameters taken from the upgrade request.
#[derive(Debug, Clone, Default)]
pub(super) struct LaunchParams {
    pub(super) start_param: Option<String>,
    pub(super) init_data: Option<String>,
}

pub(super) async fn handle_ws_session(
    state: WsState,
    launch: LaunchParams,
    mut session: Session,
    stream: MessageStream,
    span: Span,
) {
    let group = match state.groups.resolve(launch.start_param.as_deref()) {
        Ok(group) => group,
        Err(error) => {
            let error = Error::from(error);
            span.in_scope(|| warn!(code = ?error.code(), "rejecting session without a usable group"));
            if send_json(&mut session, &ServerFrame::Error(ErrorFrame::from(&error)))
                .await
                .is_ok()
            {
                let reason = CloseReason {
                    code: CloseCode::Policy,
                    description: Some(error.message().to_owned()),
                };
                if let Err(error) = session.close(Some(reason)).await {
                    span.in_scope(|| warn!(error = %error, "Failed to close WebSocket session"));
                }
            }
            return;
        }
    };
    span.record("group", tracing::field::display(&group));

    let context = launch
        .init_data
        .as_deref()
        .map_or_else(LaunchContext::empty, LaunchContext::from_init_data);
    let identity = state.identities.resolve(&context).await.ok();

    let board = Arc::new(TaskBoard::mount(
        Arc::clone(&state.tasks),
        group.clone(),
        span.clone(),
    ));
    let (ws, failures) = WsSession::new(board, span.clone());
    ws.run(session, stream, failures, &group, identity)
        .instrument(span)
        .await;
}

enum SessionError {
    ClientClosed(Option<CloseReason>),
    StreamClosed,
    HeartbeatTimeout,
    Protocol(ProtocolError),
    InvalidPayload,
    BoardClosed,
    Network(Closed),
}

enum CloseAction {
    None,
    Close(Option<CloseReason>),
}

struct WsSession {
    board: Arc<TaskBoard>,
    failures: mpsc::Sender<Error>,
    span: Span,
    last_view: Option<BoardView>,
}

impl WsSession {
    fn new(board: Arc<TaskBoard>, span: Span) -> (Self, mpsc::Receiver<Error>) {
        let (failures, receiver) = mpsc::channel(FAILURE_BUFFER);
        (
            Self {
                board,
                failures,
                span,
                last_view: None,
            },
            receiver,
        )
    }

    async fn run(
        mut self,
        mut session: Session,
        mut stream: MessageStream,
        mut failures: mpsc::Receiver<Error>,
        group: &GroupId,
        identity: Option<PlatformIdentity>,
    ) {
        let mut changes = self.board.changes();
        let opened = self
            .send_frame(&mut session, &ServerFrame::Hello(HelloFrame::new(group, identity)))
            .await;
        let mut result = match opened {
            Ok(()) => self.push_view(&mut session).await,
            Err(error) => Err(SessionError::Network(error)),
        };

        let mut last_heartbeat = Instant::now();
        let mut heartbeat = time::interval(HEARTBEAT_INTERVAL);

        while result.is_ok() {
            result = tokio::select! {
                _ = heartbeat.tick() => {
                    self.handle_heartbeat_tick(&mut session, &last_heartbeat).await
                }
                message = stream.recv() => {
                    self.handle_stream_message(&mut session, &mut last_heartbeat, message)
                        .await
                }
                changed = changes.changed() => {
                    self.handle_board_change(&mut session, changed).await
                }
                Some(error) = failures.recv() => {
                    self.send_frame(&mut session, &ServerFrame::Error(ErrorFrame::from(&error)))
                        .await
                        .map_err(SessionError::Network)
                }
            };
        }

        self.board.unmount();
        if let Err(error) = result {
            self.log_shutdown_reason(&error);
            let close_action = self.close_action_for(&error);
            self.close_session_if_needed(session, close_action).await;
        }
    }

    async fn handle_heartbeat_tick(
        &self,
        session: &mut Session,
        last_heartbeat: &Instant,
    ) -> Result<(), SessionError> {
        if Instant::now().duration_since(*last_heartbeat) > CLIENT_TIMEOUT {
            return Err(SessionError::HeartbeatTimeout);
        }

        session.ping(b"").await.map_err(SessionError::Network)
    }

    async fn handle_board_change(
        &mut self,
        session: &mut Session,
        changed: bool,
    ) -> Result<(), SessionError> {
        if !changed {
            return Err(SessionError::BoardClosed);
        }
        self.push_view(session).await
    }

    /// Send the current view unless it matches the last one sent.
    async fn push_view(&mut self, session: &mut Session) -> Result<(), SessionError> {
        let view = self.board.view();
        if self.last_view.as_ref() == Some(&view) {
            return Ok(());
        }
        self.send_frame(session, &ServerFrame::Board(BoardFrame::from(&view)))
            .await
            .map_err(SessionError::Network)?;
        self.last_view = Some(view);
        Ok(())
    }

    async fn handle_stream_message(
        &self,
        session: &mut Session,
        last_heartbeat: &mut Instant,
        message: Option<Result<Message, ProtocolError>>,
    ) -> Result<(), SessionError> {
        let Some(message) = message else {
            return Err(SessionError::StreamClosed);
        };

        match message {
            Ok(message) => self.handle_message(session, last_heartbeat, message).await,
            Err(error) => Err(SessionError::Protocol(error)),
        }
    }

    async fn handle_message(
        &self,
        session: &mut Session,
        last_heartbeat: &mut Instant,
        message: Message,
    ) -> Result<(), SessionError> {
        match message {
            Message::Ping(payload) => {
                *last_heartbeat = Instant::now();
                session
                    .pong(&payload)
                    .await
                    .map_err(SessionError::Network)?;
                Ok(())
            }
            Message::Text(text) => {
                *last_heartbeat = Instant::now();
                self.handle_text_message(text.as_ref())
            }
            Message::Pong(_) | Message::Binary(_) | Message::Continuation(_) | Message::Nop => {
                *last_heartbeat = Instant::now();
                Ok(())
            }
            Message::Close(reason) => Err(SessionError::ClientClosed(reason)),
        }
    }

    fn handle_text_message(&self, text: &str) -> Result<(), SessionError> {
        let command = match serde_json::from_str::<ClientCommand>(text) {
            Ok(command) => command,
            Err(error) => {
                warn!(error = %error, "Rejected malformed WebSocket payload");
                return Err(SessionError::InvalidPayload);
            }
        };
        self.dispatch(command);
        Ok(())
    }

    /// Run a command without blocking the receive loop.
    fn dispatch(&self, command: ClientCommand) {
        if matches!(command, ClientCommand::Retry) {
            self.board.retry();
            return;
        }

        let board = Arc::clone(&self.board);
        let failures = self.failures.clone();
        let task = async move {
            let result = match command {
                ClientCommand::Create { title } => board.create(&title).await.map(drop),
                ClientCommand::Toggle { id } => match parse_task_id(id) {
                    Ok(id) => board.toggle(&id).await.map(drop),
                    Err(error) => return report(&failures, error).await,
                },
                ClientCommand::Delete { id } => match parse_task_id(id) {
                    Ok(id) => board.delete(&id).await.map(drop),
                    Err(error) => return report(&failures, error).await,
                },
                ClientCommand::Retry => Ok(()),
            };
            if let Err(error) = result {
                debug!(error = %error, "task mutation failed");
                report(&failures, Error::from(error)).await;
            }
        };
        actix_web::rt::spawn(task.instrument(self.span.clone()));
    }

    fn log_shutdown_reason(&self, error: &SessionError) {
        match error {
            SessionError::HeartbeatTimeout => {
                warn!("WebSocket heartbeat timeout; closing connection");
            }
            SessionError::Protocol(error) => {
                warn!(error = %error, "WebSocket protocol error");
            }
            SessionError::Network(error) => {
                warn!(error = %error, "WebSocket send failed; closing connection");
            }
            SessionError::BoardClosed => {
                warn!("task board stopped publishing; closing connection");
            }
            SessionError::InvalidPayload
            | SessionError::ClientClosed(_)
            | SessionError::StreamClosed => {}
        }
    }

    fn close_action_for(&self, error: &SessionError) -> CloseAction {
        match error {
            SessionError::HeartbeatTimeout => CloseAction::Close(Some(CloseReason {
                code: CloseCode::Normal,
                description: Some("heartbeat timeout".to_owned()),
            })),
            SessionError::Protocol(_) => CloseAction::Close(Some(CloseReason {
                code: CloseCode::Protocol,
                description: Some("protocol error".to_owned()),
            })),
            SessionError::InvalidPayload => CloseAction::Close(Some(CloseReason {
                code: CloseCode::Policy,
                description: Some("invalid payload".to_owned()),
            })),
            SessionError::BoardClosed => CloseAction::Close(Some(CloseReason {
                code: CloseCode::Error,
                description: Some("task board closed".to_owned()),
            })),
            SessionError::ClientClosed(reason) => CloseAction::Close(reason.clone()),
            SessionError::StreamClosed | SessionError::Network(_) => CloseAction::None,
        }
    }

    async fn close_session_if_needed(&self, session: Session, close_action: CloseAction) {
        if let CloseAction::Close(reason) = close_action {
            if let Err(error) = session.close(reason).await {
                warn!(error = %error, "Failed to close WebSocket session");
            }
        }
    }

    async fn send_frame(&self, session: &mut Session, frame: &ServerFrame) -> Result<(), Closed> {
        send_json(session, frame).await
    }
}

fn parse_task_id(raw: String) -> Result<TaskId, Error> {
    TaskId::new(raw).map_err(|err| Error::invalid_request(err.to_string()))
}

async fn report(failures: &mpsc::Sender<Error>, error: Error) {
    if failures.send(error).await.is_err() {
        debug!("session ended before a mutation failure could be reported");
    }
}

async fn send_json<T: serde::Serialize>(session: &mut Session, payload: &T) -> Result<(), Closed> {
    match serde_json::to_string(payload) {
        Ok(body) => session.text(body).await,
        Err(error) => {
            warn!(error = %error, "Failed to serialize WebSocket payload");
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
