//! Per-connection WebSocket handler.
//!
//! One `tokio::select!` loop per connection multiplexes heartbeats, client
//! frames and hub events. The public contract pings every 5s and drops a
//! client after 10s of silence; tests shorten both.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use actix_ws::{CloseCode, CloseReason, Closed, Message, MessageStream, ProtocolError, Session};
use serde_json::json;
use tokio::sync::broadcast;
use tokio::time;
use tracing::{debug, info, warn};

use crate::domain::ports::{AskQuestion, QaCommand};
use crate::domain::{ErrorCode, Notification, TraceId, UserId};
use crate::inbound::ws::messages::{ClientCommand, FrameError, ServerFrame};
use crate::inbound::ws::state::WsState;

#[cfg(not(test))]
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
#[cfg(test)]
const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(50);

#[cfg(not(test))]
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);
#[cfg(test)]
const CLIENT_TIMEOUT: Duration = Duration::from_millis(100);

pub(super) async fn handle_ws_session(
    state: WsState,
    session_user: Option<UserId>,
    session: Session,
    stream: MessageStream,
) {
    let events = state.hub.subscribe();
    WsSession::new(Arc::clone(&state.qa), session_user)
        .run(session, stream, events)
        .await;
}

enum SessionError {
    ClientClosed(Option<CloseReason>),
    StreamClosed,
    HeartbeatTimeout,
    HubClosed,
    Protocol(ProtocolError),
    InvalidPayload,
    Network(Closed),
}

struct WsSession {
    qa: Arc<dyn QaCommand>,
    session_user: Option<UserId>,
    user: Option<UserId>,
    topics: BTreeSet<String>,
}

impl WsSession {
    fn new(qa: Arc<dyn QaCommand>, session_user: Option<UserId>) -> Self {
        Self {
            qa,
            session_user,
            user: None,
            topics: BTreeSet::new(),
        }
    }

    async fn run(
        &mut self,
        mut session: Session,
        mut stream: MessageStream,
        mut events: broadcast::Receiver<Notification>,
    ) {
        let mut last_heartbeat = Instant::now();
        let mut heartbeat = time::interval(HEARTBEAT_INTERVAL);

        loop {
            let result = tokio::select! {
                _ = heartbeat.tick() => {
                    Self::heartbeat(&mut session, last_heartbeat).await
                }
                message = stream.recv() => {
                    self.handle_stream_message(&mut session, &mut last_heartbeat, message).await
                }
                event = events.recv() => {
                    self.handle_event(&mut session, event).await
                }
            };

            if let Err(error) = result {
                log_shutdown_reason(&error);
                if let Some(reason) = close_reason_for(error) {
                    if let Err(close_error) = session.close(reason).await {
                        warn!(error = %close_error, "failed to close WebSocket session");
                    }
                }
                return;
            }
        }
    }

    async fn heartbeat(session: &mut Session, last_heartbeat: Instant) -> Result<(), SessionError> {
        if last_heartbeat.elapsed() > CLIENT_TIMEOUT {
            return Err(SessionError::HeartbeatTimeout);
        }
        session.ping(b"").await.map_err(SessionError::Network)
    }

    async fn handle_event(
        &self,
        session: &mut Session,
        event: Result<Notification, broadcast::error::RecvError>,
    ) -> Result<(), SessionError> {
        match event {
            Ok(notification) => {
                if notification.is_visible_to(self.user.as_ref(), &self.topics) {
                    send_frame(session, &ServerFrame::from(&notification))
                        .await
                        .map_err(SessionError::Network)?;
                }
                Ok(())
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "WebSocket session lagged behind the notification hub");
                Ok(())
            }
            Err(broadcast::error::RecvError::Closed) => Err(SessionError::HubClosed),
        }
    }

    async fn handle_stream_message(
        &mut self,
        session: &mut Session,
        last_heartbeat: &mut Instant,
        message: Option<Result<Message, ProtocolError>>,
    ) -> Result<(), SessionError> {
        let message = match message {
            None => return Err(SessionError::StreamClosed),
            Some(Err(error)) => return Err(SessionError::Protocol(error)),
            Some(Ok(message)) => message,
        };
        *last_heartbeat = Instant::now();

        match message {
            Message::Ping(payload) => session.pong(&payload).await.map_err(SessionError::Network),
            Message::Text(text) => self.handle_text(session, text.as_ref()).await,
            Message::Close(reason) => Err(SessionError::ClientClosed(reason)),
            Message::Pong(_) | Message::Binary(_) | Message::Continuation(_) | Message::Nop => {
                Ok(())
            }
        }
    }

    async fn handle_text(&mut self, session: &mut Session, text: &str) -> Result<(), SessionError> {
        let reply = match ClientCommand::parse(text) {
            Ok(command) => self.apply(session, command),
            Err(FrameError::Malformed(error)) => {
                warn!(%error, "rejected malformed WebSocket payload");
                return Err(SessionError::InvalidPayload);
            }
            Err(error) => {
                debug!(%error, "rejected WebSocket command");
                Some(ServerFrame::error(error.to_string()))
            }
        };
        match reply {
            Some(frame) => send_frame(session, &frame)
                .await
                .map_err(SessionError::Network),
            None => Ok(()),
        }
    }

    fn apply(&mut self, session: &Session, command: ClientCommand) -> Option<ServerFrame> {
        match command {
            ClientCommand::Auth { user_id } => Some(self.authenticate(&user_id)),
            ClientCommand::Subscribe(topics) => {
                self.topics.extend(topics);
                Some(ServerFrame::ack(
                    "subscribed",
                    json!({ "topics": self.topics }),
                ))
            }
            ClientCommand::Unsubscribe(topics) => {
                for topic in &topics {
                    self.topics.remove(topic);
                }
                Some(ServerFrame::ack("unsubscribed", json!({ "topics": topics })))
            }
            ClientCommand::Query { question, context } => match self.user {
                Some(user_id) => {
                    self.spawn_query(session.clone(), user_id, question, context);
                    None
                }
                None => Some(ServerFrame::error("Authentication required")),
            },
        }
    }

    fn authenticate(&mut self, claimed: &str) -> ServerFrame {
        let claimed = UserId::new(claimed).ok();
        match (claimed, self.session_user) {
            (Some(claimed), Some(session_user)) if claimed == session_user => {
                self.user = Some(session_user);
                info!(user_id = %session_user, "WebSocket session authenticated");
                ServerFrame::ack("authenticated", json!({ "userId": session_user }))
            }
            _ => {
                warn!("WebSocket auth did not match the session user");
                ServerFrame::error("Authentication failed")
            }
        }
    }

    /// Run the question off the select loop so heartbeats keep flowing; the
    /// answer itself reaches the client through the hub.
    fn spawn_query(
        &self,
        mut session: Session,
        user_id: UserId,
        question: String,
        context: Option<String>,
    ) {
        let qa = Arc::clone(&self.qa);
        let request = AskQuestion {
            user_id,
            question,
            context,
        };
        actix_web::rt::spawn(TraceId::scope(TraceId::generate(), async move {
            match qa.ask(request).await {
                Ok(answered) => debug!(query_id = %answered.id, "WebSocket query answered"),
                // The service already pushed an `error` notification.
                Err(error) if error.code() == ErrorCode::UpstreamFailure => {}
                Err(error) => {
                    if send_frame(&mut session, &ServerFrame::error(error.message()))
                        .await
                        .is_err()
                    {
                        debug!("WebSocket closed before the query error was delivered");
                    }
                }
            }
        }));
    }
}

async fn send_frame(session: &mut Session, frame: &ServerFrame) -> Result<(), Closed> {
    match serde_json::to_string(frame) {
        Ok(body) => session.text(body).await,
        Err(error) => {
            warn!(%error, "failed to serialise WebSocket frame");
            Ok(())
        }
    }
}

fn log_shutdown_reason(error: &SessionError) {
    match error {
        SessionError::HeartbeatTimeout => warn!("WebSocket heartbeat timeout; closing connection"),
        SessionError::Protocol(error) => warn!(%error, "WebSocket protocol error"),
        SessionError::Network(error) => warn!(%error, "WebSocket send failed; closing connection"),
        SessionError::HubClosed => info!("notification hub closed; ending WebSocket session"),
        SessionError::InvalidPayload | SessionError::ClientClosed(_) | SessionError::StreamClosed => {}
    }
}

fn close_reason_for(error: SessionError) -> Option<Option<CloseReason>> {
    let reason = |code, description: &str| {
        Some(Some(CloseReason {
            code,
            description: Some(description.to_owned()),
        }))
    };
    match error {
        SessionError::HeartbeatTimeout => reason(CloseCode::Away, "heartbeat timeout"),
        SessionError::HubClosed => reason(CloseCode::Away, "server shutting down"),
        SessionError::Protocol(_) => reason(CloseCode::Protocol, "protocol error"),
        SessionError::InvalidPayload => reason(CloseCode::Policy, "invalid payload"),
        SessionError::ClientClosed(reason) => Some(reason),
        SessionError::StreamClosed | SessionError::Network(_) => None,
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
