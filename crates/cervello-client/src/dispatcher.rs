//! Real-time client: one dispatch loop over the connection's lifecycle
//! events.
//!
//! The loop authenticates and replays subscriptions whenever a socket opens,
//! keeps a bounded buffer of recent `update` frames, routes every frame to
//! the [`Router`], and reports connection status. Error frames, high-priority
//! updates and a terminal reconnect failure are raised through the
//! [`Notifier`].

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use url::Url;

use crate::config::{ClientConfig, ClientConfigError};
use crate::connection::{
    Connection, ConnectionEvent, ConnectionManager, Connector, DEFAULT_EVENT_CAPACITY, Outgoing,
    ReconnectSleeper, TokioSleeper,
};
use crate::notifier::{Notifier, TracingNotifier};
use crate::router::{ControlFrame, Router, ServerMessage, SubscriptionId, TopicSubscription};
use crate::tungstenite::TungsteniteConnector;

/// Recent `update` frames kept for late readers.
pub const RECENT_UPDATES_LIMIT: usize = 100;
/// Notice raised once every reconnect attempt has failed.
pub const RECONNECT_FAILED_NOTICE: &str =
    "Unable to connect to real-time updates. Please refresh the page.";

/// Connection status as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// No socket.
    Disconnected,
    /// Socket open and authenticated.
    Connected,
    /// Waiting to retry.
    Reconnecting,
    /// Gave up; real-time updates are unavailable.
    Failed,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn remember(recent: &mut VecDeque<ServerMessage>, message: ServerMessage, limit: usize) {
    recent.push_back(message);
    while recent.len() > limit {
        recent.pop_front();
    }
}

struct Shared {
    manager: ConnectionManager,
    router: Mutex<Router>,
    recent: Mutex<VecDeque<ServerMessage>>,
    user_id: Mutex<Option<String>>,
    status: watch::Sender<ConnectionStatus>,
    notifier: Arc<dyn Notifier>,
}

impl Shared {
    fn set_status(&self, next: ConnectionStatus) {
        self.status.send_modify(|current| *current = next);
    }

    fn send_control(&self, frame: &ControlFrame) {
        if !self.manager.is_connected() {
            return;
        }
        if !self.manager.send(None, frame.to_json()) {
            debug!(?frame, "control frame not sent");
        }
    }

    fn handle(&self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Opened => {
                self.set_status(ConnectionStatus::Connected);
                self.announce();
            }
            ConnectionEvent::Message(text) => self.handle_text(&text),
            ConnectionEvent::Closed { code } => {
                debug!(code, "real-time connection closed");
                self.set_status(ConnectionStatus::Disconnected);
            }
            ConnectionEvent::Reconnecting { attempt, .. } => {
                debug!(attempt, "real-time connection reconnecting");
                self.set_status(ConnectionStatus::Reconnecting);
            }
            ConnectionEvent::Failed => {
                error!("WebSocket reconnection failed after multiple attempts");
                self.set_status(ConnectionStatus::Failed);
                self.notifier.error(RECONNECT_FAILED_NOTICE);
            }
        }
    }

    fn announce(&self) {
        let user = lock(&self.user_id).clone();
        if let Some(user_id) = user {
            self.send_control(&ControlFrame::Auth { user_id });
        }
        let frames = lock(&self.router).resubscribe_frames();
        for frame in &frames {
            self.send_control(frame);
        }
    }

    fn handle_text(&self, text: &str) {
        let message = match ServerMessage::parse(text) {
            Ok(message) => message,
            Err(err) => {
                warn!(error = %err, "error parsing WebSocket message");
                return;
            }
        };
        if message.is_ack() {
            debug!(event = ?message.data.get("event"), "real-time acknowledgement");
            return;
        }
        match message.kind.as_str() {
            "update" => {
                if message.is_high_priority() {
                    self.notifier
                        .success(message.text().unwrap_or("New update available"));
                }
                remember(&mut lock(&self.recent), message.clone(), RECENT_UPDATES_LIMIT);
            }
            "error" => {
                let reported = message.text().unwrap_or("An error occurred");
                error!(message = reported, "WebSocket error message");
                self.notifier.error(reported);
            }
            _ => {}
        }
        lock(&self.router).route(&message);
    }
}

async fn dispatch_loop(mut events: mpsc::Receiver<ConnectionEvent>, shared: Arc<Shared>) {
    while let Some(event) = events.recv().await {
        shared.handle(event);
    }
}

/// Push channel client shared by the application.
///
/// Subscription callbacks run on the dispatch task and must not call back
/// into the client.
pub struct RealtimeClient {
    url: Url,
    shared: Arc<Shared>,
    dispatch: JoinHandle<()>,
}

impl RealtimeClient {
    /// Client for `url`. Must be created inside a tokio runtime.
    pub fn new(
        url: Url,
        connector: Arc<dyn Connector>,
        sleeper: Arc<dyn ReconnectSleeper>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (manager, events) = ConnectionManager::new(connector, sleeper, DEFAULT_EVENT_CAPACITY);
        let (status, _) = watch::channel(ConnectionStatus::Disconnected);
        let shared = Arc::new(Shared {
            manager,
            router: Mutex::new(Router::default()),
            recent: Mutex::new(VecDeque::new()),
            user_id: Mutex::new(None),
            status,
            notifier,
        });
        let dispatch = tokio::spawn(dispatch_loop(events, Arc::clone(&shared)));
        Self {
            url,
            shared,
            dispatch,
        }
    }

    /// Client using the tungstenite connector, tokio timers and tracing
    /// notices.
    ///
    /// # Errors
    ///
    /// Returns [`ClientConfigError`] when the configured URL is invalid.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientConfigError> {
        Ok(Self::new(
            config.ws_url()?,
            Arc::new(TungsteniteConnector),
            Arc::new(TokioSleeper),
            Arc::new(TracingNotifier),
        ))
    }

    /// Set or clear the signed-in user sent in `auth` frames.
    pub fn set_user(&self, user_id: Option<String>) {
        *lock(&self.shared.user_id) = user_id;
    }

    /// Connect when a user is signed in; `None` otherwise.
    pub fn connect(&self) -> Option<Connection> {
        if lock(&self.shared.user_id).is_none() {
            debug!("skipping real-time connection without a signed-in user");
            return None;
        }
        Some(self.shared.manager.connect(&self.url))
    }

    /// Close the connection and cancel any pending reconnect.
    pub fn disconnect(&self) {
        self.shared.manager.disconnect(None);
        self.shared.set_status(ConnectionStatus::Disconnected);
    }

    /// Whether the socket is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.manager.is_connected()
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        *self.shared.status.borrow()
    }

    /// Watch status changes.
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.shared.status.subscribe()
    }

    /// Send an arbitrary frame.
    pub fn send_message(&self, payload: impl Into<Outgoing>) -> bool {
        self.shared.manager.send(None, payload)
    }

    fn send_topics(&self, frame: &ControlFrame, action: &str) -> bool {
        if !self.is_connected() {
            error!(action, "Cannot change subscriptions: WebSocket is not connected");
            return false;
        }
        self.shared.manager.send(None, frame.to_json())
    }

    /// Ask the server for `topics`.
    pub fn subscribe<I, S>(&self, topics: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let frame = ControlFrame::Subscribe(topics.into_iter().map(Into::into).collect());
        self.send_topics(&frame, "subscribe")
    }

    /// Stop receiving `topics`.
    pub fn unsubscribe<I, S>(&self, topics: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let frame = ControlFrame::Unsubscribe(topics.into_iter().map(Into::into).collect());
        self.send_topics(&frame, "unsubscribe")
    }

    /// Register `subscription`, subscribing on the server when open.
    pub fn add_subscription(&self, subscription: TopicSubscription) -> SubscriptionId {
        let (id, frame) = lock(&self.shared.router).add(subscription);
        if let Some(subscribe) = frame {
            self.shared.send_control(&subscribe);
        }
        id
    }

    /// Change the topics of `id`.
    pub fn update_subscription<I, S>(&self, id: SubscriptionId, topics: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let frames = lock(&self.shared.router).set_topics(id, topics);
        for frame in &frames {
            self.shared.send_control(frame);
        }
    }

    /// Drop `id`, unsubscribing on the server when open.
    pub fn remove_subscription(&self, id: SubscriptionId) {
        let frame = lock(&self.shared.router).remove(id);
        if let Some(unsubscribe) = frame {
            self.shared.send_control(&unsubscribe);
        }
    }

    /// Messages matched by `id` so far.
    #[must_use]
    pub fn subscription_matches(&self, id: SubscriptionId) -> Vec<ServerMessage> {
        lock(&self.shared.router)
            .get(id)
            .map(|subscription| subscription.matches().to_vec())
            .unwrap_or_default()
    }

    /// Send `payload` tagged with the first topic of `id`.
    pub fn send_topic_message(&self, id: SubscriptionId, payload: Value) -> bool {
        let tagged = lock(&self.shared.router)
            .get(id)
            .map(|subscription| subscription.tag(payload));
        match tagged {
            Some(message) => self.send_message(message),
            None => {
                warn!(?id, "unknown subscription");
                false
            }
        }
    }

    /// Recent `update` frames, oldest first.
    #[must_use]
    pub fn recent_updates(&self) -> Vec<ServerMessage> {
        lock(&self.shared.recent).iter().cloned().collect()
    }

    /// Forget buffered updates.
    pub fn clear_updates(&self) {
        lock(&self.shared.recent).clear();
    }
}

impl Drop for RealtimeClient {
    fn drop(&mut self) {
        self.shared.manager.disconnect(None);
        self.dispatch.abort();
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
