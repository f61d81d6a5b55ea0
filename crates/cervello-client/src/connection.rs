//! Push channel connection manager.
//!
//! A [`ConnectionManager`] owns at most one live [`Connection`]. Each
//! connection is driven by its own task which dials through a [`Connector`],
//! pumps frames, and reconnects with exponential backoff after abnormal
//! closures. Lifecycle changes are pushed into a bounded channel that a
//! single consumer (normally [`crate::RealtimeClient`]) drains.
//!
//! ```text
//! connect ─▶ Connecting ─▶ Open ─┬─ close 1000 ─────────────▶ Closed
//!                ▲               └─ other close ─▶ Reconnecting
//!                └──────────── base × 2^(attempt−1) ◀─┘ (5 attempts, then Failed)
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::ConnectError;

/// Close code for an intentional shutdown; never followed by a reconnect.
pub const NORMAL_CLOSURE: u16 = 1000;
/// Close code reported when no close frame was received.
pub const NO_STATUS_RECEIVED: u16 = 1005;
/// Close code used for dial failures and dropped sockets.
pub const ABNORMAL_CLOSURE: u16 = 1006;
/// Reconnect attempts made before giving up.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;
/// Delay before the first reconnect attempt.
pub const RECONNECT_BASE_DELAY: Duration = Duration::from_secs(1);
/// Close reason sent by [`ConnectionManager::disconnect`].
pub const DISCONNECT_REASON: &str = "Deliberately closed by client";
/// Default capacity of the lifecycle event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Backoff delay before reconnect `attempt` (1-based).
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use cervello_client::connection::reconnect_delay;
///
/// assert_eq!(reconnect_delay(1), Duration::from_secs(1));
/// assert_eq!(reconnect_delay(5), Duration::from_secs(16));
/// ```
#[must_use]
pub const fn reconnect_delay(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1);
    let capped = if exponent > 16 { 16 } else { exponent };
    RECONNECT_BASE_DELAY.saturating_mul(1_u32 << capped)
}

/// Frame read from a socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 payload.
    Text(String),
    /// Peer closed the socket with this code.
    Close(u16),
}

/// An open WebSocket.
#[async_trait]
pub trait Socket: Send {
    /// Write a text frame.
    async fn send_text(&mut self, text: String) -> Result<(), ConnectError>;

    /// Next meaningful frame; `None` once the stream ends without a close.
    async fn next_frame(&mut self) -> Option<Result<Frame, ConnectError>>;

    /// Send a close frame.
    async fn close(&mut self, code: u16, reason: &str) -> Result<(), ConnectError>;
}

/// Dials WebSocket endpoints.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a socket to `url`.
    async fn connect(&self, url: &Url) -> Result<Box<dyn Socket>, ConnectError>;
}

/// Waits out reconnect backoff.
#[async_trait]
pub trait ReconnectSleeper: Send + Sync {
    /// Sleep for `delay`.
    async fn sleep(&self, delay: Duration);
}

/// Sleeper backed by the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl ReconnectSleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Where a connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Dialling.
    Connecting,
    /// Frames can be exchanged.
    Open,
    /// Waiting for the next reconnect attempt.
    Reconnecting,
    /// Finished; the connection will not be used again.
    Closed,
}

/// Lifecycle event pushed to the dispatch loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The socket opened.
    Opened,
    /// A text frame arrived.
    Message(String),
    /// The socket closed or could not be opened.
    Closed {
        /// Close code; dial failures report [`ABNORMAL_CLOSURE`].
        code: u16,
    },
    /// A reconnect has been scheduled.
    Reconnecting {
        /// 1-based attempt number.
        attempt: u32,
        /// Backoff before the attempt.
        delay: Duration,
    },
    /// Every reconnect attempt failed.
    Failed,
}

/// Payload accepted by [`Connection::send`].
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    /// Sent as-is.
    Text(String),
    /// Serialised to JSON text.
    Json(Value),
}

impl Outgoing {
    fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Json(value) => value.to_string(),
        }
    }
}

impl From<String> for Outgoing {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Outgoing {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<Value> for Outgoing {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

struct ConnectionInner {
    url: Url,
    state: watch::Receiver<ConnectionState>,
    outbound: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
}

/// Handle to one driven connection. Clones share the same socket.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("url", &self.inner.url.as_str())
            .field("state", &self.state())
            .finish()
    }
}

impl Connection {
    fn spawn(
        url: Url,
        connector: Arc<dyn Connector>,
        sleeper: Arc<dyn ReconnectSleeper>,
        events: mpsc::Sender<ConnectionEvent>,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let driver = Driver {
            url: url.clone(),
            connector,
            sleeper,
            events,
            state: state_tx,
            outbound: outbound_rx,
            cancel: cancel.clone(),
        };
        tokio::spawn(driver.run());
        Self {
            inner: Arc::new(ConnectionInner {
                url,
                state: state_rx,
                outbound: outbound_tx,
                cancel,
            }),
        }
    }

    /// Endpoint this connection dials.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Whether frames can be sent right now.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Send a frame. Returns `false` when the socket is not open; nothing is
    /// queued for later delivery.
    pub fn send(&self, payload: impl Into<Outgoing>) -> bool {
        if !self.is_open() {
            error!(url = %self.inner.url, "WebSocket is not connected");
            return false;
        }
        if self.inner.outbound.send(payload.into().into_text()).is_err() {
            error!(url = %self.inner.url, "error sending WebSocket message: driver stopped");
            return false;
        }
        true
    }

    /// Close with [`NORMAL_CLOSURE`] and cancel any pending reconnect.
    pub fn close(&self) {
        self.inner.cancel.cancel();
    }

    /// Wait until the driver has finished.
    pub async fn closed(&self) {
        let mut state = self.inner.state.clone();
        if state
            .wait_for(|current| *current == ConnectionState::Closed)
            .await
            .is_err()
        {
            debug!(url = %self.inner.url, "connection driver dropped before closing");
        }
    }

    /// Whether both handles drive the same socket.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

struct Driver {
    url: Url,
    connector: Arc<dyn Connector>,
    sleeper: Arc<dyn ReconnectSleeper>,
    events: mpsc::Sender<ConnectionEvent>,
    state: watch::Sender<ConnectionState>,
    outbound: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
}

impl Driver {
    async fn run(mut self) {
        let mut attempt: u32 = 0;
        loop {
            self.set_state(ConnectionState::Connecting);
            let connected = tokio::select! {
                () = self.cancel.cancelled() => break,
                result = self.connector.connect(&self.url) => result,
            };
            let code = match connected {
                Ok(mut socket) => {
                    attempt = 0;
                    self.set_state(ConnectionState::Open);
                    info!(url = %self.url, "WebSocket connection established");
                    self.emit(ConnectionEvent::Opened).await;
                    self.pump(socket.as_mut()).await
                }
                Err(err) => {
                    warn!(url = %self.url, error = %err, "WebSocket connection failed");
                    ABNORMAL_CLOSURE
                }
            };
            self.discard_unsent();
            info!(url = %self.url, code, "WebSocket connection closed");
            self.emit(ConnectionEvent::Closed { code }).await;
            if code == NORMAL_CLOSURE || self.cancel.is_cancelled() {
                break;
            }
            if attempt >= MAX_RECONNECT_ATTEMPTS {
                error!(
                    url = %self.url,
                    attempts = MAX_RECONNECT_ATTEMPTS,
                    "failed to reconnect"
                );
                self.emit(ConnectionEvent::Failed).await;
                break;
            }
            attempt += 1;
            let delay = reconnect_delay(attempt);
            info!(
                url = %self.url,
                attempt,
                max_attempts = MAX_RECONNECT_ATTEMPTS,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "attempting to reconnect"
            );
            self.set_state(ConnectionState::Reconnecting);
            self.emit(ConnectionEvent::Reconnecting { attempt, delay }).await;
            tokio::select! {
                () = self.cancel.cancelled() => break,
                () = self.sleeper.sleep(delay) => {}
            }
        }
        self.set_state(ConnectionState::Closed);
    }

    /// Move frames until the socket closes; returns the close code.
    async fn pump(&mut self, socket: &mut dyn Socket) -> u16 {
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    if let Err(err) = socket.close(NORMAL_CLOSURE, DISCONNECT_REASON).await {
                        debug!(error = %err, "close frame not delivered");
                    }
                    return NORMAL_CLOSURE;
                }
                frame = socket.next_frame() => match frame {
                    Some(Ok(Frame::Text(text))) => self.emit(ConnectionEvent::Message(text)).await,
                    Some(Ok(Frame::Close(code))) => return code,
                    Some(Err(err)) => {
                        error!(url = %self.url, error = %err, "WebSocket error");
                        return ABNORMAL_CLOSURE;
                    }
                    None => return ABNORMAL_CLOSURE,
                },
                Some(text) = self.outbound.recv() => {
                    if let Err(err) = socket.send_text(text).await {
                        error!(url = %self.url, error = %err, "error sending WebSocket message");
                    }
                }
            }
        }
    }

    fn discard_unsent(&mut self) {
        while self.outbound.try_recv().is_ok() {
            debug!(url = %self.url, "dropping frame queued for a closed socket");
        }
    }

    fn set_state(&self, next: ConnectionState) {
        self.state.send_modify(|current| *current = next);
    }

    async fn emit(&self, event: ConnectionEvent) {
        if self.events.send(event).await.is_err() {
            debug!(url = %self.url, "connection event receiver dropped");
        }
    }
}

/// Owner of the single live connection.
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    sleeper: Arc<dyn ReconnectSleeper>,
    events: mpsc::Sender<ConnectionEvent>,
    current: Mutex<Option<Connection>>,
}

impl ConnectionManager {
    /// Build a manager and the receiving end of its lifecycle events.
    #[must_use]
    pub fn new(
        connector: Arc<dyn Connector>,
        sleeper: Arc<dyn ReconnectSleeper>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<ConnectionEvent>) {
        let (events, receiver) = mpsc::channel(capacity.max(1));
        (
            Self {
                connector,
                sleeper,
                events,
                current: Mutex::new(None),
            },
            receiver,
        )
    }

    fn slot(&self) -> MutexGuard<'_, Option<Connection>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Connect to `url`, reusing a connection that is connecting or open.
    ///
    /// A connection waiting to reconnect is cancelled and replaced. Must be
    /// called from within a tokio runtime.
    pub fn connect(&self, url: &Url) -> Connection {
        let mut slot = self.slot();
        if let Some(existing) = slot.as_ref() {
            match existing.state() {
                ConnectionState::Connecting | ConnectionState::Open => return existing.clone(),
                ConnectionState::Reconnecting => existing.close(),
                ConnectionState::Closed => {}
            }
        }
        let connection = Connection::spawn(
            url.clone(),
            Arc::clone(&self.connector),
            Arc::clone(&self.sleeper),
            self.events.clone(),
        );
        *slot = Some(connection.clone());
        connection
    }

    /// Close `connection`, or the current one when `None`.
    pub fn disconnect(&self, connection: Option<&Connection>) {
        let mut slot = self.slot();
        match connection {
            Some(specific) => {
                specific.close();
                if slot.as_ref().is_some_and(|current| current.same_as(specific)) {
                    *slot = None;
                }
            }
            None => {
                if let Some(current) = slot.take() {
                    current.close();
                }
            }
        }
    }

    /// Send through `connection`, or the current one when `None`.
    pub fn send(&self, connection: Option<&Connection>, payload: impl Into<Outgoing>) -> bool {
        match connection {
            Some(specific) => specific.send(payload),
            None => match self.current() {
                Some(current) => current.send(payload),
                None => {
                    error!("WebSocket is not connected");
                    false
                }
            },
        }
    }

    /// Whether the current connection is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.slot().as_ref().is_some_and(Connection::is_open)
    }

    /// The current connection, if any.
    #[must_use]
    pub fn current(&self) -> Option<Connection> {
        self.slot().clone()
    }
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
