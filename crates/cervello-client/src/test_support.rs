//! Test doubles shared by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use mockable::Clock;
use serde_json::Value;
use tokio::sync::{Semaphore, mpsc};
use url::Url;

use crate::connection::{Connector, Frame, ReconnectSleeper, Socket};
use crate::error::{ConnectError, FetchError};
use crate::notifier::{NoticeLevel, Notifier};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};

/// Fixed instant used by cache tests.
pub(crate) fn fixture_timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 0)
        .single()
        .expect("valid fixture timestamp")
}

/// Clock that only moves when told to.
pub(crate) struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub(crate) fn new(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self(Mutex::new(now)))
    }

    pub(crate) fn advance(&self, delta: Duration) {
        let step = TimeDelta::from_std(delta).expect("duration fits in TimeDelta");
        *self.0.lock().expect("clock lock") += step;
    }
}

impl Clock for ManualClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.0.lock().expect("clock lock")
    }
}

/// The test's side of a [`FakeSocket`].
pub(crate) struct RemoteEnd {
    pub(crate) frames: mpsc::UnboundedSender<Frame>,
    pub(crate) sent: mpsc::UnboundedReceiver<String>,
    pub(crate) closes: mpsc::UnboundedReceiver<(u16, String)>,
}

impl RemoteEnd {
    pub(crate) fn push_text(&self, text: &str) {
        self.frames
            .send(Frame::Text(text.to_owned()))
            .expect("socket still reading");
    }

    pub(crate) async fn next_sent(&mut self) -> Value {
        let text = tokio::time::timeout(Duration::from_secs(1), self.sent.recv())
            .await
            .expect("frame sent in time")
            .expect("socket alive");
        serde_json::from_str(&text).expect("JSON frame")
    }
}

/// In-memory socket driven by a [`RemoteEnd`].
pub(crate) struct FakeSocket {
    frames: mpsc::UnboundedReceiver<Frame>,
    sent: mpsc::UnboundedSender<String>,
    closes: mpsc::UnboundedSender<(u16, String)>,
}

pub(crate) fn socket_pair() -> (FakeSocket, RemoteEnd) {
    let (frames_tx, frames_rx) = mpsc::unbounded_channel();
    let (sent_tx, sent_rx) = mpsc::unbounded_channel();
    let (closes_tx, closes_rx) = mpsc::unbounded_channel();
    (
        FakeSocket {
            frames: frames_rx,
            sent: sent_tx,
            closes: closes_tx,
        },
        RemoteEnd {
            frames: frames_tx,
            sent: sent_rx,
            closes: closes_rx,
        },
    )
}

#[async_trait]
impl Socket for FakeSocket {
    async fn send_text(&mut self, text: String) -> Result<(), ConnectError> {
        self.sent
            .send(text)
            .map_err(|_| ConnectError::transport("remote end dropped"))
    }

    async fn next_frame(&mut self) -> Option<Result<Frame, ConnectError>> {
        self.frames.recv().await.map(Ok)
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<(), ConnectError> {
        self.closes
            .send((code, reason.to_owned()))
            .map_err(|_| ConnectError::transport("remote end dropped"))
    }
}

/// Connector handing out queued outcomes; refuses once the queue is empty.
#[derive(Default)]
pub(crate) struct FakeConnector {
    outcomes: Mutex<VecDeque<Result<FakeSocket, ConnectError>>>,
    attempts: AtomicUsize,
}

impl FakeConnector {
    pub(crate) fn new(outcomes: impl IntoIterator<Item = Result<FakeSocket, ConnectError>>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            attempts: AtomicUsize::new(0),
        })
    }

    pub(crate) fn refusing() -> Arc<Self> {
        Self::new([])
    }

    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, url: &Url) -> Result<Box<dyn Socket>, ConnectError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let next = self.outcomes.lock().expect("outcomes lock").pop_front();
        match next {
            Some(Ok(socket)) => Ok(Box::new(socket)),
            Some(Err(err)) => Err(err),
            None => Err(ConnectError::handshake(url.as_str(), "connection refused")),
        }
    }
}

/// Sleeper that records every delay and returns at once.
#[derive(Default)]
pub(crate) struct RecordingSleeper(Mutex<Vec<Duration>>);

impl RecordingSleeper {
    pub(crate) fn delays(&self) -> Vec<Duration> {
        self.0.lock().expect("delays lock").clone()
    }
}

#[async_trait]
impl ReconnectSleeper for RecordingSleeper {
    async fn sleep(&self, delay: Duration) {
        self.0.lock().expect("delays lock").push(delay);
    }
}

/// Sleeper that never wakes, parking the driver in `Reconnecting`.
pub(crate) struct ParkedSleeper;

#[async_trait]
impl ReconnectSleeper for ParkedSleeper {
    async fn sleep(&self, _delay: Duration) {
        std::future::pending::<()>().await;
    }
}

type Responder = dyn Fn(usize, &HttpRequest) -> HttpResponse + Send + Sync;

/// Transport answering from a closure, optionally held behind a gate.
pub(crate) struct StubTransport {
    calls: AtomicUsize,
    requests: Mutex<Vec<HttpRequest>>,
    gate: Option<Semaphore>,
    respond: Box<Responder>,
}

impl StubTransport {
    pub(crate) fn new(
        respond: impl Fn(usize, &HttpRequest) -> HttpResponse + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            gate: None,
            respond: Box::new(respond),
        })
    }

    /// Requests wait until [`Self::release`] hands out permits.
    pub(crate) fn gated(
        respond: impl Fn(usize, &HttpRequest) -> HttpResponse + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            gate: Some(Semaphore::new(0)),
            respond: Box::new(respond),
        })
    }

    pub(crate) fn release(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl HttpTransport for StubTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, FetchError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate open").forget();
        }
        Ok((self.respond)(call, &request))
    }
}

/// Transport whose requests never complete.
pub(crate) struct HangingTransport;

#[async_trait]
impl HttpTransport for HangingTransport {
    async fn execute(&self, _request: HttpRequest) -> Result<HttpResponse, FetchError> {
        std::future::pending().await
    }
}

pub(crate) fn json_response(status: u16, body: &Value) -> HttpResponse {
    HttpResponse {
        status,
        content_type: Some("application/json; charset=utf-8".to_owned()),
        body: body.to_string(),
    }
}

pub(crate) fn text_response(status: u16, body: &str) -> HttpResponse {
    HttpResponse {
        status,
        content_type: Some("text/plain".to_owned()),
        body: body.to_owned(),
    }
}

/// Notifier keeping every notice for assertions.
pub(crate) struct RecordingNotifier(mpsc::UnboundedSender<(NoticeLevel, String)>);

impl RecordingNotifier {
    pub(crate) fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<(NoticeLevel, String)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self(tx)), rx)
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        self.0
            .send((level, message.to_owned()))
            .expect("notice receiver alive");
    }
}
