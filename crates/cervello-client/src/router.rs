//! Topic routing over the shared push stream.
//!
//! Frames from the server are JSON objects `{type, data, topic?}`. A frame's
//! topic is its top-level `topic`, falling back to `data.topic`. Each
//! [`TopicSubscription`] sees only the frames whose topic it follows; an empty
//! topic set follows everything.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// A frame pushed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerMessage {
    /// Frame type such as `update` or `error`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Payload.
    #[serde(default)]
    pub data: Value,
    /// Routing topic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// `high` for updates worth surfacing to the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    /// Human-readable text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ServerMessage {
    /// Decode a text frame.
    ///
    /// # Errors
    ///
    /// Returns the decoder error when the frame is not a `{type, ...}` object.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Routing topic: top-level `topic`, else `data.topic`.
    #[must_use]
    pub fn topic(&self) -> Option<&str> {
        self.topic
            .as_deref()
            .or_else(|| self.data.get("topic").and_then(Value::as_str))
    }

    /// Whether the frame asks to be surfaced immediately.
    #[must_use]
    pub fn is_high_priority(&self) -> bool {
        let nested = self.data.get("priority").and_then(Value::as_str);
        self.priority.as_deref().or(nested) == Some("high")
    }

    /// Connection-level acknowledgement (`subscribed`, `authenticated`, ...)
    /// rather than content: an untopiced `update` whose payload names an
    /// `event`.
    #[must_use]
    pub fn is_ack(&self) -> bool {
        self.kind == "update"
            && self.topic().is_none()
            && self.data.get("event").is_some_and(Value::is_string)
    }

    /// Display text: top-level `message`, else `data.message`.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.message
            .as_deref()
            .or_else(|| self.data.get("message").and_then(Value::as_str))
    }
}

fn follows(topics: &BTreeSet<String>, message: &ServerMessage) -> bool {
    topics.is_empty() || message.topic().is_some_and(|topic| topics.contains(topic))
}

/// Messages whose topic is in `topics`; every message when `topics` is empty.
///
/// # Examples
/// ```
/// use std::collections::BTreeSet;
/// use cervello_client::{ServerMessage, filter_by_topics};
///
/// let messages = [
///     ServerMessage::parse(r#"{"type":"update","topic":"sources"}"#).expect("frame"),
///     ServerMessage::parse(r#"{"type":"update","data":{"topic":"query:1"}}"#).expect("frame"),
/// ];
/// let topics = BTreeSet::from(["query:1".to_owned()]);
/// let matched = filter_by_topics(&messages, &topics);
/// assert_eq!(matched.len(), 1);
/// assert_eq!(matched[0].topic(), Some("query:1"));
/// ```
#[must_use]
pub fn filter_by_topics<'a, I>(messages: I, topics: &BTreeSet<String>) -> Vec<ServerMessage>
where
    I: IntoIterator<Item = &'a ServerMessage>,
{
    messages
        .into_iter()
        .filter(|message| follows(topics, message))
        .cloned()
        .collect()
}

fn topic_set<I, S>(topics: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    topics
        .into_iter()
        .map(Into::into)
        .map(|topic| topic.trim().to_owned())
        .filter(|topic| !topic.is_empty())
        .collect()
}

/// Connection-level request sent by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlFrame {
    /// Bind the socket to the signed-in user.
    Auth {
        /// User id from the session.
        user_id: String,
    },
    /// Start receiving topics.
    Subscribe(Vec<String>),
    /// Stop receiving topics.
    Unsubscribe(Vec<String>),
}

impl ControlFrame {
    /// Wire form.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Auth { user_id } => json!({"type": "auth", "data": {"userId": user_id}}),
            Self::Subscribe(topics) => json!({"type": "subscribe", "data": {"topics": topics}}),
            Self::Unsubscribe(topics) => {
                json!({"type": "unsubscribe", "data": {"topics": topics}})
            }
        }
    }
}

/// Matches a subscription keeps; older ones are dropped first.
pub const MATCH_LIMIT: usize = 100;

type Callback = Box<dyn FnMut(&ServerMessage, &[ServerMessage]) + Send>;

/// A consumer of a subset of the push stream.
pub struct TopicSubscription {
    topics: BTreeSet<String>,
    auto_subscribe: bool,
    matches: Vec<ServerMessage>,
    callback: Option<Callback>,
}

impl std::fmt::Debug for TopicSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicSubscription")
            .field("topics", &self.topics)
            .field("auto_subscribe", &self.auto_subscribe)
            .field("matches", &self.matches.len())
            .finish_non_exhaustive()
    }
}

impl TopicSubscription {
    /// Follow `topics`, sending `subscribe` frames for them.
    pub fn new<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            topics: topic_set(topics),
            auto_subscribe: true,
            matches: Vec::new(),
            callback: None,
        }
    }

    /// Invoke `callback` with the newest match and the retained matches.
    #[must_use]
    pub fn on_message(
        mut self,
        callback: impl FnMut(&ServerMessage, &[ServerMessage]) + Send + 'static,
    ) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Filter locally without sending `subscribe`/`unsubscribe` frames.
    #[must_use]
    pub const fn without_server_subscription(mut self) -> Self {
        self.auto_subscribe = false;
        self
    }

    /// Followed topics.
    #[must_use]
    pub const fn topics(&self) -> &BTreeSet<String> {
        &self.topics
    }

    /// Latest [`MATCH_LIMIT`] matches, oldest first.
    #[must_use]
    pub fn matches(&self) -> &[ServerMessage] {
        &self.matches
    }

    /// Tag an outgoing object with the first followed topic.
    #[must_use]
    pub fn tag(&self, mut payload: Value) -> Value {
        if let (Some(topic), Some(object)) = (self.topics.first(), payload.as_object_mut()) {
            object.insert("topic".to_owned(), Value::String(topic.clone()));
        }
        payload
    }

    fn offer(&mut self, message: &ServerMessage) {
        if !follows(&self.topics, message) {
            return;
        }
        self.matches.push(message.clone());
        let excess = self.matches.len().saturating_sub(MATCH_LIMIT);
        self.matches.drain(..excess);
        if let Some(callback) = self.callback.as_mut() {
            callback(message, &self.matches);
        }
    }

    fn subscribe_frame(&self) -> Option<ControlFrame> {
        (self.auto_subscribe && !self.topics.is_empty())
            .then(|| ControlFrame::Subscribe(self.topics.iter().cloned().collect()))
    }

    fn unsubscribe_frame(&self) -> Option<ControlFrame> {
        (self.auto_subscribe && !self.topics.is_empty())
            .then(|| ControlFrame::Unsubscribe(self.topics.iter().cloned().collect()))
    }
}

/// Handle returned by [`Router::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

/// Fans pushed frames out to subscriptions.
///
/// Methods return the control frames the caller should send while the
/// connection is open.
#[derive(Debug, Default)]
pub struct Router {
    subscriptions: BTreeMap<SubscriptionId, TopicSubscription>,
    next_id: u64,
}

impl Router {
    /// Register a subscription.
    pub fn add(&mut self, subscription: TopicSubscription) -> (SubscriptionId, Option<ControlFrame>) {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        let frame = subscription.subscribe_frame();
        self.subscriptions.insert(id, subscription);
        (id, frame)
    }

    /// Replace the topic set of `id`.
    ///
    /// Returns `unsubscribe` for the old topics followed by `subscribe` for
    /// the new ones; nothing when the set is unchanged or `id` is unknown.
    pub fn set_topics<I, S>(&mut self, id: SubscriptionId, topics: I) -> Vec<ControlFrame>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let Some(subscription) = self.subscriptions.get_mut(&id) else {
            return Vec::new();
        };
        let next = topic_set(topics);
        if next == subscription.topics {
            return Vec::new();
        }
        let mut frames = Vec::with_capacity(2);
        frames.extend(subscription.unsubscribe_frame());
        subscription.topics = next;
        let followed = &subscription.topics;
        subscription
            .matches
            .retain(|message| follows(followed, message));
        frames.extend(subscription.subscribe_frame());
        frames
    }

    /// Drop `id`, returning its `unsubscribe` frame.
    pub fn remove(&mut self, id: SubscriptionId) -> Option<ControlFrame> {
        self.subscriptions
            .remove(&id)
            .and_then(|subscription| subscription.unsubscribe_frame())
    }

    /// Offer `message` to every subscription.
    pub fn route(&mut self, message: &ServerMessage) {
        for subscription in self.subscriptions.values_mut() {
            subscription.offer(message);
        }
    }

    /// `subscribe` frames to replay after a (re)connect.
    #[must_use]
    pub fn resubscribe_frames(&self) -> Vec<ControlFrame> {
        self.subscriptions
            .values()
            .filter_map(TopicSubscription::subscribe_frame)
            .collect()
    }

    /// Look up a subscription.
    #[must_use]
    pub fn get(&self, id: SubscriptionId) -> Option<&TopicSubscription> {
        self.subscriptions.get(&id)
    }
}
