//! Wire-level frames exchanged over `/ws`.
//!
//! Every frame is a JSON object `{type, data, topic?}`. Client frames are
//! decoded into [`ClientCommand`]s; notifications leave as [`ServerFrame`]s.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::domain::{Notification, NotificationKind};

/// Raw client frame before its `type` is interpreted.
#[derive(Debug, Deserialize)]
struct ClientEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthData {
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct TopicsData {
    #[serde(default)]
    topics: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    #[serde(default)]
    question: String,
    #[serde(default)]
    context: Option<String>,
}

/// Decoded client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// Bind the connection to the session user.
    Auth {
        /// Claimed user id; must match the session cookie.
        user_id: String,
    },
    /// Start receiving the listed topics.
    Subscribe(Vec<String>),
    /// Stop receiving the listed topics.
    Unsubscribe(Vec<String>),
    /// Ask a question on behalf of the authenticated user.
    Query {
        /// Question text.
        question: String,
        /// Optional extra context.
        context: Option<String>,
    },
}

/// Reasons a client frame could not be turned into a command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// Not a JSON `{type, data}` object; the connection is closed.
    #[error("malformed frame: {0}")]
    Malformed(String),
    /// Well-formed frame with an unknown `type`.
    #[error("unsupported message type: {0}")]
    Unsupported(String),
    /// Known `type` whose `data` does not fit.
    #[error("invalid {kind} payload: {message}")]
    InvalidData {
        /// Frame type.
        kind: &'static str,
        /// Decoder message.
        message: String,
    },
}

fn data<T: for<'de> Deserialize<'de>>(kind: &'static str, value: Value) -> Result<T, FrameError> {
    serde_json::from_value(value).map_err(|err| FrameError::InvalidData {
        kind,
        message: err.to_string(),
    })
}

fn topics(kind: &'static str, value: Value) -> Result<Vec<String>, FrameError> {
    let TopicsData { topics } = data(kind, value)?;
    Ok(topics
        .into_iter()
        .map(|topic| topic.trim().to_owned())
        .filter(|topic| !topic.is_empty())
        .collect())
}

impl ClientCommand {
    /// Decode a text frame.
    ///
    /// # Examples
    /// ```
    /// use cervello::inbound::ws::messages::ClientCommand;
    ///
    /// let cmd = ClientCommand::parse(r#"{"type":"subscribe","data":{"topics":["sources"]}}"#)
    ///     .expect("valid frame");
    /// assert_eq!(cmd, ClientCommand::Subscribe(vec!["sources".to_owned()]));
    /// ```
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let envelope: ClientEnvelope =
            serde_json::from_str(text).map_err(|err| FrameError::Malformed(err.to_string()))?;
        match envelope.kind.as_str() {
            "auth" => {
                let AuthData { user_id } = data("auth", envelope.data)?;
                Ok(Self::Auth { user_id })
            }
            "subscribe" => topics("subscribe", envelope.data).map(Self::Subscribe),
            "unsubscribe" => topics("unsubscribe", envelope.data).map(Self::Unsubscribe),
            "query" => {
                let QueryData { question, context } = data("query", envelope.data)?;
                Ok(Self::Query { question, context })
            }
            _ => Err(FrameError::Unsupported(envelope.kind)),
        }
    }
}

/// Outbound frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerFrame {
    /// Frame type.
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Payload.
    pub data: Value,
    /// Routing topic, when the event has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

impl ServerFrame {
    /// `error` frame carrying a client-facing message.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            data: json!({ "message": message.into() }),
            topic: None,
        }
    }

    /// `update` acknowledging a connection-level event such as `subscribed`.
    #[must_use]
    pub fn ack(event: &str, mut details: Value) -> Self {
        if let Value::Object(map) = &mut details {
            map.insert("event".to_owned(), Value::String(event.to_owned()));
        }
        Self {
            kind: NotificationKind::Update,
            data: details,
            topic: None,
        }
    }
}

impl From<&Notification> for ServerFrame {
    fn from(value: &Notification) -> Self {
        Self {
            kind: value.kind,
            data: value.data.clone(),
            topic: value.topic.clone(),
        }
    }
}
