//! Server-pushed notifications delivered over the real-time channel.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{QueryId, UserId};

/// Topic carrying source lifecycle updates.
pub const SOURCES_TOPIC: &str = "sources";

/// Topic carrying progress for a single query.
#[must_use]
pub fn query_topic(id: &QueryId) -> String {
    format!("query:{id}")
}

/// Frame type of a pushed notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Generic state change (e.g. a source was re-indexed).
    Update,
    /// Progress of an answer that is still being generated.
    AnswerStream,
    /// Final answer for a query.
    AnswerComplete,
    /// Error intended for the client.
    Error,
    /// Operator broadcast.
    SystemAlert,
}

/// Who may receive a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// Every session (still filtered by topic when one is set).
    Everyone,
    /// Only sessions authenticated as this user.
    User(UserId),
}

/// A push event published by domain services.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Frame type.
    pub kind: NotificationKind,
    /// Optional routing topic.
    pub topic: Option<String>,
    /// Recipients.
    pub audience: Audience,
    /// JSON payload.
    pub data: Value,
}

impl Notification {
    /// Notification for every session subscribed to `topic`.
    #[must_use]
    pub fn to_topic(kind: NotificationKind, topic: impl Into<String>, data: Value) -> Self {
        Self {
            kind,
            topic: Some(topic.into()),
            audience: Audience::Everyone,
            data,
        }
    }

    /// Notification for one user's sessions.
    #[must_use]
    pub fn to_user(kind: NotificationKind, user_id: UserId, topic: Option<String>, data: Value) -> Self {
        Self {
            kind,
            topic,
            audience: Audience::User(user_id),
            data,
        }
    }

    /// Untargeted broadcast such as a system alert.
    #[must_use]
    pub const fn broadcast(kind: NotificationKind, data: Value) -> Self {
        Self {
            kind,
            topic: None,
            audience: Audience::Everyone,
            data,
        }
    }

    /// Whether a session should receive this notification.
    ///
    /// User-targeted notifications go to that user's sessions regardless of
    /// subscriptions; everything else needs a matching subscription unless it
    /// carries no topic at all.
    #[must_use]
    pub fn is_visible_to(&self, user: Option<&UserId>, topics: &BTreeSet<String>) -> bool {
        match self.audience {
            Audience::User(target) => user == Some(&target),
            Audience::Everyone => self
                .topic
                .as_ref()
                .is_none_or(|topic| topics.contains(topic)),
        }
    }
}
