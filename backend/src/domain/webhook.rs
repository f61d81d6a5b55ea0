//! Webhook event decoding.
//!
//! The `x-webhook-type` header selects the payload shape. Decoding validates
//! required fields so the service only ever sees well-formed events.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{Error, NewSource, QueryId, Rating, SourceId, SourceKind, UserId};

/// Supported webhook type names.
pub const SUPPORTED_WEBHOOK_TYPES: [&str; 5] = [
    "source.updated",
    "source.created",
    "source.deleted",
    "query.feedback",
    "system.alert",
];

/// A decoded webhook event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    /// Source content changed and must be re-indexed.
    SourceUpdated {
        /// Affected source.
        source_id: SourceId,
        /// Replacement content, when supplied.
        content: Option<String>,
        /// Replacement metadata.
        metadata: BTreeMap<String, String>,
    },
    /// A new source should be stored and indexed.
    SourceCreated(NewSource),
    /// A source was removed upstream.
    SourceDeleted {
        /// Removed source.
        source_id: SourceId,
    },
    /// Feedback left on a query outside the app.
    QueryFeedback {
        /// Rated query.
        query_id: QueryId,
        /// Rating between 1 and 5.
        rating: Rating,
        /// Optional comment.
        comment: Option<String>,
    },
    /// Operator message for every connected session.
    SystemAlert {
        /// Text shown to users.
        message: String,
        /// Optional priority such as `high`.
        priority: Option<String>,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SourceUpdatedPayload {
    source_id: Option<String>,
    content: Option<String>,
    #[serde(default)]
    metadata: BTreeMap<String, Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SourceCreatedPayload {
    title: Option<String>,
    description: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    url: Option<String>,
    content: Option<String>,
    #[serde(default)]
    metadata: BTreeMap<String, Value>,
    user_id: Option<String>,
    #[serde(default)]
    is_public: bool,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SourceDeletedPayload {
    source_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryFeedbackPayload {
    query_id: Option<String>,
    rating: Option<i64>,
    comment: Option<String>,
}

#[derive(Deserialize)]
struct SystemAlertPayload {
    message: Option<String>,
    priority: Option<String>,
}

fn decode<T: DeserializeOwned>(payload: Value) -> Result<T, Error> {
    serde_json::from_value(payload)
        .map_err(|err| Error::invalid_request(format!("invalid webhook payload: {err}")))
}

fn stringify_metadata(metadata: BTreeMap<String, Value>) -> BTreeMap<String, String> {
    metadata
        .into_iter()
        .map(|(key, value)| match value {
            Value::String(text) => (key, text),
            other => (key, other.to_string()),
        })
        .collect()
}

fn parse_id<T: std::str::FromStr>(raw: Option<String>, field: &str) -> Result<T, Error> {
    let raw = raw
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| Error::invalid_request(format!("{field} is required")))?;
    raw.trim()
        .parse()
        .map_err(|_| Error::invalid_request(format!("{field} must be a UUID")))
}

impl WebhookEvent {
    /// Decode a payload according to its webhook type.
    ///
    /// # Examples
    /// ```
    /// use cervello::domain::WebhookEvent;
    /// use serde_json::json;
    ///
    /// let err = WebhookEvent::parse("user.created", json!({})).unwrap_err();
    /// assert_eq!(err.message(), "Unsupported webhook type");
    /// ```
    pub fn parse(kind: &str, payload: Value) -> Result<Self, Error> {
        match kind {
            "source.updated" => {
                let body: SourceUpdatedPayload = decode(payload)?;
                Ok(Self::SourceUpdated {
                    source_id: parse_id(body.source_id, "sourceId")?,
                    content: body.content,
                    metadata: stringify_metadata(body.metadata),
                })
            }
            "source.created" => {
                let body: SourceCreatedPayload = decode(payload)?;
                let title = body
                    .title
                    .filter(|title| !title.trim().is_empty())
                    .ok_or_else(|| Error::invalid_request("title and userId are required"))?;
                if body.user_id.is_none() {
                    return Err(Error::invalid_request("title and userId are required"));
                }
                let user_id: UserId = parse_id(body.user_id, "userId")?;
                let kind = body
                    .kind
                    .map(|raw| raw.parse::<SourceKind>())
                    .transpose()
                    .map_err(Error::invalid_request)?;
                Ok(Self::SourceCreated(NewSource {
                    title,
                    description: body.description,
                    kind,
                    url: body.url,
                    content: body.content,
                    metadata: stringify_metadata(body.metadata),
                    user_id,
                    is_public: body.is_public,
                    tags: body.tags,
                }))
            }
            "source.deleted" => {
                let body: SourceDeletedPayload = decode(payload)?;
                Ok(Self::SourceDeleted {
                    source_id: parse_id(body.source_id, "sourceId")?,
                })
            }
            "query.feedback" => {
                let body: QueryFeedbackPayload = decode(payload)?;
                let query_id = parse_id(body.query_id, "queryId")?;
                let raw = body
                    .rating
                    .ok_or_else(|| Error::invalid_request("queryId and rating are required"))?;
                let rating = Rating::new(raw).map_err(|err| Error::invalid_request(err.to_string()))?;
                Ok(Self::QueryFeedback {
                    query_id,
                    rating,
                    comment: body.comment,
                })
            }
            "system.alert" => {
                let body: SystemAlertPayload = decode(payload)?;
                let message = body
                    .message
                    .map(|text| text.trim().to_owned())
                    .filter(|text| !text.is_empty())
                    .ok_or_else(|| Error::invalid_request("message is required"))?;
                Ok(Self::SystemAlert {
                    message,
                    priority: body.priority,
                })
            }
            _ => Err(Error::invalid_request("Unsupported webhook type")),
        }
    }

    /// Webhook type name of this event.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SourceUpdated { .. } => "source.updated",
            Self::SourceCreated(_) => "source.created",
            Self::SourceDeleted { .. } => "source.deleted",
            Self::QueryFeedback { .. } => "query.feedback",
            Self::SystemAlert { .. } => "system.alert",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorCode;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("source.archived")]
    #[case("")]
    fn unsupported_types_are_rejected(#[case] kind: &str) {
        let err = WebhookEvent::parse(kind, json!({})).expect_err("unsupported");
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
        assert!(!SUPPORTED_WEBHOOK_TYPES.contains(&kind));
    }

    #[rstest]
    #[case("source.updated", json!({}))]
    #[case("source.updated", json!({"sourceId": "not-a-uuid"}))]
    #[case("source.created", json!({"title": "Docs"}))]
    #[case("source.created", json!({"userId": "3fa85f64-5717-4562-b3fc-2c963f66afa6"}))]
    #[case("source.deleted", json!({"sourceId": ""}))]
    #[case("query.feedback", json!({"queryId": "3fa85f64-5717-4562-b3fc-2c963f66afa6"}))]
    #[case("query.feedback", json!({"queryId": "3fa85f64-5717-4562-b3fc-2c963f66afa6", "rating": 9}))]
    #[case("system.alert", json!({}))]
    #[case("system.alert", json!({"message": "   "}))]
    fn missing_or_invalid_fields_are_rejected(#[case] kind: &str, #[case] payload: Value) {
        let err = WebhookEvent::parse(kind, payload).expect_err("invalid payload");
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
    }

    #[rstest]
    fn source_created_applies_payload() {
        let event = WebhookEvent::parse(
            "source.created",
            json!({
                "title": "Pathway handbook",
                "type": "website",
                "userId": "3fa85f64-5717-4562-b3fc-2c963f66afa6",
                "metadata": {"lang": "en", "pages": 12},
                "isPublic": true
            }),
        )
        .expect("valid event");

        let WebhookEvent::SourceCreated(new) = event else {
            panic!("expected source.created");
        };
        assert_eq!(new.kind, Some(SourceKind::Website));
        assert!(new.is_public);
        assert_eq!(new.metadata.get("pages").map(String::as_str), Some("12"));
    }

    #[rstest]
    fn feedback_carries_rating() {
        let event = WebhookEvent::parse(
            "query.feedback",
            json!({"queryId": "3fa85f64-5717-4562-b3fc-2c963f66afa6", "rating": 5}),
        )
        .expect("valid event");
        assert_eq!(event.kind(), "query.feedback");
        assert!(matches!(event, WebhookEvent::QueryFeedback { rating, .. } if rating.get() == 5));
    }
}
