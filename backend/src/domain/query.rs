//! Question/answer exchange records.
//!
//! A query is created in [`QueryStatus::Processing`] when a question is
//! submitted and then resolved exactly once: [`QueryRecord::complete`] stores
//! the answer, [`QueryRecord::fail`] records the failure without an answer.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::UserId;

/// Query identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryId(Uuid);

impl QueryId {
    /// Generate a new identifier.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Access the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QueryId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Lifecycle state of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    /// Accepted, not yet forwarded.
    Pending,
    /// Waiting on the answer service.
    Processing,
    /// Answered.
    Completed,
    /// The answer service failed.
    Failed,
}

impl QueryStatus {
    /// Stable storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for QueryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown query status: {other}")),
        }
    }
}

/// Source citation attached to an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SourceCitation {
    /// Document title.
    pub title: String,
    /// Link to the document.
    #[serde(default)]
    pub url: Option<String>,
    /// Quoted excerpt.
    #[serde(default)]
    pub snippet: Option<String>,
    /// Retrieval score.
    #[serde(default)]
    pub relevance_score: Option<f64>,
}

/// Inclusive range of allowed feedback ratings.
pub const RATING_RANGE: std::ops::RangeInclusive<u8> = 1..=5;

/// Validated feedback rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Rating(u8);

/// Error returned for ratings outside [`RATING_RANGE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("rating must be between 1 and 5, got {0}")]
pub struct RatingOutOfRange(pub i64);

impl Rating {
    /// Validate a raw rating.
    pub fn new(raw: i64) -> Result<Self, RatingOutOfRange> {
        u8::try_from(raw)
            .ok()
            .filter(|value| RATING_RANGE.contains(value))
            .map(Self)
            .ok_or(RatingOutOfRange(raw))
    }

    /// Raw rating value.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Rating {
    type Error = RatingOutOfRange;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for u8 {
    fn from(value: Rating) -> Self {
        value.0
    }
}

/// User feedback on an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    /// Rating between 1 and 5.
    pub rating: Rating,
    /// Free-form comment.
    pub comment: String,
    /// When the feedback was given.
    pub timestamp: DateTime<Utc>,
}

/// Persisted question/answer exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRecord {
    /// Identifier.
    pub id: QueryId,
    /// Owner.
    pub user_id: UserId,
    /// Question text.
    pub question: String,
    /// Answer text, present once completed.
    pub answer: Option<String>,
    /// Retrieval context returned by the answer service.
    pub context: Option<String>,
    /// Source citations.
    pub sources: Vec<SourceCitation>,
    /// Lifecycle state.
    pub status: QueryStatus,
    /// Submission time.
    pub timestamp: DateTime<Utc>,
    /// Wall-clock time spent waiting on the answer service.
    pub processing_time_ms: Option<u64>,
    /// Optional user feedback.
    pub feedback: Option<Feedback>,
}

impl QueryRecord {
    /// Start a new exchange in the processing state.
    #[must_use]
    pub fn processing(user_id: UserId, question: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: QueryId::random(),
            user_id,
            question: question.into(),
            answer: None,
            context: None,
            sources: Vec::new(),
            status: QueryStatus::Processing,
            timestamp: now,
            processing_time_ms: None,
            feedback: None,
        }
    }

    /// Store the answer and mark the query completed.
    pub fn complete(
        &mut self,
        answer: String,
        sources: Vec<SourceCitation>,
        context: Option<String>,
        processing_time_ms: u64,
    ) {
        self.answer = Some(answer);
        self.sources = sources;
        self.context = context;
        self.status = QueryStatus::Completed;
        self.processing_time_ms = Some(processing_time_ms);
    }

    /// Mark the query failed; no answer is stored.
    pub fn fail(&mut self, processing_time_ms: u64) {
        self.answer = None;
        self.status = QueryStatus::Failed;
        self.processing_time_ms = Some(processing_time_ms);
    }

    /// Whether `user_id` owns this query.
    #[must_use]
    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        self.user_id == *user_id
    }
}
