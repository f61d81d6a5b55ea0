//! Driving port for submitting questions and managing history.

use async_trait::async_trait;

use crate::domain::{Error, QueryId, QueryRecord, Rating, SourceCitation, UserId};

/// A question submitted by a signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AskQuestion {
    /// Asking user.
    pub user_id: UserId,
    /// Raw question text; trimmed by the service.
    pub question: String,
    /// Optional caller-supplied context.
    pub context: Option<String>,
}

/// Result of a successfully answered question.
#[derive(Debug, Clone, PartialEq)]
pub struct AnsweredQuery {
    /// Stored query id.
    pub id: QueryId,
    /// Question text.
    pub question: String,
    /// Answer text.
    pub answer: String,
    /// Citations; empty when the user hides sources.
    pub sources: Vec<SourceCitation>,
    /// Time spent waiting on the answer service.
    pub processing_time_ms: u64,
}

/// Feedback left on an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackInput {
    /// Rating between 1 and 5.
    pub rating: Rating,
    /// Optional comment.
    pub comment: Option<String>,
}

/// Q&A mutations invoked by the HTTP and WebSocket adapters.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QaCommand: Send + Sync {
    /// Run the question through the answer service and persist the exchange.
    async fn ask(&self, request: AskQuestion) -> Result<AnsweredQuery, Error>;

    /// Attach feedback to a query owned by `user_id`.
    async fn submit_feedback(
        &self,
        user_id: &UserId,
        id: &QueryId,
        feedback: FeedbackInput,
    ) -> Result<QueryRecord, Error>;

    /// Delete a query owned by `user_id`.
    async fn delete_query(&self, user_id: &UserId, id: &QueryId) -> Result<(), Error>;

    /// Delete every query owned by `user_id`, returning how many went.
    async fn clear_history(&self, user_id: &UserId) -> Result<u64, Error>;
}
