//! Port for the external retrieval-augmented answer service.

use async_trait::async_trait;

use crate::domain::{Persona, QueryId, SourceCitation, UserId, UserPreferences};

use super::define_port_error;

define_port_error! {
    /// Failures talking to the answer service.
    pub enum AnswerGeneratorError {
        /// The request never produced a response.
        Transport { message: String } => "answer service unreachable: {message}",
        /// The request exceeded its deadline.
        Timeout => "answer service timed out",
        /// The service answered with a non-success status.
        Status { status: u16, message: String } =>
            "answer service returned {status}: {message}",
        /// The response body did not contain an answer.
        InvalidResponse { message: String } =>
            "answer service returned an invalid response: {message}",
    }
}

/// Everything the answer service is told about a question.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerRequest {
    /// Query being answered.
    pub query_id: QueryId,
    /// Asking user.
    pub user_id: UserId,
    /// Trimmed question text.
    pub question: String,
    /// Caller-supplied context, forwarded verbatim.
    pub context: Option<String>,
    /// Onboarding persona, when chosen.
    pub persona: Option<Persona>,
    /// Preferences shaping the answer style.
    pub preferences: UserPreferences,
}

/// Answer produced by the service.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAnswer {
    /// Answer text; never empty.
    pub answer: String,
    /// Citations, possibly empty.
    pub sources: Vec<SourceCitation>,
    /// Retrieval context echoed by the service.
    pub context: Option<String>,
}

/// Produces answers for user questions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Ask the service to answer `request.question`.
    async fn generate(&self, request: &AnswerRequest)
    -> Result<GeneratedAnswer, AnswerGeneratorError>;
}

/// Generator used when no answer service is wired; every question fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledAnswerGenerator;

#[async_trait]
impl AnswerGenerator for DisabledAnswerGenerator {
    async fn generate(
        &self,
        request: &AnswerRequest,
    ) -> Result<GeneratedAnswer, AnswerGeneratorError> {
        tracing::debug!(query_id = %request.query_id, "answer generator disabled");
        Err(AnswerGeneratorError::transport("answer service is not configured"))
    }
}
