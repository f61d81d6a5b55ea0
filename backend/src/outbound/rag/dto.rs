//! Wire DTOs for the answer service.

use serde::{Deserialize, Serialize};

use crate::domain::SourceCitation;
use crate::domain::ports::{AnswerRequest, GeneratedAnswer};

/// Request body: the question twice (`prompt` for prompt-style services,
/// `query` for search-style ones) plus caller metadata.
#[derive(Debug, Serialize)]
pub(super) struct RagRequestDto<'a> {
    pub(super) prompt: &'a str,
    pub(super) query: &'a str,
    pub(super) metadata: RagMetadataDto<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RagMetadataDto<'a> {
    pub(super) query_id: String,
    pub(super) user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) persona: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) context: Option<&'a str>,
    pub(super) preferences: RagStyleDto,
}

/// Answer style hints derived from the user's preferences.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RagStyleDto {
    pub(super) code_snippets: bool,
    pub(super) technical_terms: bool,
    pub(super) simplified_explanations: bool,
    pub(super) educational_resources: bool,
}

impl<'a> From<&'a AnswerRequest> for RagRequestDto<'a> {
    fn from(request: &'a AnswerRequest) -> Self {
        let prefs = &request.preferences;
        Self {
            prompt: &request.question,
            query: &request.question,
            metadata: RagMetadataDto {
                query_id: request.query_id.to_string(),
                user_id: request.user_id.to_string(),
                persona: request.persona.map(|persona| persona.as_str()),
                context: request.context.as_deref(),
                preferences: RagStyleDto {
                    code_snippets: prefs.code_snippets,
                    technical_terms: prefs.technical_terms,
                    simplified_explanations: prefs.simplified_explanations,
                    educational_resources: prefs.educational_resources,
                },
            },
        }
    }
}

/// Response body. Services answer in either `response` or `answer`.
#[derive(Debug, Deserialize)]
pub(super) struct RagResponseDto {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    sources: Vec<RagSourceDto>,
}

#[derive(Debug, Deserialize)]
struct RagSourceDto {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default, alias = "text", alias = "content")]
    snippet: Option<String>,
    #[serde(default, alias = "relevanceScore", alias = "score")]
    relevance_score: Option<f64>,
}

impl RagResponseDto {
    /// First non-blank answer field, trimmed, with citations.
    pub(super) fn into_generated(self) -> Result<GeneratedAnswer, String> {
        let answer = [self.response, self.answer]
            .into_iter()
            .flatten()
            .map(|text| text.trim().to_owned())
            .find(|text| !text.is_empty())
            .ok_or_else(|| "response contained no answer text".to_owned())?;

        let sources = self
            .sources
            .into_iter()
            .map(|source| SourceCitation {
                title: source
                    .title
                    .or_else(|| source.url.clone())
                    .unwrap_or_else(|| "Untitled source".to_owned()),
                url: source.url,
                snippet: source.snippet,
                relevance_score: source.relevance_score,
            })
            .collect();

        Ok(GeneratedAnswer {
            answer,
            sources,
            context: self.context.filter(|text| !text.trim().is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Persona, QueryId, UserId, UserPreferences};
    use crate::test_support::fixture_timestamp;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    fn request_carries_question_and_style() {
        let user_id = UserId::random();
        let request = AnswerRequest {
            query_id: QueryId::random(),
            user_id,
            question: "What is Pathway?".to_owned(),
            context: Some("streaming".to_owned()),
            persona: Some(Persona::Developer),
            preferences: UserPreferences::for_persona(
                user_id,
                Persona::Developer,
                fixture_timestamp(),
            ),
        };

        let body = serde_json::to_value(RagRequestDto::from(&request)).expect("serialisable");
        assert_eq!(body["prompt"], json!("What is Pathway?"));
        assert_eq!(body["query"], json!("What is Pathway?"));
        assert_eq!(body["metadata"]["persona"], json!("developer"));
        assert_eq!(body["metadata"]["context"], json!("streaming"));
        assert_eq!(body["metadata"]["preferences"]["codeSnippets"], json!(true));
        assert_eq!(body["metadata"]["userId"], json!(user_id.to_string()));
    }

    #[rstest]
    #[case::response(json!({"response": " A streaming engine "}))]
    #[case::answer(json!({"answer": "A streaming engine"}))]
    #[case::blank_response_falls_back(json!({"response": "  ", "answer": "A streaming engine"}))]
    fn accepts_either_answer_field(#[case] body: serde_json::Value) {
        let dto: RagResponseDto = serde_json::from_value(body).expect("decodes");
        let generated = dto.into_generated().expect("answer present");
        assert_eq!(generated.answer, "A streaming engine");
        assert!(generated.sources.is_empty());
    }

    #[rstest]
    fn rejects_missing_answers() {
        let dto: RagResponseDto = serde_json::from_value(json!({"sources": []})).expect("decodes");
        assert!(dto.into_generated().is_err());
    }

    #[rstest]
    fn maps_sources_leniently() {
        let dto: RagResponseDto = serde_json::from_value(json!({
            "answer": "ok",
            "sources": [
                {"title": "Docs", "url": "https://pathway.com", "score": 0.8},
                {"url": "https://example.org", "text": "excerpt"}
            ]
        }))
        .expect("decodes");

        let generated = dto.into_generated().expect("answer present");
        assert_eq!(generated.sources.len(), 2);
        assert_eq!(generated.sources[0].relevance_score, Some(0.8));
        assert_eq!(generated.sources[1].title, "https://example.org");
        assert_eq!(generated.sources[1].snippet.as_deref(), Some("excerpt"));
    }
}
