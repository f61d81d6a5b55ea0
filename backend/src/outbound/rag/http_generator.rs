//! Reqwest-backed `AnswerGenerator`.
//!
//! Owns transport details only: request serialisation, bearer auth, timeout
//! and status mapping, and decoding into [`GeneratedAnswer`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use tracing::{debug, instrument};

use super::dto::{RagRequestDto, RagResponseDto};
use crate::domain::ports::{AnswerGenerator, AnswerGeneratorError, AnswerRequest, GeneratedAnswer};

/// Deadline applied to every answer request.
pub const DEFAULT_RAG_TIMEOUT: Duration = Duration::from_secs(30);

/// Answer service client posting to a single endpoint.
pub struct HttpAnswerGenerator {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl HttpAnswerGenerator {
    /// Build a client for `endpoint`, sending `api_key` as a bearer token
    /// when present.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(
        endpoint: Url,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        })
    }
}

#[async_trait]
impl AnswerGenerator for HttpAnswerGenerator {
    #[instrument(skip_all, fields(query_id = %request.query_id))]
    async fn generate(
        &self,
        request: &AnswerRequest,
    ) -> Result<GeneratedAnswer, AnswerGeneratorError> {
        let mut builder = self
            .client
            .post(self.endpoint.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&RagRequestDto::from(request));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(map_transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref()));
        }

        let decoded: RagResponseDto = serde_json::from_slice(&body).map_err(|error| {
            AnswerGeneratorError::invalid_response(format!("invalid JSON payload: {error}"))
        })?;
        let generated = decoded
            .into_generated()
            .map_err(AnswerGeneratorError::invalid_response)?;
        debug!(
            sources = generated.sources.len(),
            "answer service responded"
        );
        Ok(generated)
    }
}

fn map_transport_error(error: reqwest::Error) -> AnswerGeneratorError {
    if error.is_timeout() {
        AnswerGeneratorError::timeout()
    } else {
        AnswerGeneratorError::transport(error.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> AnswerGeneratorError {
    match status {
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => AnswerGeneratorError::timeout(),
        _ => AnswerGeneratorError::status(status.as_u16(), body_preview(body)),
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        let preview: String = compact.chars().take(PREVIEW_CHAR_LIMIT).collect();
        format!("{preview}...")
    } else {
        compact
    }
}

#[cfg(test)]
#[path = "http_generator_tests.rs"]
mod tests;
