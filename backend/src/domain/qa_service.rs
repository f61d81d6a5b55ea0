//! Question answering service.
//!
//! A submitted question is stored as a `processing` query before the answer
//! service is called, then resolved exactly once: `completed` with the answer
//! or `failed` without one. Progress is pushed to the asking user's sessions
//! through the [`NotificationPublisher`] port.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use serde_json::json;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::domain::ports::{
    AnswerGenerator, AnswerRequest, AnsweredQuery, AskQuestion, FeedbackInput, HistoryFilter,
    NotificationPublisher, PreferencesRepository, QaCommand, QaQuery, QueryRepository,
    QueryRepositoryError, UserRepository,
};
use crate::domain::{
    Error, Feedback, Notification, NotificationKind, Page, PageInfo, PageRequest, QueryId,
    QueryRecord, UserId, UserPreferences, query_topic,
};

/// Message returned to clients when the answer service fails.
pub const ANSWER_FAILURE_MESSAGE: &str = "Failed to process your question. Please try again later.";

#[derive(Debug, Clone, Copy)]
enum Access {
    Read,
    Modify,
    Delete,
}

impl Access {
    const fn denied_message(self) -> &'static str {
        match self {
            Self::Read => "Not authorized to access this query",
            Self::Modify => "Not authorized to modify this query",
            Self::Delete => "Not authorized to delete this query",
        }
    }
}

/// Collaborators required by [`QaService`].
#[derive(Clone)]
pub struct QaServicePorts {
    /// Query history storage.
    pub queries: Arc<dyn QueryRepository>,
    /// User storage, for persona and counters.
    pub users: Arc<dyn UserRepository>,
    /// Preference storage, for answer shaping and source visibility.
    pub preferences: Arc<dyn PreferencesRepository>,
    /// External answer service.
    pub answers: Arc<dyn AnswerGenerator>,
    /// Real-time push channel.
    pub notifications: Arc<dyn NotificationPublisher>,
}

/// Q&A service implementing the driving ports.
#[derive(Clone)]
pub struct QaService {
    ports: QaServicePorts,
    clock: Arc<dyn Clock>,
}

impl QaService {
    /// Create a new service.
    pub fn new(ports: QaServicePorts, clock: Arc<dyn Clock>) -> Self {
        Self { ports, clock }
    }

    fn map_query_error(error: QueryRepositoryError) -> Error {
        match error {
            QueryRepositoryError::Connection { message } => {
                Error::service_unavailable(format!("query repository unavailable: {message}"))
            }
            other => Error::internal(format!("query repository error: {other}")),
        }
    }

    async fn load_owned(
        &self,
        user_id: &UserId,
        id: &QueryId,
        access: Access,
    ) -> Result<QueryRecord, Error> {
        let record = self
            .ports
            .queries
            .find_by_id(id)
            .await
            .map_err(Self::map_query_error)?
            .ok_or_else(|| Error::not_found("Query not found"))?;
        if !record.is_owned_by(user_id) {
            return Err(Error::forbidden(access.denied_message()));
        }
        Ok(record)
    }

    async fn load_preferences(&self, user_id: &UserId) -> UserPreferences {
        match self.ports.preferences.find(user_id).await {
            Ok(Some(preferences)) => preferences,
            Ok(None) => UserPreferences::defaults(*user_id, self.clock.utc()),
            Err(error) => {
                warn!(%user_id, %error, "falling back to default preferences");
                UserPreferences::defaults(*user_id, self.clock.utc())
            }
        }
    }

    async fn record_query_count(&self, user_id: &UserId) {
        let mut user = match self.ports.users.find_by_id(user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => return,
            Err(error) => {
                warn!(%user_id, %error, "could not load user to bump query count");
                return;
            }
        };
        user.record_query(self.clock.utc());
        if let Err(error) = self.ports.users.update(&user).await {
            warn!(%user_id, %error, "could not bump query count");
        }
    }

    fn elapsed_ms(started: Instant) -> u64 {
        u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn publish(&self, kind: NotificationKind, record: &QueryRecord, data: serde_json::Value) {
        self.ports.notifications.publish(Notification::to_user(
            kind,
            record.user_id,
            Some(query_topic(&record.id)),
            data,
        ));
    }
}

#[async_trait]
impl QaCommand for QaService {
    async fn ask(&self, request: AskQuestion) -> Result<AnsweredQuery, Error> {
        let question = request.question.trim();
        if question.is_empty() {
            return Err(Error::invalid_request("Question is required"));
        }
        let user_id = request.user_id;
        let persona = self
            .ports
            .users
            .find_by_id(&user_id)
            .await
            .ok()
            .flatten()
            .and_then(|user| user.persona);
        let preferences = self.load_preferences(&user_id).await;

        let mut record = QueryRecord::processing(user_id, question, self.clock.utc());
        record.context = request.context.clone().filter(|ctx| !ctx.trim().is_empty());
        self.ports
            .queries
            .insert(&record)
            .await
            .map_err(Self::map_query_error)?;
        self.publish(
            NotificationKind::AnswerStream,
            &record,
            json!({ "queryId": record.id, "status": "processing", "question": record.question }),
        );

        let answer_request = AnswerRequest {
            query_id: record.id,
            user_id,
            question: record.question.clone(),
            context: record.context.clone(),
            persona,
            preferences: preferences.clone(),
        };
        let started = Instant::now();
        let outcome = self.ports.answers.generate(&answer_request).await;
        let processing_time_ms = Self::elapsed_ms(started);

        match outcome {
            Ok(generated) => {
                let context = generated.context.or_else(|| record.context.clone());
                record.complete(
                    generated.answer,
                    generated.sources,
                    context,
                    processing_time_ms,
                );
                self.ports
                    .queries
                    .update(&record)
                    .await
                    .map_err(Self::map_query_error)?;
                self.record_query_count(&user_id).await;

                let sources = if preferences.show_sources {
                    record.sources.clone()
                } else {
                    Vec::new()
                };
                let answer = record.answer.clone().unwrap_or_default();
                self.publish(
                    NotificationKind::AnswerComplete,
                    &record,
                    json!({
                        "queryId": record.id,
                        "question": record.question,
                        "answer": answer,
                        "sources": sources,
                        "processingTime": processing_time_ms,
                    }),
                );
                info!(query_id = %record.id, processing_time_ms, "query completed");
                Ok(AnsweredQuery {
                    id: record.id,
                    question: record.question,
                    answer,
                    sources,
                    processing_time_ms,
                })
            }
            Err(error) => {
                warn!(query_id = %record.id, %error, "answer service failed");
                record.fail(processing_time_ms);
                if let Err(update_error) = self.ports.queries.update(&record).await {
                    warn!(query_id = %record.id, error = %update_error, "could not mark query failed");
                }
                self.publish(
                    NotificationKind::Error,
                    &record,
                    json!({ "queryId": record.id, "message": ANSWER_FAILURE_MESSAGE }),
                );
                Err(Error::upstream_failure(ANSWER_FAILURE_MESSAGE)
                    .with_details(json!({ "id": record.id, "question": record.question })))
            }
        }
    }

    async fn submit_feedback(
        &self,
        user_id: &UserId,
        id: &QueryId,
        feedback: FeedbackInput,
    ) -> Result<QueryRecord, Error> {
        let mut record = self.load_owned(user_id, id, Access::Modify).await?;
        record.feedback = Some(Feedback {
            rating: feedback.rating,
            comment: feedback.comment.unwrap_or_default(),
            timestamp: self.clock.utc(),
        });
        self.ports
            .queries
            .update(&record)
            .await
            .map_err(Self::map_query_error)?;
        Ok(record)
    }

    async fn delete_query(&self, user_id: &UserId, id: &QueryId) -> Result<(), Error> {
        self.load_owned(user_id, id, Access::Delete).await?;
        self.ports
            .queries
            .delete(id)
            .await
            .map_err(Self::map_query_error)?;
        Ok(())
    }

    async fn clear_history(&self, user_id: &UserId) -> Result<u64, Error> {
        let deleted = self
            .ports
            .queries
            .delete_all_for_user(user_id)
            .await
            .map_err(Self::map_query_error)?;
        info!(%user_id, deleted, "cleared query history");
        Ok(deleted)
    }
}

#[async_trait]
impl QaQuery for QaService {
    async fn history(
        &self,
        user_id: &UserId,
        filter: HistoryFilter,
        page: PageRequest,
    ) -> Result<Page<QueryRecord>, Error> {
        let (items, total) = self
            .ports
            .queries
            .list_for_user(user_id, &filter, page)
            .await
            .map_err(Self::map_query_error)?;
        Ok(Page {
            items,
            info: PageInfo::new(total, page),
        })
    }

    async fn query(&self, user_id: &UserId, id: &QueryId) -> Result<QueryRecord, Error> {
        self.load_owned(user_id, id, Access::Read).await
    }
}

#[cfg(test)]
#[path = "qa_service_tests.rs"]
mod tests;
