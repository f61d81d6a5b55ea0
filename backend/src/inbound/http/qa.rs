//! Question/answer HTTP handlers.
//!
//! ```text
//! POST   /api/qa {"question":"What is Pathway?"}
//! GET    /api/qa?page=1&limit=10
//! GET    /api/qa/history?dateFrom=2024-01-01&dateTo=2024-01-31
//! DELETE /api/qa/history
//! GET    /api/qa/{id}
//! PUT    /api/qa/{id} {"rating":5,"comment":"great"}
//! DELETE /api/qa/{id}
//! ```
//!
//! `/qa/history` must be registered ahead of `/qa/{id}` so the literal path
//! wins.

use actix_web::{delete, get, post, put, web};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::ports::{AnsweredQuery, AskQuestion, FeedbackInput, HistoryFilter};
use crate::domain::{
    Error, Page, PageInfo, PageRequest, QueryRecord, QueryStatus, Rating, SourceCitation,
};
use crate::inbound::http::ApiResult;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{
    DateBound, FieldErrorCode, FieldName, field_error, parse_date_bound, parse_query_id,
    require_text,
};

const LIST_PAGE_SIZE: u32 = 10;
const HISTORY_PAGE_SIZE: u32 = 20;

/// Question submission.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct AskRequest {
    #[schema(example = "What is Pathway?")]
    pub question: Option<String>,
    pub context: Option<String>,
}

/// Answered question.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AskResponse {
    pub id: String,
    pub question: String,
    pub answer: String,
    pub sources: Vec<SourceCitation>,
    /// Milliseconds spent waiting on the answer service.
    pub processing_time: u64,
}

impl From<AnsweredQuery> for AskResponse {
    fn from(value: AnsweredQuery) -> Self {
        Self {
            id: value.id.to_string(),
            question: value.question,
            answer: value.answer,
            sources: value.sources,
            processing_time: value.processing_time_ms,
        }
    }
}

/// Feedback as returned to clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct FeedbackResponse {
    pub rating: u8,
    pub comment: String,
    pub timestamp: String,
}

/// Stored exchange.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub id: String,
    pub question: String,
    pub answer: Option<String>,
    pub context: Option<String>,
    pub sources: Vec<SourceCitation>,
    pub status: QueryStatus,
    pub timestamp: String,
    pub processing_time: Option<u64>,
    pub feedback: Option<FeedbackResponse>,
}

impl From<QueryRecord> for QueryResponse {
    fn from(value: QueryRecord) -> Self {
        Self {
            id: value.id.to_string(),
            question: value.question,
            answer: value.answer,
            context: value.context,
            sources: value.sources,
            status: value.status,
            timestamp: value.timestamp.to_rfc3339(),
            processing_time: value.processing_time_ms,
            feedback: value.feedback.map(|feedback| FeedbackResponse {
                rating: feedback.rating.get(),
                comment: feedback.comment,
                timestamp: feedback.timestamp.to_rfc3339(),
            }),
        }
    }
}

/// `GET /api/qa` body.
#[derive(Debug, Serialize, ToSchema)]
pub struct QueryListResponse {
    pub queries: Vec<QueryResponse>,
    pub pagination: PageInfo,
}

/// `GET /api/qa/history` body.
#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryResponse {
    pub history: Vec<QueryResponse>,
    pub pagination: PageInfo,
}

fn into_responses(page: Page<QueryRecord>) -> (Vec<QueryResponse>, PageInfo) {
    (
        page.items.into_iter().map(QueryResponse::from).collect(),
        page.info,
    )
}

/// Page-number parameters.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct PageParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// History filter parameters.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(rename_all = "camelCase")]
pub struct HistoryParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    /// Inclusive lower bound; a date or RFC 3339 timestamp.
    pub date_from: Option<String>,
    /// Inclusive upper bound; a bare date covers the whole day.
    pub date_to: Option<String>,
}

/// Result of clearing the history.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClearHistoryResponse {
    pub success: bool,
    pub message: String,
    pub deleted_count: u64,
}

/// Feedback body.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct FeedbackRequest {
    #[schema(minimum = 1, maximum = 5)]
    pub rating: Option<i64>,
    pub comment: Option<String>,
}

/// Subset of the query echoed after feedback.
#[derive(Debug, Serialize, ToSchema)]
pub struct FeedbackQuerySummary {
    pub id: String,
    pub question: String,
    pub answer: Option<String>,
    pub feedback: Option<FeedbackResponse>,
}

/// Feedback result.
#[derive(Debug, Serialize, ToSchema)]
pub struct FeedbackUpdateResponse {
    pub success: bool,
    pub message: String,
    pub query: FeedbackQuerySummary,
}

/// Deletion acknowledgement.
#[derive(Debug, Serialize, ToSchema)]
pub struct DeletedResponse {
    pub success: bool,
    pub message: String,
}

fn parse_feedback(payload: FeedbackRequest) -> Result<FeedbackInput, Error> {
    let field = FieldName::new("rating");
    let raw = payload.rating.ok_or_else(|| {
        field_error(
            field,
            FieldErrorCode::MissingField,
            "Rating is required",
            None,
        )
    })?;
    let rating = Rating::new(raw).map_err(|err| {
        field_error(
            field,
            FieldErrorCode::OutOfRange,
            err.to_string(),
            Some(&raw.to_string()),
        )
    })?;
    Ok(FeedbackInput {
        rating,
        comment: payload.comment,
    })
}

/// Ask a question.
#[utoipa::path(
    post,
    path = "/api/qa",
    request_body = AskRequest,
    responses(
        (status = 200, description = "Answered", body = AskResponse),
        (status = 400, description = "Question is required", body = Error),
        (status = 401, description = "Unauthorised", body = Error),
        (status = 500, description = "Answer service failed; details carry {id, question}", body = Error)
    ),
    tags = ["qa"],
    operation_id = "askQuestion"
)]
#[post("/qa")]
pub async fn ask(
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<AskRequest>,
) -> ApiResult<web::Json<AskResponse>> {
    let user_id = session.require_user_id()?;
    let AskRequest { question, context } = payload.into_inner();
    let question = require_text(question, FieldName::new("question"), "Question is required")?;
    let answered = state
        .qa
        .ask(AskQuestion {
            user_id,
            question,
            context,
        })
        .await?;
    Ok(web::Json(AskResponse::from(answered)))
}

/// List the caller's queries, newest first.
#[utoipa::path(
    get,
    path = "/api/qa",
    params(PageParams),
    responses(
        (status = 200, description = "Queries", body = QueryListResponse),
        (status = 401, description = "Unauthorised", body = Error)
    ),
    tags = ["qa"],
    operation_id = "listQueries"
)]
#[get("/qa")]
pub async fn list_queries(
    state: web::Data<HttpState>,
    session: SessionContext,
    params: web::Query<PageParams>,
) -> ApiResult<web::Json<QueryListResponse>> {
    let user_id = session.require_user_id()?;
    let PageParams { page, limit } = params.into_inner();
    let page = state
        .qa_query
        .history(
            &user_id,
            HistoryFilter::default(),
            PageRequest::new(page, limit, LIST_PAGE_SIZE),
        )
        .await?;
    let (queries, pagination) = into_responses(page);
    Ok(web::Json(QueryListResponse {
        queries,
        pagination,
    }))
}

/// History with an optional date window.
#[utoipa::path(
    get,
    path = "/api/qa/history",
    params(HistoryParams),
    responses(
        (status = 200, description = "History", body = HistoryResponse),
        (status = 400, description = "Invalid date", body = Error),
        (status = 401, description = "Unauthorised", body = Error)
    ),
    tags = ["qa"],
    operation_id = "queryHistory"
)]
#[get("/qa/history")]
pub async fn history(
    state: web::Data<HttpState>,
    session: SessionContext,
    params: web::Query<HistoryParams>,
) -> ApiResult<web::Json<HistoryResponse>> {
    let user_id = session.require_user_id()?;
    let params = params.into_inner();
    let filter = HistoryFilter {
        from: parse_date_bound(
            params.date_from.as_deref(),
            FieldName::new("dateFrom"),
            DateBound::Start,
        )?,
        to: parse_date_bound(
            params.date_to.as_deref(),
            FieldName::new("dateTo"),
            DateBound::End,
        )?,
    };
    let page = state
        .qa_query
        .history(
            &user_id,
            filter,
            PageRequest::new(params.page, params.limit, HISTORY_PAGE_SIZE),
        )
        .await?;
    let (history, pagination) = into_responses(page);
    Ok(web::Json(HistoryResponse {
        history,
        pagination,
    }))
}

/// Delete every query the caller owns.
#[utoipa::path(
    delete,
    path = "/api/qa/history",
    responses(
        (status = 200, description = "History cleared", body = ClearHistoryResponse),
        (status = 401, description = "Unauthorised", body = Error)
    ),
    tags = ["qa"],
    operation_id = "clearHistory"
)]
#[delete("/qa/history")]
pub async fn clear_history(
    state: web::Data<HttpState>,
    session: SessionContext,
) -> ApiResult<web::Json<ClearHistoryResponse>> {
    let user_id = session.require_user_id()?;
    let deleted_count = state.qa.clear_history(&user_id).await?;
    Ok(web::Json(ClearHistoryResponse {
        success: true,
        message: format!("Deleted {deleted_count} queries from history"),
        deleted_count,
    }))
}

/// Fetch one query.
#[utoipa::path(
    get,
    path = "/api/qa/{id}",
    params(("id" = String, Path, description = "Query id")),
    responses(
        (status = 200, description = "Query", body = QueryResponse),
        (status = 401, description = "Unauthorised", body = Error),
        (status = 403, description = "Not the owner", body = Error),
        (status = 404, description = "Not found", body = Error)
    ),
    tags = ["qa"],
    operation_id = "getQuery"
)]
#[get("/qa/{id}")]
pub async fn get_query(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<String>,
) -> ApiResult<web::Json<QueryResponse>> {
    let user_id = session.require_user_id()?;
    let id = parse_query_id(&path)?;
    let record = state.qa_query.query(&user_id, &id).await?;
    Ok(web::Json(QueryResponse::from(record)))
}

/// Leave feedback on an answer.
#[utoipa::path(
    put,
    path = "/api/qa/{id}",
    params(("id" = String, Path, description = "Query id")),
    request_body = FeedbackRequest,
    responses(
        (status = 200, description = "Feedback stored", body = FeedbackUpdateResponse),
        (status = 400, description = "Rating out of range", body = Error),
        (status = 401, description = "Unauthorised", body = Error),
        (status = 403, description = "Not the owner", body = Error),
        (status = 404, description = "Not found", body = Error)
    ),
    tags = ["qa"],
    operation_id = "submitFeedback"
)]
#[put("/qa/{id}")]
pub async fn submit_feedback(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<String>,
    payload: web::Json<FeedbackRequest>,
) -> ApiResult<web::Json<FeedbackUpdateResponse>> {
    let user_id = session.require_user_id()?;
    let id = parse_query_id(&path)?;
    let feedback = parse_feedback(payload.into_inner())?;
    let record = state.qa.submit_feedback(&user_id, &id, feedback).await?;
    let QueryResponse {
        id,
        question,
        answer,
        feedback,
        ..
    } = QueryResponse::from(record);
    Ok(web::Json(FeedbackUpdateResponse {
        success: true,
        message: "Query updated successfully".to_owned(),
        query: FeedbackQuerySummary {
            id,
            question,
            answer,
            feedback,
        },
    }))
}

/// Delete one query.
#[utoipa::path(
    delete,
    path = "/api/qa/{id}",
    params(("id" = String, Path, description = "Query id")),
    responses(
        (status = 200, description = "Deleted", body = DeletedResponse),
        (status = 401, description = "Unauthorised", body = Error),
        (status = 403, description = "Not the owner", body = Error),
        (status = 404, description = "Not found", body = Error)
    ),
    tags = ["qa"],
    operation_id = "deleteQuery"
)]
#[delete("/qa/{id}")]
pub async fn delete_query(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<String>,
) -> ApiResult<web::Json<DeletedResponse>> {
    let user_id = session.require_user_id()?;
    let id = parse_query_id(&path)?;
    state.qa.delete_query(&user_id, &id).await?;
    Ok(web::Json(DeletedResponse {
        success: true,
        message: "Query deleted successfully".to_owned(),
    }))
}

#[cfg(test)]
#[path = "qa_tests.rs"]
mod tests;
