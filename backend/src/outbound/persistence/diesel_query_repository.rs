//! PostgreSQL-backed `QueryRepository` implementation using Diesel ORM.
//!
//! Citations and feedback are stored as JSONB; history listings are served
//! from the `(user_id, submitted_at DESC)` index.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{HistoryFilter, QueryRepository, QueryRepositoryError};
use crate::domain::{
    Feedback, PageRequest, QueryId, QueryRecord, QueryStatus, SourceCitation, UserId,
};

use super::error_mapping::{map_diesel_error, map_pool_error};
use super::models::{NewQueryRow, QueryRow, QueryUpdate};
use super::pool::{DbPool, PoolError};
use super::schema::queries;

/// Diesel-backed implementation of the [`QueryRepository`] port.
#[derive(Clone)]
pub struct DieselQueryRepository {
    pool: DbPool,
}

impl DieselQueryRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn pool_error(error: PoolError) -> QueryRepositoryError {
    map_pool_error(error, QueryRepositoryError::connection)
}

fn diesel_error(error: diesel::result::Error) -> QueryRepositoryError {
    map_diesel_error(
        error,
        QueryRepositoryError::query,
        QueryRepositoryError::connection,
    )
}

fn serialization_error(error: serde_json::Error) -> QueryRepositoryError {
    QueryRepositoryError::serialization(error.to_string())
}

fn row_to_record(row: QueryRow) -> Result<QueryRecord, QueryRepositoryError> {
    let status: QueryStatus = row
        .status
        .parse()
        .map_err(|err: String| QueryRepositoryError::serialization(err))?;
    let sources: Vec<SourceCitation> =
        serde_json::from_value(row.sources).map_err(serialization_error)?;
    let feedback: Option<Feedback> = row
        .feedback
        .map(serde_json::from_value)
        .transpose()
        .map_err(serialization_error)?;

    Ok(QueryRecord {
        id: QueryId::from_uuid(row.id),
        user_id: UserId::from_uuid(row.user_id),
        question: row.question,
        answer: row.answer,
        context: row.context,
        sources,
        status,
        timestamp: row.submitted_at,
        processing_time_ms: row
            .processing_time_ms
            .and_then(|ms| u64::try_from(ms).ok()),
        feedback,
    })
}

fn record_state(record: &QueryRecord) -> Result<QueryUpdate<'_>, QueryRepositoryError> {
    Ok(QueryUpdate {
        answer: record.answer.as_deref(),
        context: record.context.as_deref(),
        sources: serde_json::to_value(&record.sources).map_err(serialization_error)?,
        status: record.status.as_str(),
        processing_time_ms: record
            .processing_time_ms
            .map(|ms| i64::try_from(ms).unwrap_or(i64::MAX)),
        feedback: record
            .feedback
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(serialization_error)?,
    })
}

/// Boxed filter shared by the page and count queries of a listing.
fn history_query<'a>(
    user_id: &UserId,
    filter: &HistoryFilter,
) -> queries::BoxedQuery<'a, diesel::pg::Pg> {
    let mut query = queries::table
        .filter(queries::user_id.eq(*user_id.as_uuid()))
        .into_boxed();
    if let Some(from) = filter.from {
        query = query.filter(queries::submitted_at.ge(from));
    }
    if let Some(to) = filter.to {
        query = query.filter(queries::submitted_at.le(to));
    }
    query
}

#[async_trait]
impl QueryRepository for DieselQueryRepository {
    async fn insert(&self, record: &QueryRecord) -> Result<(), QueryRepositoryError> {
        let row = NewQueryRow {
            id: *record.id.as_uuid(),
            user_id: *record.user_id.as_uuid(),
            question: &record.question,
            state: record_state(record)?,
            submitted_at: record.timestamp,
        };
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        diesel::insert_into(queries::table)
            .values(&row)
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(diesel_error)
    }

    async fn update(&self, record: &QueryRecord) -> Result<(), QueryRepositoryError> {
        let state = record_state(record)?;
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        let updated = diesel::update(queries::table.filter(queries::id.eq(record.id.as_uuid())))
            .set(&state)
            .execute(&mut conn)
            .await
            .map_err(diesel_error)?;
        if updated == 0 {
            return Err(QueryRepositoryError::query("query not found for update"));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: &QueryId) -> Result<Option<QueryRecord>, QueryRepositoryError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        let row: Option<QueryRow> = queries::table
            .filter(queries::id.eq(id.as_uuid()))
            .select(QueryRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(diesel_error)?;
        row.map(row_to_record).transpose()
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
        filter: &HistoryFilter,
        page: PageRequest,
    ) -> Result<(Vec<QueryRecord>, u64), QueryRepositoryError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;

        let total: i64 = history_query(user_id, filter)
            .count()
            .get_result(&mut conn)
            .await
            .map_err(diesel_error)?;

        let rows: Vec<QueryRow> = history_query(user_id, filter)
            .select(QueryRow::as_select())
            .order_by((queries::submitted_at.desc(), queries::id.desc()))
            .limit(i64::from(page.limit()))
            .offset(i64::try_from(page.offset()).unwrap_or(i64::MAX))
            .load(&mut conn)
            .await
            .map_err(diesel_error)?;

        let records = rows
            .into_iter()
            .map(row_to_record)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((records, u64::try_from(total).unwrap_or(0)))
    }

    async fn delete(&self, id: &QueryId) -> Result<bool, QueryRepositoryError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        let deleted = diesel::delete(queries::table.filter(queries::id.eq(id.as_uuid())))
            .execute(&mut conn)
            .await
            .map_err(diesel_error)?;
        Ok(deleted > 0)
    }

    async fn delete_all_for_user(&self, user_id: &UserId) -> Result<u64, QueryRepositoryError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        let deleted = diesel::delete(queries::table.filter(queries::user_id.eq(user_id.as_uuid())))
            .execute(&mut conn)
            .await
            .map_err(diesel_error)?;
        Ok(u64::try_from(deleted).unwrap_or(u64::MAX))
    }
}
