//! PostgreSQL-backed `SourceRepository` implementation using Diesel ORM.

use std::collections::BTreeMap;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{SourceRepository, SourceRepositoryError};
use crate::domain::{Source, SourceId, UserId};

use super::error_mapping::{map_diesel_error, map_pool_error};
use super::models::{NewSourceRow, SourceRow, SourceUpdate};
use super::pool::{DbPool, PoolError};
use super::schema::sources;

/// Diesel-backed implementation of the [`SourceRepository`] port.
#[derive(Clone)]
pub struct DieselSourceRepository {
    pool: DbPool,
}

impl DieselSourceRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn pool_error(error: PoolError) -> SourceRepositoryError {
    map_pool_error(error, SourceRepositoryError::connection)
}

fn diesel_error(error: diesel::result::Error) -> SourceRepositoryError {
    map_diesel_error(
        error,
        SourceRepositoryError::query,
        SourceRepositoryError::connection,
    )
}

fn row_to_source(row: SourceRow) -> Result<Source, SourceRepositoryError> {
    let kind = row.kind.parse().map_err(SourceRepositoryError::query)?;
    let status = row.status.parse().map_err(SourceRepositoryError::query)?;
    let metadata: BTreeMap<String, String> = serde_json::from_value(row.metadata)
        .map_err(|err| SourceRepositoryError::query(format!("stored metadata invalid: {err}")))?;

    Ok(Source {
        id: SourceId::from_uuid(row.id),
        title: row.title,
        description: row.description,
        kind,
        url: row.url,
        content: row.content,
        metadata,
        user_id: UserId::from_uuid(row.user_id),
        is_public: row.is_public,
        tags: row.tags,
        created_at: row.created_at,
        updated_at: row.updated_at,
        last_indexed: row.last_indexed,
        status,
    })
}

fn source_values(source: &Source) -> Result<SourceUpdate<'_>, SourceRepositoryError> {
    let metadata = serde_json::to_value(&source.metadata)
        .map_err(|err| SourceRepositoryError::query(format!("metadata not encodable: {err}")))?;
    Ok(SourceUpdate {
        title: &source.title,
        description: &source.description,
        kind: source.kind.as_str(),
        url: &source.url,
        content: &source.content,
        metadata,
        is_public: source.is_public,
        tags: &source.tags,
        updated_at: source.updated_at,
        last_indexed: source.last_indexed,
        status: source.status.as_str(),
    })
}

#[async_trait]
impl SourceRepository for DieselSourceRepository {
    async fn insert(&self, source: &Source) -> Result<(), SourceRepositoryError> {
        let row = NewSourceRow {
            id: *source.id.as_uuid(),
            user_id: *source.user_id.as_uuid(),
            created_at: source.created_at,
            values: source_values(source)?,
        };
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        diesel::insert_into(sources::table)
            .values(&row)
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(diesel_error)
    }

    async fn find_by_id(&self, id: &SourceId) -> Result<Option<Source>, SourceRepositoryError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        let row: Option<SourceRow> = sources::table
            .filter(sources::id.eq(id.as_uuid()))
            .select(SourceRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(diesel_error)?;
        row.map(row_to_source).transpose()
    }

    async fn update(&self, source: &Source) -> Result<(), SourceRepositoryError> {
        let values = source_values(source)?;
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        let updated = diesel::update(sources::table.filter(sources::id.eq(source.id.as_uuid())))
            .set(&values)
            .execute(&mut conn)
            .await
            .map_err(diesel_error)?;
        if updated == 0 {
            return Err(SourceRepositoryError::query("source not found for update"));
        }
        Ok(())
    }

    async fn delete(&self, id: &SourceId) -> Result<bool, SourceRepositoryError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        let deleted = diesel::delete(sources::table.filter(sources::id.eq(id.as_uuid())))
            .execute(&mut conn)
            .await
            .map_err(diesel_error)?;
        Ok(deleted > 0)
    }
}
