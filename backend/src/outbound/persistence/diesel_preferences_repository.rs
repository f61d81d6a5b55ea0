//! PostgreSQL-backed `PreferencesRepository` implementation using Diesel ORM.
//!
//! Writes are a single `INSERT ... ON CONFLICT (user_id) DO UPDATE`, so the
//! first save creates the row and later saves replace it.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{PreferencesRepository, PreferencesRepositoryError};
use crate::domain::{Theme, UserId, UserPreferences};

use super::error_mapping::{map_diesel_error, map_pool_error};
use super::models::{NewUserPreferencesRow, UserPreferencesRow, UserPreferencesUpdate};
use super::pool::{DbPool, PoolError};
use super::schema::user_preferences;

/// Diesel-backed implementation of the [`PreferencesRepository`] port.
#[derive(Clone)]
pub struct DieselPreferencesRepository {
    pool: DbPool,
}

impl DieselPreferencesRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn pool_error(error: PoolError) -> PreferencesRepositoryError {
    map_pool_error(error, PreferencesRepositoryError::connection)
}

fn diesel_error(error: diesel::result::Error) -> PreferencesRepositoryError {
    map_diesel_error(
        error,
        PreferencesRepositoryError::query,
        PreferencesRepositoryError::connection,
    )
}

fn row_to_preferences(row: UserPreferencesRow) -> UserPreferences {
    let theme = row.theme.parse().unwrap_or_else(|_| {
        tracing::warn!(
            value = row.theme.as_str(),
            user_id = %row.user_id,
            "unrecognised theme value, defaulting to system"
        );
        Theme::System
    });

    UserPreferences {
        user_id: UserId::from_uuid(row.user_id),
        theme,
        notifications: row.notifications,
        show_sources: row.show_sources,
        code_snippets: row.code_snippets,
        technical_terms: row.technical_terms,
        simplified_explanations: row.simplified_explanations,
        educational_resources: row.educational_resources,
        query_saving: row.query_saving,
        updated_at: row.updated_at,
    }
}

fn preferences_values(preferences: &UserPreferences) -> UserPreferencesUpdate<'static> {
    UserPreferencesUpdate {
        theme: preferences.theme.as_str(),
        notifications: preferences.notifications,
        show_sources: preferences.show_sources,
        code_snippets: preferences.code_snippets,
        technical_terms: preferences.technical_terms,
        simplified_explanations: preferences.simplified_explanations,
        educational_resources: preferences.educational_resources,
        query_saving: preferences.query_saving,
        updated_at: preferences.updated_at,
    }
}

#[async_trait]
impl PreferencesRepository for DieselPreferencesRepository {
    async fn find(
        &self,
        user_id: &UserId,
    ) -> Result<Option<UserPreferences>, PreferencesRepositoryError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        let row: Option<UserPreferencesRow> = user_preferences::table
            .filter(user_preferences::user_id.eq(user_id.as_uuid()))
            .select(UserPreferencesRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(diesel_error)?;
        Ok(row.map(row_to_preferences))
    }

    async fn upsert(
        &self,
        preferences: &UserPreferences,
    ) -> Result<(), PreferencesRepositoryError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        let row = NewUserPreferencesRow {
            user_id: *preferences.user_id.as_uuid(),
            values: preferences_values(preferences),
        };

        diesel::insert_into(user_preferences::table)
            .values(&row)
            .on_conflict(user_preferences::user_id)
            .do_update()
            .set((
                user_preferences::theme.eq(excluded(user_preferences::theme)),
                user_preferences::notifications.eq(excluded(user_preferences::notifications)),
                user_preferences::show_sources.eq(excluded(user_preferences::show_sources)),
                user_preferences::code_snippets.eq(excluded(user_preferences::code_snippets)),
                user_preferences::technical_terms.eq(excluded(user_preferences::technical_terms)),
                user_preferences::simplified_explanations
                    .eq(excluded(user_preferences::simplified_explanations)),
                user_preferences::educational_resources
                    .eq(excluded(user_preferences::educational_resources)),
                user_preferences::query_saving.eq(excluded(user_preferences::query_saving)),
                user_preferences::updated_at.eq(excluded(user_preferences::updated_at)),
            ))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(diesel_error)
    }
}
