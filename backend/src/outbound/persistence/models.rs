//! Internal Diesel row structs for database operations.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain. Conversions to and from domain types live
//! next to the repository that needs them.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use super::schema::{queries, sources, user_preferences, users};

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// Row struct for reading from the users table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub image: Option<String>,
    pub email_verified: Option<DateTime<Utc>>,
    pub role: String,
    pub persona: Option<String>,
    pub password_hash: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
    pub login_count: i32,
    pub query_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insertable struct for creating user records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub(crate) struct NewUserRow<'a> {
    pub id: Uuid,
    pub name: &'a str,
    pub email: &'a str,
    pub image: Option<&'a str>,
    pub email_verified: Option<DateTime<Utc>>,
    pub role: &'a str,
    pub persona: Option<&'a str>,
    pub password_hash: Option<&'a str>,
    pub last_login: Option<DateTime<Utc>>,
    pub login_count: i32,
    pub query_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Changeset overwriting every mutable user column.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = users)]
#[diesel(treat_none_as_null = true)]
pub(crate) struct UserUpdate<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub image: Option<&'a str>,
    pub email_verified: Option<DateTime<Utc>>,
    pub role: &'a str,
    pub persona: Option<&'a str>,
    pub password_hash: Option<&'a str>,
    pub last_login: Option<DateTime<Utc>>,
    pub login_count: i32,
    pub query_count: i32,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// User preferences
// ---------------------------------------------------------------------------

/// Row struct for reading from the user_preferences table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = user_preferences)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct UserPreferencesRow {
    pub user_id: Uuid,
    pub theme: String,
    pub notifications: bool,
    pub show_sources: bool,
    pub code_snippets: bool,
    pub technical_terms: bool,
    pub simplified_explanations: bool,
    pub educational_resources: bool,
    pub query_saving: bool,
    pub updated_at: DateTime<Utc>,
}

/// Insertable struct used for the upsert's insert half.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = user_preferences)]
pub(crate) struct NewUserPreferencesRow<'a> {
    pub user_id: Uuid,
    #[diesel(embed)]
    pub values: UserPreferencesUpdate<'a>,
}

/// Changeset used for the upsert's conflict half.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = user_preferences)]
pub(crate) struct UserPreferencesUpdate<'a> {
    pub theme: &'a str,
    pub notifications: bool,
    pub show_sources: bool,
    pub code_snippets: bool,
    pub technical_terms: bool,
    pub simplified_explanations: bool,
    pub educational_resources: bool,
    pub query_saving: bool,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Row struct for reading from the queries table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = queries)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct QueryRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub question: String,
    pub answer: Option<String>,
    pub context: Option<String>,
    pub sources: serde_json::Value,
    pub status: String,
    pub submitted_at: DateTime<Utc>,
    pub processing_time_ms: Option<i64>,
    pub feedback: Option<serde_json::Value>,
}

/// Insertable struct for creating query records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = queries)]
pub(crate) struct NewQueryRow<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub question: &'a str,
    #[diesel(embed)]
    pub state: QueryUpdate<'a>,
    pub submitted_at: DateTime<Utc>,
}

/// Changeset for the mutable part of a query.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = queries)]
#[diesel(treat_none_as_null = true)]
pub(crate) struct QueryUpdate<'a> {
    pub answer: Option<&'a str>,
    pub context: Option<&'a str>,
    pub sources: serde_json::Value,
    pub status: &'a str,
    pub processing_time_ms: Option<i64>,
    pub feedback: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Row struct for reading from the sources table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = sources)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct SourceRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub kind: String,
    pub url: String,
    pub content: String,
    pub metadata: serde_json::Value,
    pub user_id: Uuid,
    pub is_public: bool,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_indexed: Option<DateTime<Utc>>,
    pub status: String,
}

/// Insertable struct for creating source records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = sources)]
pub(crate) struct NewSourceRow<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    #[diesel(embed)]
    pub values: SourceUpdate<'a>,
}

/// Changeset for the mutable part of a source.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = sources)]
#[diesel(treat_none_as_null = true)]
pub(crate) struct SourceUpdate<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub kind: &'a str,
    pub url: &'a str,
    pub content: &'a str,
    pub metadata: serde_json::Value,
    pub is_public: bool,
    pub tags: &'a [String],
    pub updated_at: DateTime<Utc>,
    pub last_indexed: Option<DateTime<Utc>>,
    pub status: &'a str,
}
