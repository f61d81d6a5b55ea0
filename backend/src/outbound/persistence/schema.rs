//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match `backend/migrations` exactly. Regenerate with
//! `diesel print-schema` after changing a migration.

diesel::table! {
    /// User accounts keyed by UUID with a unique email address.
    users (id) {
        id -> Uuid,
        name -> Varchar,
        email -> Varchar,
        image -> Nullable<Text>,
        email_verified -> Nullable<Timestamptz>,
        /// `user`, `admin` or `moderator`.
        role -> Varchar,
        /// Onboarding persona; null until onboarding completes.
        persona -> Nullable<Varchar>,
        /// bcrypt hash for credential accounts.
        password_hash -> Nullable<Text>,
        last_login -> Nullable<Timestamptz>,
        login_count -> Int4,
        query_count -> Int4,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// One preferences row per user.
    user_preferences (user_id) {
        user_id -> Uuid,
        theme -> Varchar,
        notifications -> Bool,
        show_sources -> Bool,
        code_snippets -> Bool,
        technical_terms -> Bool,
        simplified_explanations -> Bool,
        educational_resources -> Bool,
        query_saving -> Bool,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Question/answer exchanges.
    queries (id) {
        id -> Uuid,
        user_id -> Uuid,
        question -> Text,
        answer -> Nullable<Text>,
        context -> Nullable<Text>,
        /// Array of source citations.
        sources -> Jsonb,
        status -> Varchar,
        submitted_at -> Timestamptz,
        processing_time_ms -> Nullable<Int8>,
        /// `{rating, comment, timestamp}` once feedback is given.
        feedback -> Nullable<Jsonb>,
    }
}

diesel::table! {
    /// Content sources maintained through webhook events.
    sources (id) {
        id -> Uuid,
        title -> Text,
        description -> Text,
        kind -> Varchar,
        url -> Text,
        content -> Text,
        metadata -> Jsonb,
        user_id -> Uuid,
        is_public -> Bool,
        tags -> Array<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        last_indexed -> Nullable<Timestamptz>,
        status -> Varchar,
    }
}

diesel::joinable!(user_preferences -> users (user_id));
diesel::joinable!(queries -> users (user_id));

diesel::allow_tables_to_appear_in_same_query!(users, user_preferences, queries, sources);
