//! Domain primitives, aggregates, ports and services.
//!
//! Purpose: define strongly typed entities used by the HTTP, WebSocket and
//! persistence adapters, the ports those adapters implement, and the
//! services that orchestrate them. Nothing in here depends on actix or
//! diesel.
//!
//! Public surface:
//! - Error / ErrorCode: API error payload and stable identifier.
//! - User, UserPreferences, QueryRecord, Source: persisted aggregates.
//! - Notification: real-time push events.
//! - AccountService, PreferencesService, QaService, WebhookService: use-cases.

mod account_service;
pub mod auth;
pub mod error;
pub mod notification;
pub mod pagination;
pub mod ports;
pub mod preferences;
mod preferences_service;
mod qa_service;
pub mod query;
pub mod source;
pub mod trace_id;
pub mod user;
pub mod webhook;
mod webhook_service;

pub use self::account_service::{AccountService, DEFAULT_BCRYPT_COST};
pub use self::auth::{CredentialsValidationError, LoginCredentials, Registration, SessionIdentity};
pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::notification::{
    Audience, Notification, NotificationKind, SOURCES_TOPIC, query_topic,
};
pub use self::pagination::{MAX_PAGE_SIZE, Page, PageInfo, PageRequest};
pub use self::preferences::{ParseThemeError, PreferencesPatch, Theme, UserPreferences};
pub use self::preferences_service::PreferencesService;
pub use self::qa_service::{ANSWER_FAILURE_MESSAGE, QaService, QaServicePorts};
pub use self::query::{
    Feedback, QueryId, QueryRecord, QueryStatus, RATING_RANGE, Rating, RatingOutOfRange,
    SourceCitation,
};
pub use self::source::{NewSource, Source, SourceId, SourceKind, SourceStatus};
pub use self::trace_id::{TRACE_ID_HEADER, TraceId};
pub use self::user::{
    AccessRole, EmailAddress, Persona, User, UserId, UserMetadata, UserValidationError,
};
pub use self::webhook::{SUPPORTED_WEBHOOK_TYPES, WebhookEvent};
pub use self::webhook_service::{WebhookSecurity, WebhookService, WebhookServicePorts};

