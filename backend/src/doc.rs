//! OpenAPI documentation configuration.
//!
//! [`ApiDoc`] registers every REST handler under `/api` plus the health
//! probes, the DTO schemas they reference and the session cookie security
//! scheme. Swagger UI serves it in debug builds and `openapi-dump` exports
//! it for tooling.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::domain::{
    AccessRole, Error, ErrorCode, PageInfo, Persona, QueryStatus, SourceCitation, Theme,
};
use crate::inbound::http::{auth, health, preferences, qa, webhooks};

/// Adds the session cookie security scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "SessionCookie",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                "session",
                "Session cookie issued by POST /api/auth/login or the Google callback.",
            ))),
        );
    }
}

/// OpenAPI document for the REST API.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Cervello backend API",
        description = "Question answering over indexed sources, with accounts, preferences, history and webhook intake."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    security(("SessionCookie" = [])),
    paths(
        auth::register,
        auth::login,
        auth::google_authorization_url,
        auth::google_callback,
        auth::current_session,
        auth::logout,
        auth::get_profile,
        auth::update_profile,
        preferences::get_preferences,
        preferences::update_preferences,
        preferences::complete_onboarding,
        qa::ask,
        qa::list_queries,
        qa::history,
        qa::clear_history,
        qa::get_query,
        qa::submit_feedback,
        qa::delete_query,
        webhooks::receive_webhook,
        health::ready,
        health::live,
    ),
    components(schemas(
        Error,
        ErrorCode,
        AccessRole,
        Persona,
        Theme,
        QueryStatus,
        SourceCitation,
        PageInfo,
        auth::RegisterRequest,
        auth::RegisterResponse,
        auth::LoginRequest,
        auth::UserResponse,
        auth::ProfileResponse,
        auth::ProfileUpdateRequest,
        auth::AuthorizationUrlResponse,
        preferences::PreferencesRequest,
        preferences::PreferencesResponse,
        preferences::OnboardingRequest,
        preferences::OnboardingResponse,
        qa::AskRequest,
        qa::AskResponse,
        qa::QueryResponse,
        qa::QueryListResponse,
        qa::HistoryResponse,
        qa::ClearHistoryResponse,
        qa::FeedbackRequest,
        qa::FeedbackResponse,
        qa::FeedbackUpdateResponse,
        qa::FeedbackQuerySummary,
        qa::DeletedResponse,
        webhooks::WebhookAck,
        health::ProbeStatus,
    )),
    tags(
        (name = "auth", description = "Accounts, sign-in and sessions"),
        (name = "preferences", description = "Preferences and onboarding"),
        (name = "qa", description = "Questions, answers and history"),
        (name = "webhooks", description = "Indexing pipeline callbacks"),
        (name = "health", description = "Endpoints for health checks")
    )
)]
pub struct ApiDoc;
