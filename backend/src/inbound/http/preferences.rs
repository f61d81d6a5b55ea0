//! Preference and onboarding HTTP handlers.
//!
//! ```text
//! GET  /api/auth/preferences
//! PUT  /api/auth/preferences {"theme":"dark","showSources":false}
//! POST /api/auth/onboarding  {"role":"developer"}
//! ```

use std::str::FromStr;

use actix_web::{HttpResponse, get, post, put, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{Error, Persona, PreferencesPatch, Theme, UserPreferences};
use crate::inbound::http::ApiResult;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{FieldErrorCode, FieldName, field_error};

/// Partial preferences update; omitted fields keep their stored value.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesRequest {
    #[schema(example = "dark")]
    pub theme: Option<String>,
    pub notifications: Option<bool>,
    pub show_sources: Option<bool>,
    pub code_snippets: Option<bool>,
    pub technical_terms: Option<bool>,
    pub simplified_explanations: Option<bool>,
    pub educational_resources: Option<bool>,
    pub query_saving: Option<bool>,
}

/// Stored preferences.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesResponse {
    pub theme: Theme,
    pub notifications: bool,
    pub show_sources: bool,
    pub code_snippets: bool,
    pub technical_terms: bool,
    pub simplified_explanations: bool,
    pub educational_resources: bool,
    pub query_saving: bool,
    pub updated_at: String,
}

impl From<UserPreferences> for PreferencesResponse {
    fn from(value: UserPreferences) -> Self {
        Self {
            theme: value.theme,
            notifications: value.notifications,
            show_sources: value.show_sources,
            code_snippets: value.code_snippets,
            technical_terms: value.technical_terms,
            simplified_explanations: value.simplified_explanations,
            educational_resources: value.educational_resources,
            query_saving: value.query_saving,
            updated_at: value.updated_at.to_rfc3339(),
        }
    }
}

/// Onboarding choice.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct OnboardingRequest {
    #[schema(example = "developer")]
    pub role: Option<String>,
}

/// Onboarding result with the persona defaults now in force.
#[derive(Debug, Serialize, ToSchema)]
pub struct OnboardingResponse {
    pub success: bool,
    pub preferences: PreferencesResponse,
}

fn parse_patch(payload: PreferencesRequest) -> Result<PreferencesPatch, Error> {
    let theme = payload
        .theme
        .map(|raw| {
            Theme::from_str(raw.trim()).map_err(|_| {
                field_error(
                    FieldName::new("theme"),
                    FieldErrorCode::InvalidChoice,
                    "theme must be light, dark or system",
                    Some(&raw),
                )
            })
        })
        .transpose()?;
    Ok(PreferencesPatch {
        theme,
        notifications: payload.notifications,
        show_sources: payload.show_sources,
        code_snippets: payload.code_snippets,
        technical_terms: payload.technical_terms,
        simplified_explanations: payload.simplified_explanations,
        educational_resources: payload.educational_resources,
        query_saving: payload.query_saving,
    })
}

fn parse_onboarding_role(role: Option<String>) -> Result<Persona, Error> {
    let invalid = |value: Option<&str>| {
        field_error(
            FieldName::new("role"),
            FieldErrorCode::InvalidChoice,
            "Invalid role",
            value,
        )
    };
    let raw = role.ok_or_else(|| invalid(None))?;
    Persona::from_str(raw.trim())
        .ok()
        .filter(|persona| persona.is_onboarding_choice())
        .ok_or_else(|| invalid(Some(&raw)))
}

/// Fetch the signed-in user's preferences, falling back to defaults.
#[utoipa::path(
    get,
    path = "/api/auth/preferences",
    responses(
        (status = 200, description = "Preferences", body = PreferencesResponse,
            headers(("Cache-Control" = String, description = "Cache control header"))),
        (status = 401, description = "Unauthorised", body = Error),
        (status = 404, description = "User not found", body = Error)
    ),
    tags = ["preferences"],
    operation_id = "getPreferences"
)]
#[get("/auth/preferences")]
pub async fn get_preferences(
    state: web::Data<HttpState>,
    session: SessionContext,
) -> ApiResult<HttpResponse> {
    let user_id = session.require_user_id()?;
    let preferences = state.preferences_query.preferences(&user_id).await?;
    Ok(HttpResponse::Ok()
        .insert_header(("Cache-Control", "private, must-revalidate, no-cache"))
        .json(PreferencesResponse::from(preferences)))
}

/// Apply a partial update, creating the record when absent.
#[utoipa::path(
    put,
    path = "/api/auth/preferences",
    request_body = PreferencesRequest,
    responses(
        (status = 200, description = "Updated preferences", body = PreferencesResponse),
        (status = 400, description = "Invalid request", body = Error),
        (status = 401, description = "Unauthorised", body = Error)
    ),
    tags = ["preferences"],
    operation_id = "updatePreferences"
)]
#[put("/auth/preferences")]
pub async fn update_preferences(
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<PreferencesRequest>,
) -> ApiResult<web::Json<PreferencesResponse>> {
    let user_id = session.require_user_id()?;
    let patch = parse_patch(payload.into_inner())?;
    let preferences = state
        .preferences
        .update_preferences(&user_id, patch)
        .await?;
    Ok(web::Json(PreferencesResponse::from(preferences)))
}

/// Record the onboarding persona and seed its preference defaults.
#[utoipa::path(
    post,
    path = "/api/auth/onboarding",
    request_body = OnboardingRequest,
    responses(
        (status = 200, description = "Onboarding complete", body = OnboardingResponse),
        (status = 400, description = "Role must be developer or teacher", body = Error),
        (status = 401, description = "Unauthorised", body = Error),
        (status = 404, description = "User not found", body = Error)
    ),
    tags = ["preferences"],
    operation_id = "completeOnboarding"
)]
#[post("/auth/onboarding")]
pub async fn complete_onboarding(
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<OnboardingRequest>,
) -> ApiResult<web::Json<OnboardingResponse>> {
    let user_id = session.require_user_id()?;
    let persona = parse_onboarding_role(payload.into_inner().role)?;
    let preferences = state
        .preferences
        .complete_onboarding(&user_id, persona)
        .await?;
    Ok(web::Json(OnboardingResponse {
        success: true,
        preferences: PreferencesResponse::from(preferences),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorCode;
    use crate::inbound::http::test_utils::{MockPorts, ada, signed_in_app};
    use crate::test_support::fixture_timestamp;
    use actix_web::http::StatusCode;
    use actix_web::test::{self};
    use insta::assert_json_snapshot;
    use rstest::rstest;
    use serde_json::{Value, json};

    #[rstest]
    #[case(Some("business"))]
    #[case(Some("admin"))]
    #[case(None)]
    fn onboarding_rejects_non_choices(#[case] role: Option<&str>) {
        let err = parse_onboarding_role(role.map(str::to_owned)).expect_err("invalid role");
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
        assert_eq!(err.message(), "Invalid role");
    }

    #[rstest]
    #[case("developer", Persona::Developer)]
    #[case(" teacher ", Persona::Teacher)]
    fn onboarding_accepts_choices(#[case] role: &str, #[case] expected: Persona) {
        assert_eq!(parse_onboarding_role(Some(role.to_owned())), Ok(expected));
    }

    #[rstest]
    fn patch_rejects_unknown_theme() {
        let payload = PreferencesRequest {
            theme: Some("sepia".to_owned()),
            ..PreferencesRequest::default()
        };
        let err = parse_patch(payload).expect_err("invalid theme");
        assert_eq!(err.details().expect("details")["field"], "theme");
    }

    #[rstest]
    fn response_uses_camel_case() {
        let prefs = UserPreferences::for_persona(ada().user_id, Persona::Teacher, fixture_timestamp());
        assert_json_snapshot!(PreferencesResponse::from(prefs), @r#"
        {
          "theme": "system",
          "notifications": true,
          "showSources": true,
          "codeSnippets": false,
          "technicalTerms": false,
          "simplifiedExplanations": true,
          "educationalResources": true,
          "querySaving": true,
          "updatedAt": "2025-03-14T09:30:00+00:00"
        }
        "#);
    }

    #[rstest]
    #[actix_web::test]
    async fn put_forwards_only_supplied_fields() {
        let mut ports = MockPorts::default();
        ports
            .preferences
            .expect_update_preferences()
            .withf(|user_id, patch| {
                *user_id == ada().user_id
                    && patch.theme == Some(Theme::Dark)
                    && patch.show_sources == Some(false)
                    && patch.notifications.is_none()
            })
            .returning(|user_id, patch| {
                let mut prefs = UserPreferences::defaults(*user_id, fixture_timestamp());
                prefs.apply(&patch, fixture_timestamp());
                Ok(prefs)
            });
        let (app, cookie) = signed_in_app!(ports.into_state(), update_preferences);

        let request = test::TestRequest::put()
            .uri("/api/auth/preferences")
            .cookie(cookie)
            .set_json(json!({"theme": "dark", "showSources": false}))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        let value: Value = test::read_body_json(response).await;
        assert_eq!(value["theme"], "dark");
        assert_eq!(value["showSources"], false);
    }

    #[rstest]
    #[actix_web::test]
    async fn get_maps_missing_user_to_not_found() {
        let mut ports = MockPorts::default();
        ports
            .preferences_query
            .expect_preferences()
            .returning(|_| Err(Error::not_found("User not found")));
        let (app, cookie) = signed_in_app!(ports.into_state(), get_preferences);

        let request = test::TestRequest::get()
            .uri("/api/auth/preferences")
            .cookie(cookie)
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[rstest]
    #[actix_web::test]
    async fn onboarding_rejects_invalid_role_before_calling_service() {
        let mut ports = MockPorts::default();
        ports.preferences.expect_complete_onboarding().never();
        let (app, cookie) = signed_in_app!(ports.into_state(), complete_onboarding);

        let request = test::TestRequest::post()
            .uri("/api/auth/onboarding")
            .cookie(cookie)
            .set_json(json!({"role": "wizard"}))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[rstest]
    #[actix_web::test]
    async fn preferences_require_sign_in() {
        let (app, _) = signed_in_app!(MockPorts::default().into_state(), get_preferences);
        let request = test::TestRequest::get().uri("/api/auth/preferences").to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
