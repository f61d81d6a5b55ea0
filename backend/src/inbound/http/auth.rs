//! Account HTTP handlers: registration, sign-in, OAuth, session and profile.
//!
//! ```text
//! POST /api/auth/register {"name":"Ada","email":"ada@example.org","password":"pw"}
//! POST /api/auth/login {"email":"ada@example.org","password":"pw"}
//! GET  /api/auth/oauth/google
//! GET  /api/auth/oauth/google/callback?code=..&state=..
//! GET  /api/auth/session
//! POST /api/auth/logout
//! GET  /api/auth/profile
//! PUT  /api/auth/profile {"name":"Ada L."}
//! ```

use actix_web::{HttpResponse, get, post, put, web};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};

use crate::domain::ports::ProfileUpdate;
use crate::domain::{
    AccessRole, CredentialsValidationError, Error, LoginCredentials, Persona, Registration,
    SessionIdentity, User,
};
use crate::inbound::http::ApiResult;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{FieldErrorCode, FieldName, field_error};

const MISSING_FIELDS: &str = "Missing required fields";
const OAUTH_STATE_LEN: usize = 32;

/// Registration body. Every field is required.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Credential sign-in body.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Profile edit body; omitted fields are left alone and an empty `image`
/// clears the avatar.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct ProfileUpdateRequest {
    pub name: Option<String>,
    pub image: Option<String>,
}

/// Signed-in user as seen by the frontend.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub image: Option<String>,
    pub role: AccessRole,
    pub persona: Option<Persona>,
    pub onboarded: bool,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            name: user.name.clone(),
            email: user.email.as_str().to_owned(),
            image: user.image.clone(),
            role: user.role,
            persona: user.persona,
            onboarded: user.onboarded(),
        }
    }
}

/// Full profile including usage counters.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub email_verified: Option<String>,
    pub last_login: Option<String>,
    pub login_count: u32,
    pub query_count: u32,
    pub created_at: String,
}

impl From<&User> for ProfileResponse {
    fn from(user: &User) -> Self {
        Self {
            user: UserResponse::from(user),
            email_verified: user.email_verified.map(|at| at.to_rfc3339()),
            last_login: user.metadata.last_login.map(|at| at.to_rfc3339()),
            login_count: user.metadata.login_count,
            query_count: user.metadata.query_count,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// Registration result.
#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterResponse {
    pub success: bool,
    pub user: UserResponse,
}

/// Where to send the browser to start the OAuth flow.
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthorizationUrlResponse {
    pub url: String,
}

/// Provider redirect parameters.
#[derive(Debug, Deserialize, IntoParams)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

fn map_registration_error(err: CredentialsValidationError) -> Error {
    match err {
        CredentialsValidationError::EmptyName => {
            field_error(FieldName::new("name"), FieldErrorCode::MissingField, MISSING_FIELDS, None)
        }
        CredentialsValidationError::EmptyPassword => field_error(
            FieldName::new("password"),
            FieldErrorCode::MissingField,
            MISSING_FIELDS,
            None,
        ),
        CredentialsValidationError::Email(inner) => Error::invalid_request(inner.to_string())
            .with_details(json!({ "field": "email", "code": "invalid_email" })),
    }
}

fn start_session(session: &SessionContext, user: &User) -> Result<(), Error> {
    session.persist_identity(&SessionIdentity {
        user_id: user.id,
        name: user.name.clone(),
        email: user.email.clone(),
    })
}

/// Create a credential account.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Account created", body = RegisterResponse),
        (status = 400, description = "Missing or invalid fields", body = Error),
        (status = 409, description = "Email already in use", body = Error),
        (status = 500, description = "Internal server error", body = Error)
    ),
    tags = ["auth"],
    operation_id = "register",
    security([])
)]
#[post("/auth/register")]
pub async fn register(
    state: web::Data<HttpState>,
    payload: web::Json<RegisterRequest>,
) -> ApiResult<web::Json<RegisterResponse>> {
    let RegisterRequest {
        name,
        email,
        password,
    } = payload.into_inner();
    let (Some(name), Some(email), Some(password)) = (name, email, password) else {
        return Err(Error::invalid_request(MISSING_FIELDS));
    };
    let registration =
        Registration::try_from_parts(&name, &email, &password).map_err(map_registration_error)?;
    let user = state.accounts.register(registration).await?;
    Ok(web::Json(RegisterResponse {
        success: true,
        user: UserResponse::from(&user),
    }))
}

/// Sign in with email and password.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = UserResponse,
            headers(("Set-Cookie" = String, description = "Session cookie"))),
        (status = 400, description = "Invalid request", body = Error),
        (status = 401, description = "Invalid credentials", body = Error)
    ),
    tags = ["auth"],
    operation_id = "login",
    security([])
)]
#[post("/auth/login")]
pub async fn login(
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<LoginRequest>,
) -> ApiResult<web::Json<UserResponse>> {
    let LoginRequest { email, password } = payload.into_inner();
    let credentials =
        LoginCredentials::try_from_parts(&email, &password).map_err(map_registration_error)?;
    let user = state.accounts.login(credentials).await?;
    start_session(&session, &user)?;
    info!(user_id = %user.id, "credential sign-in");
    Ok(web::Json(UserResponse::from(&user)))
}

/// Begin Google sign-in; stores a CSRF state in the session.
#[utoipa::path(
    get,
    path = "/api/auth/oauth/google",
    responses(
        (status = 200, description = "Authorisation URL", body = AuthorizationUrlResponse),
        (status = 503, description = "OAuth not configured", body = Error)
    ),
    tags = ["auth"],
    operation_id = "googleAuthorizationUrl",
    security([])
)]
#[get("/auth/oauth/google")]
pub async fn google_authorization_url(
    state: web::Data<HttpState>,
    session: SessionContext,
) -> ApiResult<web::Json<AuthorizationUrlResponse>> {
    let csrf: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(OAUTH_STATE_LEN)
        .map(char::from)
        .collect();
    let url = state.accounts.oauth_authorization_url(&csrf)?;
    session.store_oauth_state(&csrf)?;
    Ok(web::Json(AuthorizationUrlResponse { url }))
}

/// Complete Google sign-in and start a session.
#[utoipa::path(
    get,
    path = "/api/auth/oauth/google/callback",
    params(OAuthCallbackQuery),
    responses(
        (status = 200, description = "Signed in", body = UserResponse),
        (status = 400, description = "Missing code", body = Error),
        (status = 401, description = "State mismatch or unverified email", body = Error),
        (status = 500, description = "Provider failure", body = Error)
    ),
    tags = ["auth"],
    operation_id = "googleCallback",
    security([])
)]
#[get("/auth/oauth/google/callback")]
pub async fn google_callback(
    state: web::Data<HttpState>,
    session: SessionContext,
    query: web::Query<OAuthCallbackQuery>,
) -> ApiResult<web::Json<UserResponse>> {
    let OAuthCallbackQuery {
        code,
        state: returned_state,
        error,
    } = query.into_inner();
    let expected = session.take_oauth_state();
    if expected.is_none() || expected != returned_state {
        warn!("OAuth callback state mismatch");
        return Err(Error::unauthorized("Invalid OAuth state"));
    }
    if let Some(reason) = error {
        return Err(Error::unauthorized(format!("Sign-in was cancelled: {reason}")));
    }
    let code = code
        .filter(|code| !code.trim().is_empty())
        .ok_or_else(|| Error::invalid_request("Missing authorisation code"))?;

    let user = state.accounts.complete_oauth(&code).await?;
    start_session(&session, &user)?;
    info!(user_id = %user.id, "oauth sign-in");
    Ok(web::Json(UserResponse::from(&user)))
}

/// Current session user.
#[utoipa::path(
    get,
    path = "/api/auth/session",
    responses(
        (status = 200, description = "Session user", body = UserResponse),
        (status = 401, description = "Not signed in", body = Error)
    ),
    tags = ["auth"],
    operation_id = "currentSession"
)]
#[get("/auth/session")]
pub async fn current_session(
    state: web::Data<HttpState>,
    session: SessionContext,
) -> ApiResult<web::Json<UserResponse>> {
    let user_id = session.require_user_id()?;
    let user = state.accounts_query.session_user(&user_id).await?;
    Ok(web::Json(UserResponse::from(&user)))
}

/// End the session.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses((status = 204, description = "Signed out")),
    tags = ["auth"],
    operation_id = "logout",
    security([])
)]
#[post("/auth/logout")]
pub async fn logout(session: SessionContext) -> HttpResponse {
    session.clear();
    HttpResponse::NoContent().finish()
}

/// Profile of the signed-in user; recreates a baseline record if missing.
#[utoipa::path(
    get,
    path = "/api/auth/profile",
    responses(
        (status = 200, description = "Profile", body = ProfileResponse),
        (status = 401, description = "Not signed in", body = Error)
    ),
    tags = ["auth"],
    operation_id = "getProfile"
)]
#[get("/auth/profile")]
pub async fn get_profile(
    state: web::Data<HttpState>,
    session: SessionContext,
) -> ApiResult<web::Json<ProfileResponse>> {
    let identity = session.require_identity()?;
    let user = state.accounts_query.profile(&identity).await?;
    Ok(web::Json(ProfileResponse::from(&user)))
}

/// Update name or avatar.
#[utoipa::path(
    put,
    path = "/api/auth/profile",
    request_body = ProfileUpdateRequest,
    responses(
        (status = 200, description = "Updated profile", body = ProfileResponse),
        (status = 400, description = "Invalid request", body = Error),
        (status = 401, description = "Not signed in", body = Error)
    ),
    tags = ["auth"],
    operation_id = "updateProfile"
)]
#[put("/auth/profile")]
pub async fn update_profile(
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<ProfileUpdateRequest>,
) -> ApiResult<web::Json<ProfileResponse>> {
    let identity = session.require_identity()?;
    let ProfileUpdateRequest { name, image } = payload.into_inner();
    let user = state
        .accounts
        .update_profile(&identity, ProfileUpdate { name, image })
        .await?;
    Ok(web::Json(ProfileResponse::from(&user)))
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
