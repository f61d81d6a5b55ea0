//! Test helpers for inbound HTTP components.

use std::sync::Arc;

use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::cookie::{Cookie, Key};
use actix_web::dev::ServiceResponse;
use actix_web::{HttpResponse, post, web};

use crate::domain::ports::{
    MockAccountCommand, MockAccountQuery, MockPreferencesCommand, MockPreferencesQuery,
    MockQaCommand, MockQaQuery, MockWebhookCommand,
};
use crate::domain::{EmailAddress, SessionIdentity, UserId};
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;

/// Session middleware with a fresh key and the `Secure` flag disabled for
/// plain-HTTP tests.
pub fn test_session_middleware() -> SessionMiddleware<CookieSessionStore> {
    SessionMiddleware::builder(CookieSessionStore::default(), Key::generate())
        .cookie_name("session".to_owned())
        .cookie_secure(false)
        .build()
}

/// Extract the `session` cookie set on a response.
pub fn session_cookie<B>(response: &ServiceResponse<B>) -> Cookie<'static> {
    response
        .response()
        .cookies()
        .find(|cookie| cookie.name() == "session")
        .map(Cookie::into_owned)
        .expect("session cookie set")
}

/// Identity used by handler tests.
pub fn ada() -> SessionIdentity {
    SessionIdentity {
        user_id: UserId::new("3fa85f64-5717-4562-b3fc-2c963f66afa6").expect("fixture id"),
        name: "Ada Lovelace".to_owned(),
        email: EmailAddress::new("ada@example.org").expect("fixture email"),
    }
}

/// Test-only route persisting the posted identity, standing in for a real
/// sign-in.
#[post("/__test/sign-in")]
pub async fn sign_in_as(
    session: SessionContext,
    identity: web::Json<SessionIdentity>,
) -> actix_web::Result<HttpResponse> {
    session.persist_identity(&identity)?;
    Ok(HttpResponse::NoContent().finish())
}

/// One mock per driving port; unset expectations panic when called.
#[derive(Default)]
pub struct MockPorts {
    pub accounts: MockAccountCommand,
    pub accounts_query: MockAccountQuery,
    pub preferences: MockPreferencesCommand,
    pub preferences_query: MockPreferencesQuery,
    pub qa: MockQaCommand,
    pub qa_query: MockQaQuery,
    pub webhooks: MockWebhookCommand,
}

impl MockPorts {
    pub fn into_state(self) -> web::Data<HttpState> {
        web::Data::new(HttpState {
            accounts: Arc::new(self.accounts),
            accounts_query: Arc::new(self.accounts_query),
            preferences: Arc::new(self.preferences),
            preferences_query: Arc::new(self.preferences_query),
            qa: Arc::new(self.qa),
            qa_query: Arc::new(self.qa_query),
            webhooks: Arc::new(self.webhooks),
        })
    }
}

/// Build an app wrapping `$service` with mocked state and a test session,
/// then return it together with a cookie for [`ada`].
macro_rules! signed_in_app {
    ($state:expr, $($service:expr),+ $(,)?) => {{
        let app = actix_web::test::init_service(
            actix_web::App::new()
                .wrap($crate::inbound::http::test_utils::test_session_middleware())
                .app_data($state)
                .service($crate::inbound::http::test_utils::sign_in_as)
                .service(actix_web::web::scope("/api")$(.service($service))+),
        )
        .await;
        let response = actix_web::test::call_service(
            &app,
            actix_web::test::TestRequest::post()
                .uri("/__test/sign-in")
                .set_json($crate::inbound::http::test_utils::ada())
                .to_request(),
        )
        .await;
        let cookie = $crate::inbound::http::test_utils::session_cookie(&response);
        (app, cookie)
    }};
}
pub(crate) use signed_in_app;
