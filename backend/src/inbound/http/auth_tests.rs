//! Handler tests for the account endpoints.

use actix_web::http::StatusCode;
use actix_web::test::{self};
use rstest::rstest;
use serde_json::{Value, json};

use super::*;
use crate::domain::{EmailAddress, ErrorCode};
use crate::inbound::http::test_utils::{MockPorts, ada, session_cookie, signed_in_app};
use crate::test_support::fixture_timestamp;

fn user_for(identity: &SessionIdentity) -> User {
    User::new(
        identity.user_id,
        identity.name.clone(),
        identity.email.clone(),
        fixture_timestamp(),
    )
    .expect("fixture user")
}

async fn body(response: actix_web::dev::ServiceResponse) -> Value {
    test::read_body_json(response).await
}

#[rstest]
#[case(json!({"email": "ada@example.org", "password": "pw"}))]
#[case(json!({"name": "Ada", "password": "pw"}))]
#[case(json!({"name": "Ada", "email": "ada@example.org"}))]
#[actix_web::test]
async fn register_rejects_missing_fields(#[case] payload: Value) {
    let (app, _) = signed_in_app!(MockPorts::default().into_state(), register);
    let request = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(payload)
        .to_request();
    let response = test::call_service(&app, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body(response).await["message"], "Missing required fields");
}

#[rstest]
#[actix_web::test]
async fn register_returns_public_user_fields() {
    let mut ports = MockPorts::default();
    ports
        .accounts
        .expect_register()
        .withf(|registration| registration.name() == "Ada")
        .times(1)
        .returning(|_| Ok(user_for(&ada())));
    let (app, _) = signed_in_app!(ports.into_state(), register);

    let request = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({"name": " Ada ", "email": "ada@example.org", "password": "pw"}))
        .to_request();
    let response = test::call_service(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let value = body(response).await;
    assert_eq!(value["success"], true);
    assert_eq!(value["user"]["email"], "ada@example.org");
    assert_eq!(value["user"]["role"], "user");
    assert!(value["user"].get("passwordHash").is_none());
}

#[rstest]
#[actix_web::test]
async fn register_surfaces_conflict() {
    let mut ports = MockPorts::default();
    ports
        .accounts
        .expect_register()
        .returning(|_| Err(Error::conflict("Email is already in use")));
    let (app, _) = signed_in_app!(ports.into_state(), register);

    let request = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({"name": "Ada", "email": "ada@example.org", "password": "pw"}))
        .to_request();
    let response = test::call_service(&app, request).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[rstest]
#[actix_web::test]
async fn login_starts_a_session() {
    let mut ports = MockPorts::default();
    ports
        .accounts
        .expect_login()
        .withf(|credentials| credentials.email().as_str() == "ada@example.org")
        .returning(|_| Ok(user_for(&ada())));
    let identity = ada();
    ports
        .accounts_query
        .expect_session_user()
        .withf(move |id| *id == identity.user_id)
        .returning(|_| Ok(user_for(&ada())));
    let (app, _) = signed_in_app!(ports.into_state(), login, current_session);

    let request = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({"email": "ADA@example.org", "password": "pw"}))
        .to_request();
    let response = test::call_service(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = session_cookie(&response);

    let request = test::TestRequest::get()
        .uri("/api/auth/session")
        .cookie(cookie)
        .to_request();
    let response = test::call_service(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let value = body(response).await;
    assert_eq!(value["name"], "Ada Lovelace");
    assert_eq!(value["onboarded"], false);
}

#[rstest]
#[actix_web::test]
async fn session_requires_sign_in() {
    let (app, _) = signed_in_app!(MockPorts::default().into_state(), current_session);
    let request = test::TestRequest::get().uri("/api/auth/session").to_request();
    let response = test::call_service(&app, request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body(response).await["code"], "unauthorized");
}

#[rstest]
#[actix_web::test]
async fn logout_clears_the_session() {
    let (app, cookie) = signed_in_app!(MockPorts::default().into_state(), logout, get_profile);

    let request = test::TestRequest::post()
        .uri("/api/auth/logout")
        .cookie(cookie)
        .to_request();
    let response = test::call_service(&app, request).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let cleared = session_cookie(&response);

    let request = test::TestRequest::get()
        .uri("/api/auth/profile")
        .cookie(cleared)
        .to_request();
    let response = test::call_service(&app, request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[rstest]
#[actix_web::test]
async fn oauth_callback_requires_matching_state() {
    let mut ports = MockPorts::default();
    ports
        .accounts
        .expect_oauth_authorization_url()
        .returning(|state| Ok(format!("https://accounts.example/auth?state={state}")));
    ports
        .accounts
        .expect_complete_oauth()
        .withf(|code| code == "good-code")
        .never();
    let (app, _) = signed_in_app!(
        ports.into_state(),
        google_authorization_url,
        google_callback
    );

    let request = test::TestRequest::get()
        .uri("/api/auth/oauth/google")
        .to_request();
    let response = test::call_service(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = session_cookie(&response);
    let url = body(response).await["url"]
        .as_str()
        .expect("url")
        .to_owned();
    let state = url.rsplit('=').next().expect("state").to_owned();

    let request = test::TestRequest::get()
        .uri("/api/auth/oauth/google/callback?code=good-code&state=forged")
        .cookie(cookie)
        .to_request();
    let response = test::call_service(&app, request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let consumed = session_cookie(&response);

    // The state is single use, so the genuine value no longer matches either.
    let request = test::TestRequest::get()
        .uri(&format!("/api/auth/oauth/google/callback?code=good-code&state={state}"))
        .cookie(consumed)
        .to_request();
    let response = test::call_service(&app, request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[rstest]
#[actix_web::test]
async fn oauth_callback_signs_in_with_valid_state() {
    let mut ports = MockPorts::default();
    ports
        .accounts
        .expect_oauth_authorization_url()
        .returning(|state| Ok(format!("https://accounts.example/auth?state={state}")));
    ports
        .accounts
        .expect_complete_oauth()
        .times(1)
        .returning(|_| Ok(user_for(&ada())));
    let (app, _) = signed_in_app!(
        ports.into_state(),
        google_authorization_url,
        google_callback
    );

    let response = test::call_service(
        &app,
        test::TestRequest::get().uri("/api/auth/oauth/google").to_request(),
    )
    .await;
    let cookie = session_cookie(&response);
    let url = body(response).await["url"].as_str().expect("url").to_owned();
    let state = url.rsplit('=').next().expect("state").to_owned();

    let request = test::TestRequest::get()
        .uri(&format!("/api/auth/oauth/google/callback?code=c&state={state}"))
        .cookie(cookie)
        .to_request();
    let response = test::call_service(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(response).await["email"], "ada@example.org");
}

#[rstest]
#[actix_web::test]
async fn profile_update_passes_fields_through() {
    let mut ports = MockPorts::default();
    ports
        .accounts
        .expect_update_profile()
        .withf(|identity, update| {
            identity.user_id == ada().user_id
                && update.name.as_deref() == Some("Countess")
                && update.image.is_none()
        })
        .returning(|identity, _| {
            let mut user = user_for(identity);
            user.name = "Countess".to_owned();
            Ok(user)
        });
    let (app, cookie) = signed_in_app!(ports.into_state(), update_profile);

    let request = test::TestRequest::put()
        .uri("/api/auth/profile")
        .cookie(cookie)
        .set_json(json!({"name": "Countess"}))
        .to_request();
    let response = test::call_service(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let value = body(response).await;
    assert_eq!(value["name"], "Countess");
    assert_eq!(value["loginCount"], 0);
    assert_eq!(value["createdAt"], fixture_timestamp().to_rfc3339());
}

#[rstest]
fn registration_email_errors_name_the_field() {
    let err = map_registration_error(CredentialsValidationError::Email(
        EmailAddress::new("nope").expect_err("invalid email"),
    ));
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
    assert_eq!(err.details().expect("details")["field"], "email");
}
