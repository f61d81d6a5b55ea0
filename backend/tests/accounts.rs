//! Registration, sessions, profile and preference flows.

#[path = "support/app.rs"]
mod app_support;

use actix_web::test::{self, TestRequest};
use app_support::{call_json, harness, init_app, sign_up};
use rstest::rstest;
use serde_json::{Value, json};

#[rstest]
#[case(json!({"email": "ada@example.org", "password": "pw"}))]
#[case(json!({"name": "Ada", "password": "pw"}))]
#[case(json!({"name": "Ada", "email": "ada@example.org"}))]
#[actix_web::test]
async fn registration_requires_every_field(#[case] payload: Value) {
    let harness = harness();
    let app = init_app(&harness.services).await;

    let (status, body) = call_json(
        &app,
        TestRequest::post()
            .uri("/api/auth/register")
            .set_json(payload)
            .to_request(),
    )
    .await;

    assert_eq!(status, 400);
    assert_eq!(body["message"], "Missing required fields");
}

#[rstest]
#[actix_web::test]
async fn duplicate_emails_conflict() {
    let harness = harness();
    let app = init_app(&harness.services).await;
    sign_up(&app, "Ada", "ada@example.org").await;

    let (status, body) = call_json(
        &app,
        TestRequest::post()
            .uri("/api/auth/register")
            .set_json(json!({"name": "Ada", "email": "ada@example.org", "password": "pw"}))
            .to_request(),
    )
    .await;

    assert_eq!(status, 409);
    assert_eq!(body["code"], "conflict");
}

#[rstest]
#[actix_web::test]
async fn wrong_passwords_are_unauthorised() {
    let harness = harness();
    let app = init_app(&harness.services).await;
    sign_up(&app, "Ada", "ada@example.org").await;

    let (status, _) = call_json(
        &app,
        TestRequest::post()
            .uri("/api/auth/login")
            .set_json(json!({"email": "ada@example.org", "password": "nope"}))
            .to_request(),
    )
    .await;

    assert_eq!(status, 401);
}

#[rstest]
#[actix_web::test]
async fn session_reflects_sign_in_and_logout() {
    let harness = harness();
    let app = init_app(&harness.services).await;

    let (status, _) = call_json(&app, TestRequest::get().uri("/api/auth/session").to_request()).await;
    assert_eq!(status, 401);

    let cookie = sign_up(&app, "Ada", "ada@example.org").await;
    let (status, user) = call_json(
        &app,
        TestRequest::get()
            .uri("/api/auth/session")
            .cookie(cookie.clone())
            .to_request(),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(user["email"], "ada@example.org");
    assert_eq!(user["role"], "user");
    assert_eq!(user["onboarded"], false);

    let logout = test::call_service(
        &app,
        TestRequest::post()
            .uri("/api/auth/logout")
            .cookie(cookie)
            .to_request(),
    )
    .await;
    assert_eq!(logout.status().as_u16(), 204);
    let cleared = logout
        .response()
        .cookies()
        .find(|cookie| cookie.name() == "session")
        .expect("removal cookie");
    assert_eq!(cleared.value(), "");
}

#[rstest]
#[actix_web::test]
async fn google_sign_in_is_unavailable_without_configuration() {
    let harness = harness();
    let app = init_app(&harness.services).await;

    let (status, _) = call_json(
        &app,
        TestRequest::get().uri("/api/auth/oauth/google").to_request(),
    )
    .await;

    assert_eq!(status, 503);
}

#[rstest]
#[actix_web::test]
async fn oauth_callback_without_state_is_rejected() {
    let harness = harness();
    let app = init_app(&harness.services).await;

    let (status, body) = call_json(
        &app,
        TestRequest::get()
            .uri("/api/auth/oauth/google/callback?code=abc&state=forged")
            .to_request(),
    )
    .await;

    assert_eq!(status, 401);
    assert_eq!(body["message"], "Invalid OAuth state");
}

#[rstest]
#[actix_web::test]
async fn profile_updates_are_returned() {
    let harness = harness();
    let app = init_app(&harness.services).await;
    let cookie = sign_up(&app, "Ada", "ada@example.org").await;

    let (status, profile) = call_json(
        &app,
        TestRequest::put()
            .uri("/api/auth/profile")
            .cookie(cookie)
            .set_json(json!({"name": "Ada Lovelace"}))
            .to_request(),
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(profile["name"], "Ada Lovelace");
    assert_eq!(profile["loginCount"], 1);
}

#[rstest]
#[actix_web::test]
async fn preferences_default_then_merge_partial_updates() {
    let harness = harness();
    let app = init_app(&harness.services).await;
    let cookie = sign_up(&app, "Ada", "ada@example.org").await;

    let (status, defaults) = call_json(
        &app,
        TestRequest::get()
            .uri("/api/auth/preferences")
            .cookie(cookie.clone())
            .to_request(),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(defaults["theme"], "system");
    assert_eq!(defaults["showSources"], true);

    let (status, updated) = call_json(
        &app,
        TestRequest::put()
            .uri("/api/auth/preferences")
            .cookie(cookie)
            .set_json(json!({"theme": "dark"}))
            .to_request(),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(updated["theme"], "dark");
    assert_eq!(updated["showSources"], true);
}

#[rstest]
#[case("developer", 200)]
#[case("teacher", 200)]
#[case("business", 400)]
#[case("wizard", 400)]
#[actix_web::test]
async fn onboarding_accepts_developer_or_teacher(#[case] role: &str, #[case] expected: u16) {
    let harness = harness();
    let app = init_app(&harness.services).await;
    let cookie = sign_up(&app, "Ada", "ada@example.org").await;

    let (status, body) = call_json(
        &app,
        TestRequest::post()
            .uri("/api/auth/onboarding")
            .cookie(cookie.clone())
            .set_json(json!({"role": role}))
            .to_request(),
    )
    .await;
    assert_eq!(status, expected);
    if expected != 200 {
        return;
    }
    assert_eq!(body["success"], true);

    let (_, user) = call_json(
        &app,
        TestRequest::get()
            .uri("/api/auth/session")
            .cookie(cookie)
            .to_request(),
    )
    .await;
    assert_eq!(user["persona"], role);
    assert_eq!(user["onboarded"], true);
}

#[rstest]
#[actix_web::test]
async fn malformed_json_gets_an_error_body() {
    let harness = harness();
    let app = init_app(&harness.services).await;

    let (status, body) = call_json(
        &app,
        TestRequest::post()
            .uri("/api/auth/register")
            .insert_header(("content-type", "application/json"))
            .set_payload("{not json")
            .to_request(),
    )
    .await;

    assert_eq!(status, 400);
    assert_eq!(body["code"], "invalid_request");
    assert_eq!(body["message"], "Invalid JSON payload");
}

#[rstest]
#[actix_web::test]
async fn probes_report_readiness() {
    let harness = harness();
    let app = init_app(&harness.services).await;

    for uri in ["/health/ready", "/health/live"] {
        let (status, body) = call_json(&app, TestRequest::get().uri(uri).to_request()).await;
        assert_eq!(status, 200, "{uri}");
        assert_eq!(body["status"], "ok");
    }
}
