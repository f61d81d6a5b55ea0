//! Provider behaviour against a scripted backend.

use std::time::Duration;

use mockall::predicate::eq;
use rstest::rstest;
use serde_json::{Value, json};
use url::Url;

use super::*;
use crate::api::Theme;
use crate::notifier::MockNotifier;
use crate::test_support::{StubTransport, json_response, text_response};
use crate::transport::{HttpRequest, HttpResponse, Method};

fn session_body(onboarded: bool) -> Value {
    json!({
        "id": "3fa85f64-5717-4562-b3fc-2c963f66afa6",
        "name": "Ada",
        "email": "ada@example.org",
        "image": null,
        "role": "user",
        "persona": if onboarded { json!("developer") } else { Value::Null },
        "onboarded": onboarded
    })
}

fn profile_body() -> Value {
    let mut body = session_body(true);
    if let Some(fields) = body.as_object_mut() {
        fields.insert("loginCount".to_owned(), json!(3));
        fields.insert("queryCount".to_owned(), json!(12));
    }
    body
}

/// Backend that is signed in and answers preference writes with `write`.
fn backend(
    write: impl Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static,
) -> Arc<StubTransport> {
    StubTransport::new(move |_, request| match (request.method, request.url.path()) {
        (Method::Get, "/api/auth/session") => json_response(200, &session_body(true)),
        (Method::Get, "/api/auth/profile") => json_response(200, &profile_body()),
        (Method::Get, "/api/auth/preferences") => {
            json_response(200, &json!({"theme": "dark", "codeSnippets": true}))
        }
        (Method::Post, "/api/auth/logout") => text_response(204, ""),
        _ => write(request),
    })
}

fn api(transport: Arc<StubTransport>) -> ApiClient {
    ApiClient::new(
        Url::parse("http://localhost:8080/api").expect("valid url"),
        transport,
        Duration::from_secs(30),
    )
}

fn quiet_notifier() -> Arc<MockNotifier> {
    let mut notifier = MockNotifier::new();
    notifier.expect_success().return_const(());
    notifier.expect_error().return_const(());
    Arc::new(notifier)
}

#[rstest]
#[tokio::test]
async fn loading_reads_the_session_and_profile() {
    let auth = AuthProvider::new(api(backend(|_| text_response(404, ""))), quiet_notifier());

    auth.load().await.expect("session loads");

    let state = auth.state();
    assert!(state.is_authenticated());
    assert!(!state.needs_onboarding());
    assert_eq!(state.profile.map(|profile| profile.login_count), Some(3));
    assert!(!state.loading);
}

#[rstest]
#[tokio::test]
async fn missing_sessions_sign_the_provider_out() {
    let transport = StubTransport::new(|_, _| json_response(401, &json!({"message": "login required"})));
    let auth = AuthProvider::new(api(transport), quiet_notifier());

    auth.load().await.expect("401 is not an error");

    assert!(!auth.is_authenticated());
    assert_eq!(auth.user(), None);
}

#[rstest]
#[tokio::test]
async fn users_without_a_persona_need_onboarding() {
    let transport = StubTransport::new(|_, request| match request.url.path() {
        "/api/auth/session" => json_response(200, &session_body(false)),
        _ => text_response(500, ""),
    });
    let auth = AuthProvider::new(api(transport), quiet_notifier());

    auth.load().await.expect("session loads");

    assert!(auth.needs_onboarding());
    assert_eq!(auth.state().profile, None);
}

#[rstest]
#[tokio::test]
async fn logging_out_clears_the_user_and_says_so() {
    let mut notifier = MockNotifier::new();
    notifier
        .expect_success()
        .with(eq(LOGGED_OUT_NOTICE))
        .times(1)
        .return_const(());
    let auth = AuthProvider::new(api(backend(|_| text_response(404, ""))), Arc::new(notifier));
    auth.load().await.expect("session loads");

    auth.logout().await.expect("logout succeeds");

    assert!(!auth.is_authenticated());
}

#[rstest]
#[tokio::test]
async fn saving_a_role_reloads_the_session() {
    let transport = backend(|_| json_response(200, &json!({"success": true})));
    let auth = AuthProvider::new(api(transport.clone()), quiet_notifier());

    auth.save_role(Persona::Teacher).await.expect("role saved");

    let requests = transport.requests();
    let onboarding = requests.first().expect("onboarding request");
    assert_eq!(onboarding.url.path(), "/api/auth/onboarding");
    assert_eq!(onboarding.body, Some(json!({"role": "teacher"})));
    assert!(auth.is_authenticated());
}

#[rstest]
#[tokio::test]
async fn stored_preferences_are_merged_over_the_defaults() {
    let transport = backend(|_| text_response(404, ""));
    let auth = AuthProvider::new(api(transport.clone()), quiet_notifier());
    let preferences = PreferencesProvider::new(api(transport), &auth, quiet_notifier());

    preferences.load().await.expect("signed out load");
    assert_eq!(preferences.preferences(), Preferences::default());

    auth.load().await.expect("session loads");
    preferences.load().await.expect("preferences load");

    let loaded = preferences.preferences();
    assert_eq!(loaded.theme, Theme::Dark);
    assert!(loaded.code_snippets);
    assert!(loaded.show_sources);
    assert!(loaded.query_saving);
}

#[rstest]
#[tokio::test]
async fn updates_need_a_session() {
    let transport = backend(|_| text_response(404, ""));
    let auth = AuthProvider::new(api(transport.clone()), quiet_notifier());
    let mut notifier = MockNotifier::new();
    notifier
        .expect_error()
        .with(eq(LOGIN_REQUIRED_NOTICE))
        .times(1)
        .return_const(());
    let preferences = PreferencesProvider::new(api(transport.clone()), &auth, Arc::new(notifier));

    let err = preferences
        .update(&PreferencesPatch {
            theme: Some(Theme::Light),
            ..PreferencesPatch::default()
        })
        .await
        .expect_err("signed out");

    assert!(err.is_unauthorised());
    assert_eq!(preferences.preferences(), Preferences::default());
    assert_eq!(transport.calls(), 0);
}

#[rstest]
#[tokio::test]
async fn failed_updates_keep_the_optimistic_change() {
    let transport = backend(|_| json_response(500, &json!({"message": "database unavailable"})));
    let auth = AuthProvider::new(api(transport.clone()), quiet_notifier());
    auth.load().await.expect("session loads");
    let mut notifier = MockNotifier::new();
    notifier
        .expect_error()
        .with(eq(PREFERENCES_FAILED_NOTICE))
        .times(1)
        .return_const(());
    let preferences = PreferencesProvider::new(api(transport), &auth, Arc::new(notifier));

    let err = preferences
        .update(&PreferencesPatch {
            show_sources: Some(false),
            ..PreferencesPatch::default()
        })
        .await
        .expect_err("backend fails");

    assert_eq!(err.message, "database unavailable");
    assert!(!preferences.preferences().show_sources);
}

#[rstest]
#[case(Persona::Developer, json!({"codeSnippets": true, "technicalTerms": true}))]
#[case(Persona::Teacher, json!({"simplifiedExplanations": true, "educationalResources": true}))]
#[case(Persona::Business, json!({"simplifiedExplanations": true}))]
#[case(Persona::Researcher, json!({"technicalTerms": true, "showSources": true}))]
#[tokio::test]
async fn role_defaults_are_persisted(#[case] persona: Persona, #[case] expected: Value) {
    let transport = backend(|request| {
        json_response(200, request.body.as_ref().unwrap_or(&Value::Null))
    });
    let auth = AuthProvider::new(api(transport.clone()), quiet_notifier());
    auth.load().await.expect("session loads");
    let preferences = PreferencesProvider::new(api(transport.clone()), &auth, quiet_notifier());

    preferences
        .apply_role_defaults(persona)
        .await
        .expect("defaults saved");

    let requests = transport.requests();
    let write = requests.last().expect("preferences write");
    assert_eq!(write.method, Method::Put);
    assert_eq!(write.body, Some(expected));

    preferences.reset();
    assert_eq!(preferences.preferences(), Preferences::default());
}
