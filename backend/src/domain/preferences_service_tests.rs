//! Tests for the preferences service.

use std::sync::Arc;

use rstest::rstest;

use super::*;
use crate::domain::ports::{MockPreferencesRepository, MockUserRepository};
use crate::domain::{EmailAddress, ErrorCode, Theme};
use crate::test_support::{MutableClock, fixture_timestamp};

fn make_service(
    users: MockUserRepository,
    preferences: MockPreferencesRepository,
) -> PreferencesService {
    PreferencesService::new(
        Arc::new(users),
        Arc::new(preferences),
        Arc::new(MutableClock::new(fixture_timestamp())),
    )
}

fn user(id: UserId) -> User {
    let email = EmailAddress::new("ada@example.com").expect("email");
    User::new(id, "Ada", email, fixture_timestamp()).expect("user")
}

#[tokio::test]
async fn read_returns_defaults_when_nothing_is_stored() {
    let id = UserId::random();
    let mut users = MockUserRepository::new();
    users
        .expect_find_by_id()
        .return_once(move |_| Ok(Some(user(id))));
    let mut preferences = MockPreferencesRepository::new();
    preferences.expect_find().return_once(|_| Ok(None));

    let service = make_service(users, preferences);
    let prefs = service.preferences(&id).await.expect("defaults");

    assert_eq!(prefs, UserPreferences::defaults(id, fixture_timestamp()));
}

#[tokio::test]
async fn read_for_unknown_user_is_not_found() {
    let mut users = MockUserRepository::new();
    users.expect_find_by_id().return_once(|_| Ok(None));
    let mut preferences = MockPreferencesRepository::new();
    preferences.expect_find().never();

    let service = make_service(users, preferences);
    let err = service
        .preferences(&UserId::random())
        .await
        .expect_err("missing user");

    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[tokio::test]
async fn update_merges_patch_over_stored_record() {
    let id = UserId::random();
    let mut stored = UserPreferences::defaults(id, fixture_timestamp());
    stored.code_snippets = true;
    let mut preferences = MockPreferencesRepository::new();
    preferences
        .expect_find()
        .return_once(move |_| Ok(Some(stored)));
    preferences
        .expect_upsert()
        .withf(|prefs| prefs.theme == Theme::Dark && prefs.code_snippets && !prefs.show_sources)
        .times(1)
        .return_once(|_| Ok(()));

    let service = make_service(MockUserRepository::new(), preferences);
    let patch = PreferencesPatch {
        theme: Some(Theme::Dark),
        show_sources: Some(false),
        ..PreferencesPatch::default()
    };
    let updated = service
        .update_preferences(&id, patch)
        .await
        .expect("update");

    assert_eq!(updated.theme, Theme::Dark);
}

#[rstest]
#[case(Persona::Business)]
#[case(Persona::Researcher)]
#[tokio::test]
async fn onboarding_rejects_non_onboarding_personas(#[case] persona: Persona) {
    let mut users = MockUserRepository::new();
    users.expect_find_by_id().never();
    let service = make_service(users, MockPreferencesRepository::new());

    let err = service
        .complete_onboarding(&UserId::random(), persona)
        .await
        .expect_err("invalid role");

    assert_eq!(err.code(), ErrorCode::InvalidRequest);
}

#[rstest]
#[case(Persona::Developer, true, false)]
#[case(Persona::Teacher, false, true)]
#[tokio::test]
async fn onboarding_sets_persona_and_defaults(
    #[case] persona: Persona,
    #[case] technical: bool,
    #[case] simplified: bool,
) {
    let id = UserId::random();
    let mut users = MockUserRepository::new();
    users
        .expect_find_by_id()
        .return_once(move |_| Ok(Some(user(id))));
    users
        .expect_update()
        .withf(move |user| user.persona == Some(persona))
        .times(1)
        .return_once(|_| Ok(()));
    let mut preferences = MockPreferencesRepository::new();
    preferences.expect_upsert().times(1).return_once(|_| Ok(()));

    let service = make_service(users, preferences);
    let prefs = service
        .complete_onboarding(&id, persona)
        .await
        .expect("onboarding");

    assert_eq!(prefs.technical_terms, technical);
    assert_eq!(prefs.simplified_explanations, simplified);
    assert!(prefs.notifications);
}

#[tokio::test]
async fn preferences_outage_is_service_unavailable() {
    let mut preferences = MockPreferencesRepository::new();
    preferences
        .expect_find()
        .return_once(|_| Err(PreferencesRepositoryError::connection("refused")));

    let service = make_service(MockUserRepository::new(), preferences);
    let err = service
        .update_preferences(&UserId::random(), PreferencesPatch::default())
        .await
        .expect_err("outage");

    assert_eq!(err.code(), ErrorCode::ServiceUnavailable);
}
