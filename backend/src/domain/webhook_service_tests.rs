//! Tests for the webhook service.

use std::collections::BTreeMap;
use std::sync::Arc;

use rstest::rstest;
use serde_json::{Value, json};

use super::*;
use crate::domain::ports::{
    MockQueryRepository, MockReindexNotifier, MockSourceRepository, ReindexNotifierError,
};
use crate::domain::{ErrorCode, NewSource, SourceStatus, UserId};
use crate::test_support::{MutableClock, RecordingPublisher, fixture_timestamp};

const SECRET: &str = "shared-secret";

struct Harness {
    sources: MockSourceRepository,
    queries: MockQueryRepository,
    reindex: MockReindexNotifier,
    publisher: Arc<RecordingPublisher>,
    security: WebhookSecurity,
}

impl Harness {
    fn new() -> Self {
        Self {
            sources: MockSourceRepository::new(),
            queries: MockQueryRepository::new(),
            reindex: MockReindexNotifier::new(),
            publisher: Arc::new(RecordingPublisher::default()),
            security: WebhookSecurity::new(Some(SECRET.to_owned()), true),
        }
    }

    fn build(self) -> (WebhookService, Arc<RecordingPublisher>) {
        let ports = WebhookServicePorts {
            sources: Arc::new(self.sources),
            queries: Arc::new(self.queries),
            reindex: Arc::new(self.reindex),
            notifications: self.publisher.clone(),
        };
        let clock = Arc::new(MutableClock::new(fixture_timestamp()));
        (
            WebhookService::new(ports, self.security, clock),
            self.publisher,
        )
    }
}

fn delivery(kind: &str, payload: Value) -> WebhookDelivery {
    WebhookDelivery {
        signature: Some(SECRET.to_owned()),
        kind: kind.to_owned(),
        payload,
    }
}

fn stored_source() -> Source {
    Source::create(
        NewSource {
            title: "Handbook".to_owned(),
            description: None,
            kind: None,
            url: None,
            content: Some("v1".to_owned()),
            metadata: BTreeMap::new(),
            user_id: UserId::random(),
            is_public: false,
            tags: Vec::new(),
        },
        fixture_timestamp(),
    )
}

#[rstest]
#[case(None)]
#[case(Some("wrong"))]
#[tokio::test]
async fn bad_signatures_are_unauthorised(#[case] signature: Option<&str>) {
    let mut harness = Harness::new();
    harness.sources.expect_insert().never();
    let (service, _) = harness.build();

    let mut request = delivery("source.deleted", json!({}));
    request.signature = signature.map(str::to_owned);
    let err = service.handle(request).await.expect_err("bad signature");

    assert_eq!(err.code(), ErrorCode::Unauthorized);
}

#[tokio::test]
async fn enforcement_without_secret_rejects_everything() {
    let mut harness = Harness::new();
    harness.security = WebhookSecurity::new(None, true);
    let (service, _) = harness.build();

    let err = service
        .handle(delivery("source.deleted", json!({})))
        .await
        .expect_err("no secret configured");

    assert_eq!(err.code(), ErrorCode::Unauthorized);
}

#[tokio::test]
async fn unenforced_signatures_are_not_checked() {
    let mut harness = Harness::new();
    harness.security = WebhookSecurity::new(None, false);
    let (service, _) = harness.build();

    let mut request = delivery("source.unknown", json!({}));
    request.signature = None;
    let err = service.handle(request).await.expect_err("unsupported");

    assert_eq!(err.code(), ErrorCode::InvalidRequest);
    assert_eq!(err.message(), "Unsupported webhook type");
}

#[tokio::test]
async fn source_created_is_stored_indexed_and_announced() {
    let mut harness = Harness::new();
    harness
        .sources
        .expect_insert()
        .withf(|source| source.title == "Pathway guide" && source.status == SourceStatus::Pending)
        .times(1)
        .return_once(|_| Ok(()));
    harness
        .reindex
        .expect_notify()
        .withf(|_, action| *action == ReindexAction::Create)
        .times(1)
        .return_once(|_, _| Ok(()));
    let (service, publisher) = harness.build();

    service
        .handle(delivery(
            "source.created",
            json!({"title": "Pathway guide", "userId": "3fa85f64-5717-4562-b3fc-2c963f66afa6"}),
        ))
        .await
        .expect("processed");

    let notes = publisher.take();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].kind, NotificationKind::Update);
    assert_eq!(notes[0].topic.as_deref(), Some(SOURCES_TOPIC));
    assert_eq!(notes[0].data["event"], "source.created");
}

#[tokio::test]
async fn system_alerts_are_broadcast_to_every_session() {
    let mut harness = Harness::new();
    harness.sources.expect_insert().never();
    harness.reindex.expect_notify().never();
    let (service, publisher) = harness.build();

    service
        .handle(delivery(
            "system.alert",
            json!({"message": " Maintenance at 22:00 ", "priority": "high"}),
        ))
        .await
        .expect("processed");

    let notes = publisher.take();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].kind, NotificationKind::SystemAlert);
    assert_eq!(notes[0].topic, None);
    assert_eq!(
        notes[0].data,
        json!({"message": "Maintenance at 22:00", "priority": "high"})
    );
    assert!(notes[0].is_visible_to(None, &std::collections::BTreeSet::new()));
}

#[tokio::test]
async fn reindex_failure_does_not_fail_the_webhook() {
    let source = stored_source();
    let id = source.id;
    let mut harness = Harness::new();
    harness
        .sources
        .expect_find_by_id()
        .return_once(move |_| Ok(Some(source)));
    harness
        .sources
        .expect_update()
        .withf(|source| source.status == SourceStatus::Outdated && source.content == "v2")
        .times(1)
        .return_once(|_| Ok(()));
    harness
        .reindex
        .expect_notify()
        .return_once(|_, _| Err(ReindexNotifierError::status(503_u16)));
    let (service, _) = harness.build();

    service
        .handle(delivery(
            "source.updated",
            json!({"sourceId": id.to_string(), "content": "v2"}),
        ))
        .await
        .expect("reindex failure is swallowed");
}

#[tokio::test]
async fn source_deleted_notifies_indexer() {
    let id = SourceId::random();
    let mut harness = Harness::new();
    harness
        .sources
        .expect_delete()
        .return_once(|_| Ok(true));
    harness
        .reindex
        .expect_notify()
        .withf(move |source_id, action| *source_id == id && *action == ReindexAction::Delete)
        .times(1)
        .return_once(|_, _| Ok(()));
    let (service, _) = harness.build();

    service
        .handle(delivery("source.deleted", json!({"sourceId": id.to_string()})))
        .await
        .expect("processed");
}

#[tokio::test]
async fn repository_outage_surfaces_as_service_unavailable() {
    let mut harness = Harness::new();
    harness
        .sources
        .expect_delete()
        .return_once(|_| Err(SourceRepositoryError::connection("down")));
    harness.reindex.expect_notify().never();
    let (service, _) = harness.build();

    let err = service
        .handle(delivery(
            "source.deleted",
            json!({"sourceId": "3fa85f64-5717-4562-b3fc-2c963f66afa6"}),
        ))
        .await
        .expect_err("outage");

    assert_eq!(err.code(), ErrorCode::ServiceUnavailable);
}
