//! Full-application wiring over in-memory repositories.
//!
//! Each test builds its own [`Services`] so state never leaks between
//! cases. Network adapters are replaced by the doubles below.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use actix_http::Request;
use actix_web::body::BoxBody;
use actix_web::cookie::{Cookie, Key, SameSite};
use actix_web::dev::{Service, ServiceResponse};
use actix_web::test::{self, TestRequest};
use actix_web::web;
use async_trait::async_trait;
use cervello::domain::ports::{
    AnswerGenerator, AnswerGeneratorError, AnswerRequest, GeneratedAnswer, ReindexAction,
    ReindexNotifier, ReindexNotifierError,
};
use cervello::domain::{SourceCitation, SourceId};
use cervello::inbound::http::health::HealthState;
use cervello::inbound::http::session_config::SessionSettings;
use cervello::server::{AppDependencies, ServiceSettings, Services, build_app, build_in_memory_services};
use serde_json::{Value, json};

/// Answer service double; flips to failing on demand.
#[derive(Default)]
pub struct ScriptedAnswers {
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl ScriptedAnswers {
    pub fn fail_from_now_on(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnswerGenerator for ScriptedAnswers {
    async fn generate(
        &self,
        request: &AnswerRequest,
    ) -> Result<GeneratedAnswer, AnswerGeneratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(AnswerGeneratorError::timeout());
        }
        Ok(GeneratedAnswer {
            answer: format!("Pathway answers: {}", request.question),
            sources: vec![SourceCitation {
                title: "Pathway docs".to_owned(),
                url: Some("https://pathway.com/developers".to_owned()),
                snippet: Some("Pathway is a data processing framework.".to_owned()),
                relevance_score: Some(0.92),
            }],
            context: None,
        })
    }
}

/// Reindex double that always fails and counts attempts.
#[derive(Default)]
pub struct FailingReindex {
    calls: AtomicUsize,
}

impl FailingReindex {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReindexNotifier for FailingReindex {
    async fn notify(
        &self,
        _source_id: &SourceId,
        _action: ReindexAction,
    ) -> Result<(), ReindexNotifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ReindexNotifierError::status(503_u16))
    }
}

/// Doubles shared between a test and the services it drives.
pub struct Harness {
    pub services: Services,
    pub answers: Arc<ScriptedAnswers>,
    pub reindex: Arc<FailingReindex>,
}

/// In-memory services with the lowest bcrypt cost to keep tests quick.
pub fn harness_with(customise: impl FnOnce(&mut ServiceSettings)) -> Harness {
    let answers = Arc::new(ScriptedAnswers::default());
    let reindex = Arc::new(FailingReindex::default());
    let mut settings = ServiceSettings {
        answers: answers.clone(),
        reindex: reindex.clone(),
        bcrypt_cost: 4,
        ..ServiceSettings::default()
    };
    customise(&mut settings);
    Harness {
        services: build_in_memory_services(&settings),
        answers,
        reindex,
    }
}

pub fn harness() -> Harness {
    harness_with(|_| {})
}

/// Session settings for plain-HTTP tests.
pub fn session_settings() -> SessionSettings {
    SessionSettings {
        key: Key::generate(),
        cookie_secure: false,
        same_site: SameSite::Lax,
    }
}

pub async fn init_app(
    services: &Services,
) -> impl Service<Request, Response = ServiceResponse<BoxBody>, Error = actix_web::Error> {
    let health = web::Data::new(HealthState::new());
    health.mark_ready();
    test::init_service(build_app(AppDependencies::new(
        health,
        services,
        session_settings(),
    )))
    .await
}

pub fn session_cookie(response: &ServiceResponse<BoxBody>) -> Cookie<'static> {
    response
        .response()
        .cookies()
        .find(|cookie| cookie.name() == "session")
        .map(Cookie::into_owned)
        .expect("session cookie set")
}

/// Register an account and sign in, returning the session cookie.
pub async fn sign_up<S>(app: &S, name: &str, email: &str) -> Cookie<'static>
where
    S: Service<Request, Response = ServiceResponse<BoxBody>, Error = actix_web::Error>,
{
    let registered = test::call_service(
        app,
        TestRequest::post()
            .uri("/api/auth/register")
            .set_json(json!({"name": name, "email": email, "password": "correct horse"}))
            .to_request(),
    )
    .await;
    assert!(registered.status().is_success(), "register {email}");

    let login = test::call_service(
        app,
        TestRequest::post()
            .uri("/api/auth/login")
            .set_json(json!({"email": email, "password": "correct horse"}))
            .to_request(),
    )
    .await;
    assert!(login.status().is_success(), "login {email}");
    session_cookie(&login)
}

/// Call `request` and decode the JSON body alongside the status.
pub async fn call_json<S>(app: &S, request: Request) -> (u16, Value)
where
    S: Service<Request, Response = ServiceResponse<BoxBody>, Error = actix_web::Error>,
{
    let response = test::call_service(app, request).await;
    let status = response.status().as_u16();
    let bytes = test::read_body(response).await;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("JSON body")
    };
    (status, body)
}
