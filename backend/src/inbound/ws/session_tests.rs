//! WebSocket session handler tests against a real listener.

use super::*;
use crate::domain::ports::{AnsweredQuery, FeedbackInput, NotificationPublisher};
use crate::domain::{
    EmailAddress, Error, NotificationKind, QueryId, QueryRecord, SessionIdentity, query_topic,
};
use crate::inbound::http::session::SessionContext;
use crate::inbound::ws;
use crate::inbound::ws::OriginPolicy;
use crate::inbound::ws::hub::NotificationHub;
use actix_web::cookie::Cookie;
use actix_web::{App, HttpResponse, HttpServer, dev::Server, dev::ServerHandle, http::header, web};
use async_trait::async_trait;
use awc::{BoxedSocket, ws::Codec, ws::Frame, ws::Message as ClientMessage};
use futures_util::{SinkExt, StreamExt};
use rstest::{fixture, rstest};
use serde_json::Value;

type Socket = actix_codec::Framed<BoxedSocket, Codec>;

/// Answers by echoing the question through the hub like the real service.
struct EchoQa {
    hub: NotificationHub,
}

#[async_trait]
impl QaCommand for EchoQa {
    async fn ask(&self, request: AskQuestion) -> Result<AnsweredQuery, Error> {
        if request.question.trim().is_empty() {
            return Err(Error::invalid_request("Question is required"));
        }
        let id = QueryId::random();
        let answer = format!("echo: {}", request.question);
        self.hub.publish(Notification::to_user(
            NotificationKind::AnswerComplete,
            request.user_id,
            Some(query_topic(&id)),
            json!({ "queryId": id.to_string(), "answer": answer }),
        ));
        Ok(AnsweredQuery {
            id,
            question: request.question,
            answer,
            sources: Vec::new(),
            processing_time_ms: 1,
        })
    }

    async fn submit_feedback(
        &self,
        _user_id: &UserId,
        _id: &QueryId,
        _feedback: FeedbackInput,
    ) -> Result<QueryRecord, Error> {
        Err(Error::internal("unused"))
    }

    async fn delete_query(&self, _user_id: &UserId, _id: &QueryId) -> Result<(), Error> {
        Err(Error::internal("unused"))
    }

    async fn clear_history(&self, _user_id: &UserId) -> Result<u64, Error> {
        Err(Error::internal("unused"))
    }
}

#[actix_web::post("/login/{user_id}")]
async fn login(
    session: SessionContext,
    path: web::Path<String>,
) -> actix_web::Result<HttpResponse> {
    let user_id = UserId::new(path.into_inner()).map_err(actix_web::error::ErrorBadRequest)?;
    let identity = SessionIdentity {
        user_id,
        name: "Ada".to_owned(),
        email: EmailAddress::new("ada@example.org").map_err(actix_web::error::ErrorBadRequest)?,
    };
    session
        .persist_identity(&identity)
        .map_err(actix_web::error::ErrorInternalServerError)?;
    Ok(HttpResponse::NoContent().finish())
}

struct TestServer {
    url: String,
    hub: NotificationHub,
    handle: ServerHandle,
}

#[fixture]
async fn server() -> TestServer {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");
    let hub = NotificationHub::default();
    let ws_state = WsState::new(
        Arc::new(EchoQa { hub: hub.clone() }),
        hub.clone(),
        OriginPolicy::default(),
    );
    let server: Server = HttpServer::new(move || {
        App::new()
            .wrap(test_session_middleware_shared())
            .app_data(web::Data::new(ws_state.clone()))
            .service(ws::ws_entry)
            .service(login)
    })
    .listen(listener)
    .expect("bind test server")
    .disable_signals()
    .run();
    let handle = server.handle();
    actix_web::rt::spawn(server);
    TestServer {
        url: format!("http://{addr}"),
        hub,
        handle,
    }
}

/// Every worker must share one signing key or cookies issued by one worker
/// fail to verify on another.
fn test_session_middleware_shared()
-> actix_session::SessionMiddleware<actix_session::storage::CookieSessionStore> {
    static KEY: std::sync::OnceLock<actix_web::cookie::Key> = std::sync::OnceLock::new();
    let key = KEY.get_or_init(actix_web::cookie::Key::generate).clone();
    actix_session::SessionMiddleware::builder(actix_session::storage::CookieSessionStore::default(), key)
        .cookie_name("session".to_owned())
        .cookie_secure(false)
        .build()
}

async fn sign_in(url: &str, user_id: UserId) -> Cookie<'static> {
    let response = awc::Client::default()
        .post(format!("{url}/login/{user_id}"))
        .send()
        .await
        .expect("login request");
    assert!(response.status().is_success());
    response.cookie("session").expect("session cookie set")
}

async fn connect(url: &str, cookie: Option<Cookie<'static>>) -> Socket {
    let mut request = awc::Client::default()
        .ws(format!("{url}/ws"))
        .set_header(header::ORIGIN, "http://localhost:3000");
    if let Some(cookie) = cookie {
        request = request.cookie(cookie);
    }
    let (_resp, socket) = request.connect().await.expect("websocket connect");
    socket
}

async fn send_json(socket: &mut Socket, value: Value) {
    socket
        .send(ClientMessage::Text(value.to_string().into()))
        .await
        .expect("send text");
}

async fn next_json(socket: &mut Socket) -> Value {
    loop {
        let frame = socket.next().await.expect("response frame").expect("frame");
        match frame {
            Frame::Text(bytes) => return serde_json::from_slice(&bytes).expect("json"),
            Frame::Ping(_) | Frame::Pong(_) => continue,
            other => panic!("expected text frame, got {other:?}"),
        }
    }
}

async fn next_close(socket: &mut Socket) -> CloseReason {
    tokio::time::timeout(Duration::from_secs(2), async {
        while let Some(frame) = socket.next().await {
            match frame.expect("frame") {
                Frame::Ping(_) | Frame::Pong(_) => continue,
                Frame::Close(reason) => return reason,
                other => panic!("unexpected frame before close: {other:?}"),
            }
        }
        None
    })
    .await
    .expect("close frame missing within timeout")
    .expect("close frame without reason")
}

#[rstest]
#[actix_rt::test]
async fn acknowledges_subscriptions(#[future] server: TestServer) {
    let server = server.await;
    let mut socket = connect(&server.url, None).await;

    send_json(&mut socket, json!({"type": "subscribe", "data": {"topics": ["sources", " "]}})).await;
    let ack = next_json(&mut socket).await;
    assert_eq!(ack["type"], "update");
    assert_eq!(ack["data"]["event"], "subscribed");
    assert_eq!(ack["data"]["topics"], json!(["sources"]));

    send_json(&mut socket, json!({"type": "unsubscribe", "data": {"topics": ["sources"]}})).await;
    let ack = next_json(&mut socket).await;
    assert_eq!(ack["data"]["event"], "unsubscribed");
    server.handle.stop(false).await;
}

#[rstest]
#[actix_rt::test]
async fn forwards_only_subscribed_topics(#[future] server: TestServer) {
    let server = server.await;
    let mut socket = connect(&server.url, None).await;
    send_json(&mut socket, json!({"type": "subscribe", "data": {"topics": ["sources"]}})).await;
    let _ack = next_json(&mut socket).await;

    server.hub.publish(Notification::to_topic(
        NotificationKind::Update,
        "other",
        json!({"n": 1}),
    ));
    server.hub.publish(Notification::to_topic(
        NotificationKind::Update,
        "sources",
        json!({"n": 2}),
    ));

    let frame = next_json(&mut socket).await;
    assert_eq!(frame["topic"], "sources");
    assert_eq!(frame["data"]["n"], 2);
}

#[rstest]
#[actix_rt::test]
async fn authenticated_query_streams_answer_to_the_user(#[future] server: TestServer) {
    let server = server.await;
    let user_id = UserId::random();
    let cookie = sign_in(&server.url, user_id).await;
    let mut socket = connect(&server.url, Some(cookie)).await;

    send_json(&mut socket, json!({"type": "auth", "data": {"userId": user_id.to_string()}})).await;
    let ack = next_json(&mut socket).await;
    assert_eq!(ack["data"]["event"], "authenticated");
    assert_eq!(ack["data"]["userId"], user_id.to_string());

    send_json(&mut socket, json!({"type": "query", "data": {"question": "What is Pathway?"}})).await;
    let answer = next_json(&mut socket).await;
    assert_eq!(answer["type"], "answer_complete");
    assert_eq!(answer["data"]["answer"], "echo: What is Pathway?");
    assert!(
        answer["topic"]
            .as_str()
            .is_some_and(|topic| topic.starts_with("query:"))
    );
}

#[rstest]
#[case::no_session(false)]
#[case::other_user(true)]
#[actix_rt::test]
async fn rejects_auth_that_does_not_match_session(
    #[future] server: TestServer,
    #[case] signed_in: bool,
) {
    let server = server.await;
    let cookie = if signed_in {
        Some(sign_in(&server.url, UserId::random()).await)
    } else {
        None
    };
    let mut socket = connect(&server.url, cookie).await;

    send_json(&mut socket, json!({"type": "auth", "data": {"userId": UserId::random().to_string()}})).await;
    let reply = next_json(&mut socket).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["data"]["message"], "Authentication failed");
}

#[rstest]
#[actix_rt::test]
async fn query_requires_authentication(#[future] server: TestServer) {
    let server = server.await;
    let mut socket = connect(&server.url, None).await;

    send_json(&mut socket, json!({"type": "query", "data": {"question": "hi"}})).await;
    let reply = next_json(&mut socket).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["data"]["message"], "Authentication required");
}

#[rstest]
#[actix_rt::test]
async fn reports_rejected_queries_as_error_frames(#[future] server: TestServer) {
    let server = server.await;
    let user_id = UserId::random();
    let cookie = sign_in(&server.url, user_id).await;
    let mut socket = connect(&server.url, Some(cookie)).await;
    send_json(&mut socket, json!({"type": "auth", "data": {"userId": user_id.to_string()}})).await;
    let _ack = next_json(&mut socket).await;

    send_json(&mut socket, json!({"type": "query", "data": {"question": "  "}})).await;
    let reply = next_json(&mut socket).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["data"]["message"], "Question is required");
}

#[rstest]
#[actix_rt::test]
async fn unsupported_type_keeps_connection_open(#[future] server: TestServer) {
    let server = server.await;
    let mut socket = connect(&server.url, None).await;

    send_json(&mut socket, json!({"type": "dance", "data": {}})).await;
    let reply = next_json(&mut socket).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["data"]["message"], "unsupported message type: dance");

    send_json(&mut socket, json!({"type": "subscribe", "data": {"topics": ["a"]}})).await;
    assert_eq!(next_json(&mut socket).await["data"]["event"], "subscribed");
}

#[rstest]
#[actix_rt::test]
async fn closes_on_malformed_json(#[future] server: TestServer) {
    let server = server.await;
    let mut socket = connect(&server.url, None).await;
    socket
        .send(ClientMessage::Text("not-json".into()))
        .await
        .expect("send text");

    let reason = next_close(&mut socket).await;
    assert_eq!(reason.code, CloseCode::Policy);
}

#[rstest]
#[actix_rt::test]
async fn closes_after_timeout_without_client_messages(#[future] server: TestServer) {
    let server = server.await;
    let mut socket = connect(&server.url, None).await;
    tokio::time::sleep(CLIENT_TIMEOUT + HEARTBEAT_INTERVAL * 3).await;

    let reason = next_close(&mut socket).await;
    assert_eq!(reason.code, CloseCode::Away);
    assert_eq!(reason.description.as_deref(), Some("heartbeat timeout"));
}

#[rstest]
#[case(SessionError::HubClosed, "server shutting down")]
#[case(SessionError::HeartbeatTimeout, "heartbeat timeout")]
fn server_side_closes_invite_a_reconnect(#[case] error: SessionError, #[case] description: &str) {
    let reason = close_reason_for(error).flatten().expect("close frame");
    assert_eq!(reason.code, CloseCode::Away);
    assert_ne!(u16::from(reason.code), 1000);
    assert_eq!(reason.description.as_deref(), Some(description));
}
