//! Webhook intake from the indexing pipeline.
//!
//! ```text
//! POST /api/webhooks
//! x-webhook-type: source.updated
//! x-webhook-signature: <shared secret>
//! {"sourceId":"...","changes":{...}}
//! ```

use actix_web::http::header::HeaderMap;
use actix_web::{HttpRequest, post, web};
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::domain::Error;
use crate::domain::ports::WebhookDelivery;
use crate::inbound::http::ApiResult;
use crate::inbound::http::state::HttpState;

/// Header carrying the shared secret.
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";
/// Header naming the event type.
pub const TYPE_HEADER: &str = "x-webhook-type";

/// Acknowledgement body.
#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    pub success: bool,
}

fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

/// Accept a webhook delivery.
#[utoipa::path(
    post,
    path = "/api/webhooks",
    request_body(content = Object, description = "Event payload; shape depends on the type"),
    params(
        ("x-webhook-type" = String, Header,
            description = "source.updated, source.created, source.deleted, query.feedback or system.alert"),
        ("x-webhook-signature" = Option<String>, Header, description = "Shared secret")
    ),
    responses(
        (status = 200, description = "Processed", body = WebhookAck),
        (status = 400, description = "Unsupported type or invalid payload", body = Error),
        (status = 401, description = "Invalid signature", body = Error),
        (status = 500, description = "Processing failed", body = Error)
    ),
    tags = ["webhooks"],
    operation_id = "receiveWebhook",
    security([])
)]
#[post("/webhooks")]
pub async fn receive_webhook(
    state: web::Data<HttpState>,
    request: HttpRequest,
    payload: web::Json<Value>,
) -> ApiResult<web::Json<WebhookAck>> {
    let headers = request.headers();
    let delivery = WebhookDelivery {
        signature: header_text(headers, SIGNATURE_HEADER),
        kind: header_text(headers, TYPE_HEADER).unwrap_or_default(),
        payload: payload.into_inner(),
    };
    state.webhooks.handle(delivery).await?;
    Ok(web::Json(WebhookAck { success: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inbound::http::test_utils::{MockPorts, signed_in_app};
    use actix_web::http::StatusCode;
    use actix_web::test::{self};
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[actix_web::test]
    async fn forwards_headers_and_payload() {
        let mut ports = MockPorts::default();
        ports
            .webhooks
            .expect_handle()
            .withf(|delivery| {
                delivery.kind == "source.created"
                    && delivery.signature.as_deref() == Some("s3cret")
                    && delivery.payload["title"] == "Docs"
            })
            .times(1)
            .returning(|_| Ok(()));
        let (app, _) = signed_in_app!(ports.into_state(), receive_webhook);

        let request = test::TestRequest::post()
            .uri("/api/webhooks")
            .insert_header((TYPE_HEADER, "source.created"))
            .insert_header((SIGNATURE_HEADER, " s3cret "))
            .set_json(json!({"title": "Docs"}))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        let value: Value = test::read_body_json(response).await;
        assert_eq!(value, json!({"success": true}));
    }

    #[rstest]
    #[case(Error::invalid_request("Unsupported webhook type"), StatusCode::BAD_REQUEST)]
    #[case(Error::unauthorized("Invalid webhook signature"), StatusCode::UNAUTHORIZED)]
    #[actix_web::test]
    async fn maps_service_rejections(#[case] error: Error, #[case] status: StatusCode) {
        let mut ports = MockPorts::default();
        ports
            .webhooks
            .expect_handle()
            .return_once(move |_| Err(error));
        let (app, _) = signed_in_app!(ports.into_state(), receive_webhook);

        let request = test::TestRequest::post()
            .uri("/api/webhooks")
            .set_json(json!({}))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), status);
    }

    #[rstest]
    fn blank_headers_are_absent() {
        let request = test::TestRequest::default()
            .insert_header((TYPE_HEADER, "   "))
            .to_http_request();
        assert_eq!(header_text(request.headers(), TYPE_HEADER), None);
    }
}
