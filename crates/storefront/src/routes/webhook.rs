//! Stripe webhook endpoint.
//!
//! Verified `checkout.session.completed` events turn the purchaser's cart
//! into an order. Redelivered events are recognised by their Checkout
//! Session id and acknowledged without side effects.

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{HeaderMap, header::CONTENT_LENGTH},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use fnuc_core::UserId;

use crate::error::{ApiError, ApiResult, AppError};
use crate::services::stripe::{WebhookEvent, parse_event};
use crate::services::{Fulfillment, FulfillmentError, FulfillmentService};
use crate::state::AppState;

/// Largest accepted webhook body.
pub const MAX_WEBHOOK_BODY: usize = 1024 * 1024;

/// Header carrying the webhook signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

fn ack() -> Response {
    Json(serde_json::json!({})).into_response()
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Handle a Stripe webhook delivery.
///
/// The body is read here rather than through an extractor so that anything
/// over [`MAX_WEBHOOK_BODY`] is answered with 400, not the framework's 413.
#[instrument(skip_all)]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> ApiResult<Response> {
    let Some(stripe) = state.stripe() else {
        return Ok(ack());
    };

    if declared_length(&headers).is_some_and(|n| n > MAX_WEBHOOK_BODY) {
        warn!("Webhook body too large");
        return Err(ApiError::bad_request("Payload too large"));
    }
    let body = axum::body::to_bytes(body, MAX_WEBHOOK_BODY)
        .await
        .map_err(|e| {
            warn!(error = %e, "Webhook body too large or unreadable");
            ApiError::bad_request("Payload too large")
        })?;
    debug!(bytes = body.len(), "Webhook received");

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::bad_request("Missing signature"))?;

    if let Err(e) = stripe.verify_webhook(signature, &body, Utc::now().timestamp()) {
        warn!(error = %e, "Rejected webhook signature");
        return Err(ApiError::bad_request("Invalid signature"));
    }

    let event = parse_event(&body).map_err(|e| {
        warn!(error = %e, "Unparseable webhook payload");
        ApiError::bad_request("Invalid payload")
    })?;

    let (reference, session_id) = match event {
        WebhookEvent::CheckoutCompleted {
            client_reference_id,
            session_id,
        } => (client_reference_id, session_id),
        WebhookEvent::Other(event_type) => {
            debug!(%event_type, "Ignoring webhook event");
            return Ok(ack());
        }
    };

    let user_id = reference
        .as_deref()
        .and_then(|r| r.trim().parse::<i32>().ok())
        .map(UserId::new)
        .ok_or_else(|| {
            warn!(%session_id, ?reference, "Checkout session without a usable client reference");
            ApiError::bad_request("Invalid client reference")
        })?;

    match FulfillmentService::new(state.pool())
        .fulfill(user_id, &session_id, Utc::now())
        .await
    {
        Ok(Fulfillment::Fulfilled(order_id)) => {
            info!(%order_id, %user_id, %session_id, "Order fulfilled");
        }
        Ok(Fulfillment::AlreadyFulfilled) => {
            info!(%session_id, "Checkout session already fulfilled");
        }
        Err(FulfillmentError::UnknownUser(id)) => {
            warn!(user_id = %id, %session_id, "Paid checkout for unknown user");
        }
        Err(FulfillmentError::Repository(e)) => return Err(ApiError(AppError::Database(e))),
    }

    Ok(ack())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use hmac::{Hmac, Mac};
    use secrecy::SecretString;
    use sha2::Sha256;
    use tower::ServiceExt;

    use super::*;
    use crate::config::StripeConfig;
    use crate::config::tests::test_config;
    use crate::routes::tests::{body_json, request};
    use crate::services::LogMailer;
    use crate::state::tests::{test_state, test_state_with};

    const SECRET: &str = "whsec_R8mK2xPq7LvN4tYw";

    fn stripe_app() -> axum::Router {
        let mut config = test_config();
        config.stripe = Some(StripeConfig {
            secret_key: SecretString::from("sk_test_9QwErTy2UiOp"),
            webhook_secret: SecretString::from(SECRET),
            api_base: "http://127.0.0.1:1".to_owned(),
        });
        let state = test_state_with(config, Arc::new(LogMailer));
        crate::routes::routes(&state).with_state(state)
    }

    fn signature_for(body: &str) -> String {
        let timestamp = Utc::now().timestamp();
        let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.{body}").as_bytes());
        format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    async fn deliver(app: axum::Router, body: &'static str, signature: Option<String>) -> Response {
        let mut builder = request("POST", "/stripe-webhook")
            .header(axum::http::header::CONTENT_TYPE, "application/json");
        if let Some(signature) = signature {
            builder = builder.header(SIGNATURE_HEADER, signature);
        }
        app.oneshot(builder.body(axum::body::Body::from(body)).unwrap()).await.unwrap()
    }

    #[tokio::test]
    async fn test_disabled_payments_acknowledge() {
        let state = test_state(Arc::new(LogMailer));
        let app = crate::routes::routes(&state).with_state(state);
        let response = deliver(app, "{}", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_missing_signature_is_rejected() {
        let response = deliver(stripe_app(), r#"{"type":"ping"}"#, None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_forged_signature_is_rejected() {
        let forged = format!("t={},v1={}", Utc::now().timestamp(), "00".repeat(32));
        let response = deliver(stripe_app(), r#"{"type":"ping"}"#, Some(forged)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"error": "Invalid signature"})
        );
    }

    #[tokio::test]
    async fn test_body_over_limit_is_bad_request() {
        let body = vec![b' '; 3 * 1024 * 1024];
        let response = stripe_app()
            .oneshot(
                request("POST", "/stripe-webhook")
                    .header(axum::http::header::CONTENT_TYPE, "application/json")
                    .header(SIGNATURE_HEADER, signature_for("{}"))
                    .body(axum::body::Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"error": "Payload too large"})
        );
    }

    #[tokio::test]
    async fn test_oversized_declared_length_is_rejected() {
        let body = r#"{"type":"ping"}"#;
        let response = stripe_app()
            .oneshot(
                request("POST", "/stripe-webhook")
                    .header(CONTENT_LENGTH, (MAX_WEBHOOK_BODY + 1).to_string())
                    .header(SIGNATURE_HEADER, signature_for(body))
                    .body(axum::body::Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_invalid_json_is_rejected() {
        let body = "not json";
        let response = deliver(stripe_app(), body, Some(signature_for(body))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_other_events_are_acknowledged() {
        let body = r#"{"type":"payment_intent.created","data":{"object":{}}}"#;
        let response = deliver(stripe_app(), body, Some(signature_for(body))).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_non_numeric_reference_is_rejected() {
        let body = r#"{"type":"checkout.session.completed","data":{"object":{"id":"cs_test_1","client_reference_id":"abc"}}}"#;
        let response = deliver(stripe_app(), body, Some(signature_for(body))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"error": "Invalid client reference"})
        );
    }

    #[tokio::test]
    async fn test_missing_reference_is_rejected() {
        let body = r#"{"type":"checkout.session.completed","data":{"object":{"id":"cs_test_2"}}}"#;
        let response = deliver(stripe_app(), body, Some(signature_for(body))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
