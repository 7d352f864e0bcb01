//! Stripe Checkout and webhook verification.
//!
//! Only two pieces of the Stripe API are used: creating a hosted Checkout
//! Session (REST, form-encoded) and verifying `Stripe-Signature` headers on
//! webhook deliveries.

use std::sync::Arc;
use std::time::Duration;

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, instrument};

use fnuc_core::UserId;

use crate::config::StripeConfig;
use crate::models::CartLine;

/// Maximum accepted age of a webhook signature, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Event type that triggers fulfillment.
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

/// Errors from the Stripe integration.
#[derive(Debug, Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Webhook signature missing, malformed, stale or wrong.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Webhook body is not a Stripe event.
    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

/// A created Checkout Session.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Stripe REST client.
#[derive(Clone)]
pub struct StripeClient {
    inner: Arc<StripeClientInner>,
}

struct StripeClientInner {
    client: reqwest::Client,
    secret_key: SecretString,
    webhook_secret: SecretString,
    api_base: String,
}

impl StripeClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &StripeConfig) -> Result<Self, StripeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            inner: Arc::new(StripeClientInner {
                client,
                secret_key: config.secret_key.clone(),
                webhook_secret: config.webhook_secret.clone(),
                api_base: config.api_base.trim_end_matches('/').to_owned(),
            }),
        })
    }

    /// Create a hosted Checkout Session for a user's cart.
    ///
    /// `base_url` is the public origin the customer returns to.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or Stripe rejects it.
    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn create_checkout_session(
        &self,
        user_id: UserId,
        lines: &[CartLine],
        base_url: &str,
    ) -> Result<CheckoutSession, StripeError> {
        let params = checkout_form(user_id, lines, base_url);
        let url = format!("{}/v1/checkout/sessions", self.inner.api_base);

        let response = self
            .inner
            .client
            .post(&url)
            .bearer_auth(self.inner.secret_key.expose_secret())
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let session: CheckoutSession = response.json().await?;
            debug!(session_id = %session.id, "Checkout session created");
            return Ok(session);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .map_or(body, |parsed| parsed.error.message);
        Err(StripeError::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// Verify a webhook delivery against the endpoint secret.
    ///
    /// # Errors
    ///
    /// Returns `StripeError::InvalidSignature` if verification fails.
    pub fn verify_webhook(&self, header: &str, body: &[u8], now: i64) -> Result<(), StripeError> {
        verify_signature(
            header,
            body,
            self.inner.webhook_secret.expose_secret(),
            now,
        )
    }
}

/// Form fields for `POST /v1/checkout/sessions`.
fn checkout_form(user_id: UserId, lines: &[CartLine], base_url: &str) -> Vec<(String, String)> {
    let mut params = vec![
        ("mode".to_owned(), "payment".to_owned()),
        ("payment_method_types[0]".to_owned(), "card".to_owned()),
        ("client_reference_id".to_owned(), user_id.to_string()),
        ("success_url".to_owned(), format!("{base_url}/payment/success")),
        ("cancel_url".to_owned(), format!("{base_url}/payment/failure")),
    ];
    for (n, line) in lines.iter().enumerate() {
        params.push((format!("line_items[{n}][price]"), line.price_id.clone()));
        params.push((format!("line_items[{n}][quantity]"), line.quantity.to_string()));
    }
    params
}

// =============================================================================
// Webhooks
// =============================================================================

/// Verify a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=<hex>...]`).
///
/// The signed payload is `"{t}.{body}"`. Any matching `v1` signature is
/// accepted, as long as `t` is within [`SIGNATURE_TOLERANCE_SECS`] of `now`.
///
/// # Errors
///
/// Returns `StripeError::InvalidSignature` describing the first failed check.
pub fn verify_signature(
    header: &str,
    body: &[u8],
    secret: &str,
    now: i64,
) -> Result<(), StripeError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| StripeError::InvalidSignature("missing timestamp".to_owned()))?;
    if signatures.is_empty() {
        return Err(StripeError::InvalidSignature(
            "no v1 signature".to_owned(),
        ));
    }

    let ts: i64 = timestamp
        .parse()
        .map_err(|_| StripeError::InvalidSignature("invalid timestamp".to_owned()))?;
    if (now - ts).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(StripeError::InvalidSignature(
            "timestamp outside tolerance".to_owned(),
        ));
    }

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| StripeError::InvalidSignature(e.to_string()))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);
    let expected = hex::encode(mac.finalize().into_bytes());

    if signatures
        .iter()
        .any(|candidate| constant_time_compare(&expected, candidate))
    {
        Ok(())
    } else {
        Err(StripeError::InvalidSignature(
            "signature mismatch".to_owned(),
        ))
    }
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: RawEventData,
}

#[derive(Debug, Deserialize)]
struct RawEventData {
    object: serde_json::Value,
}

/// A webhook event, reduced to what the storefront acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    /// A Checkout Session was paid.
    CheckoutCompleted {
        /// Our user id, as sent when the session was created.
        client_reference_id: Option<String>,
        /// The Checkout Session id.
        session_id: String,
    },
    /// Any other event type.
    Other(String),
}

/// Parse a verified webhook body.
///
/// # Errors
///
/// Returns `StripeError::InvalidPayload` if the body is not an event, or a
/// completed checkout lacks its session id.
pub fn parse_event(body: &[u8]) -> Result<WebhookEvent, StripeError> {
    let raw: RawEvent = serde_json::from_slice(body)?;
    if raw.event_type != CHECKOUT_COMPLETED {
        return Ok(WebhookEvent::Other(raw.event_type));
    }

    #[derive(Deserialize)]
    struct SessionObject {
        id: String,
        client_reference_id: Option<String>,
    }
    let session: SessionObject = serde_json::from_value(raw.data.object)?;
    Ok(WebhookEvent::CheckoutCompleted {
        client_reference_id: session.client_reference_id,
        session_id: session.id,
    })
}

/// Constant-time string comparison to prevent timing attacks.
pub(crate) fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
