//! Creem provider integration: hosted checkout sessions, direct payment
//! links, webhook signature verification, and payload normalization.

use std::time::Duration;

use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{msg, AppError, Result};
use crate::models::PaymentEvent;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Serialize)]
struct CreateCheckoutRequest<'a> {
    product_id: &'a str,
    /// Echoed back verbatim in webhook payloads; we put the order_no here
    /// so the provider carries our correlation token end to end.
    request_id: &'a str,
    success_url: &'a str,
    customer: CheckoutCustomer<'a>,
}

#[derive(Debug, Serialize)]
struct CheckoutCustomer<'a> {
    email: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateCheckoutResponse {
    id: String,
    checkout_url: String,
}

#[derive(Debug, Clone)]
pub struct CreemClient {
    client: Client,
    api_key: String,
    api_url: String,
}

impl CreemClient {
    pub fn new(api_key: String, api_url: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            api_key,
            api_url,
        }
    }

    /// Create a hosted checkout session for an order.
    ///
    /// Returns `(session_id, checkout_url)`. Failures here are not fatal to
    /// the checkout flow; the caller falls back to a direct payment link.
    pub async fn create_checkout(
        &self,
        order_no: &str,
        product_id: &str,
        email: &str,
        success_url: &str,
    ) -> Result<(String, String)> {
        let request = CreateCheckoutRequest {
            product_id,
            request_id: order_no,
            success_url,
            customer: CheckoutCustomer { email },
        };

        let response = self
            .client
            .post(format!("{}/v1/checkouts", self.api_url))
            .header("x-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Creem API error: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(format!(
                "Creem API error: {}",
                error_text
            )));
        }

        let checkout: CreateCheckoutResponse = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse Creem response: {}", e)))?;

        Ok((checkout.id, checkout.checkout_url))
    }
}

/// Build a direct payment link for the degraded checkout path.
///
/// Used when no API key is configured or the session API call failed. The
/// order_no rides along as request_id so webhooks still correlate.
pub fn direct_payment_link(
    link_base: &str,
    product_id: &str,
    order_no: &str,
    email: &str,
    success_url: &str,
) -> String {
    format!(
        "{}/{}?request_id={}&customer_email={}&success_url={}",
        link_base.trim_end_matches('/'),
        product_id,
        urlencoding::encode(order_no),
        urlencoding::encode(email),
        urlencoding::encode(success_url),
    )
}

/// Verify an HMAC-SHA256 hex signature over the raw webhook body.
pub fn verify_webhook_signature(secret: &str, payload: &[u8], signature: &str) -> Result<bool> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::Internal(msg::INVALID_WEBHOOK_SECRET.into()))?;
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());

    // Use constant-time comparison to prevent timing attacks.
    // An attacker could otherwise measure response times to progressively
    // discover the correct signature byte-by-byte.
    let expected_bytes = expected.as_bytes();
    let provided_bytes = signature.as_bytes();

    // Length check is not constant-time, but that's fine - signature length
    // is not secret (it's always 64 hex chars for SHA-256)
    if expected_bytes.len() != provided_bytes.len() {
        return Ok(false);
    }

    Ok(expected_bytes.ct_eq(provided_bytes).into())
}

/// Raw Creem webhook envelope. The `object` shape varies by event type, so
/// it stays a `Value` and normalization probes it.
#[derive(Debug, Deserialize)]
pub struct CreemWebhookEvent {
    #[serde(rename = "eventType")]
    pub event_type: String,
    pub request_id: Option<String>,
    #[serde(default)]
    pub object: Value,
}

/// Normalize a provider payload into a `PaymentEvent`.
///
/// The correlation token is probed in a fixed precedence order, because
/// Creem surfaces the echoed request_id in different places depending on
/// event type and checkout path:
///   1. top-level `request_id`
///   2. `object.request_id`
///   3. `object.order_no` / `object.order_id`
///   4. `object.metadata.order_no`
pub fn normalize_event(event: CreemWebhookEvent, raw: Value) -> PaymentEvent {
    let obj = &event.object;

    let correlation_token = event
        .request_id
        .as_deref()
        .filter(|s| !s.is_empty())
        .or_else(|| non_empty_str(&obj["request_id"]))
        .or_else(|| non_empty_str(&obj["order_no"]))
        .or_else(|| non_empty_str(&obj["order_id"]))
        .or_else(|| non_empty_str(&obj["metadata"]["order_no"]))
        .map(str::to_string);

    let payer_email = non_empty_str(&obj["customer"]["email"])
        .or_else(|| non_empty_str(&obj["email"]))
        .map(str::to_string);

    let amount = obj["amount"].as_i64();

    PaymentEvent {
        event_type: event.event_type,
        correlation_token,
        payer_email,
        amount,
        raw,
    }
}

fn non_empty_str(v: &Value) -> Option<&str> {
    v.as_str().filter(|s| !s.is_empty())
}
