use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};

use crate::db::AppState;
use crate::payments::{normalize_event, verify_webhook_signature, CreemWebhookEvent};
use crate::reconcile;
use crate::settlement;

const SIGNATURE_HEADER: &str = "creem-signature";

/// Event types that settle an order. Everything else is acknowledged and
/// dropped.
fn is_settling_event(event_type: &str) -> bool {
    matches!(event_type, "checkout.completed" | "payment.succeeded")
}

/// Provider-facing liveness probe. Some dashboards ping the endpoint with a
/// GET before accepting it.
pub async fn webhook_health() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

pub async fn handle_creem_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    // The raw body is the only system-of-record for what the provider
    // actually sent, so it is logged at info for forensic replay.
    tracing::info!(body = %String::from_utf8_lossy(&body), "Creem webhook received");

    // Signature policy: a present signature must verify against the raw
    // body; an absent one is logged and let through so a provider-side
    // signing misconfiguration degrades to observable instead of silently
    // dropping payments. The settlement gate bounds what a forged event
    // could do, and commercial fields never come from the payload anyway.
    match (&state.webhook_secret, headers.get(SIGNATURE_HEADER)) {
        (Some(secret), Some(sig)) => {
            let Ok(signature) = sig.to_str() else {
                return (StatusCode::BAD_REQUEST, "Invalid signature header");
            };
            match verify_webhook_signature(secret, &body, signature) {
                Ok(true) => {}
                Ok(false) => {
                    tracing::warn!("Creem webhook signature mismatch");
                    return (StatusCode::UNAUTHORIZED, "Invalid signature");
                }
                Err(e) => {
                    tracing::error!("Signature verification error: {}", e);
                    return (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Signature verification failed",
                    );
                }
            }
        }
        (Some(_), None) => {
            tracing::warn!("Creem webhook arrived unsigned, processing anyway");
        }
        (None, _) => {
            tracing::warn!("No webhook secret configured, skipping signature verification");
        }
    }

    let event: CreemWebhookEvent = match serde_json::from_slice(&body) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!("Failed to parse Creem webhook: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid JSON");
        }
    };

    let raw: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => return (StatusCode::BAD_REQUEST, "Invalid JSON"),
    };

    if !is_settling_event(&event.event_type) {
        return (StatusCode::OK, "Event ignored");
    }

    let event = normalize_event(event, raw);
    tracing::info!(
        event_type = %event.event_type,
        token = ?event.correlation_token,
        payer_email = ?event.payer_email,
        amount = ?event.amount,
        "Creem event normalized"
    );

    let conn = match state.db.get() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("DB connection error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error");
        }
    };

    let order = match reconcile::resolve_order(&conn, &event) {
        Ok(Some(o)) => o,
        Ok(None) => {
            // Acknowledged so the provider stops retrying; the success-page
            // fallback is the remaining settlement path for this payment.
            tracing::warn!(
                event_type = %event.event_type,
                token = ?event.correlation_token,
                "Creem event matched no order"
            );
            return (StatusCode::OK, "No matching order");
        }
        Err(e) => {
            tracing::error!("Order matching error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error");
        }
    };
    drop(conn);

    match settlement::settle_order(&state, &order, &event).await {
        Ok(outcome) => {
            if outcome.transitioned {
                (StatusCode::OK, "OK")
            } else {
                (StatusCode::OK, "Already processed")
            }
        }
        Err(e) => {
            tracing::error!(
                order_no = %order.order_no,
                error = %e,
                "Settlement failed"
            );
            (StatusCode::INTERNAL_SERVER_ERROR, "Settlement failed")
        }
    }
}
