use serde_json::Value;

/// Normalized result of parsing a provider notification.
///
/// Ephemeral - never persisted as its own row beyond the audit blob stamped
/// onto the order at settlement. Optional fields reflect how unevenly
/// providers populate their payloads; the matcher degrades accordingly.
#[derive(Debug, Clone)]
pub struct PaymentEvent {
    pub event_type: String,
    /// The order_no echoed back by the provider, when it propagated one
    pub correlation_token: Option<String>,
    pub payer_email: Option<String>,
    /// Amount in minor units as reported by the provider. Used only for
    /// fallback matching - never for the order's commercial fields.
    pub amount: Option<i64>,
    pub raw: Value,
}

impl PaymentEvent {
    /// Synthesize a success event for the success-page fallback path.
    ///
    /// The premise: the provider would not have redirected the browser to
    /// the return URL unless payment succeeded. Safe only because the
    /// settlement gate is idempotent - a later real webhook no-ops.
    pub fn from_success_redirect(order_no: &str) -> Self {
        Self {
            event_type: "success_page.redirect".to_string(),
            correlation_token: Some(order_no.to_string()),
            payer_email: None,
            amount: None,
            raw: serde_json::json!({
                "event_type": "success_page.redirect",
                "order_no": order_no,
            }),
        }
    }
}
