use axum::extract::State;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::catalog::CheckoutSelection;
use crate::db::{queries, AppState};
use crate::error::{msg, AppError, Result};
use crate::extractors::{CurrentUser, Json};
use crate::models::{CheckoutMode, CreateOrder};
use crate::payments::direct_payment_link;

fn default_locale() -> String {
    "en".to_string()
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    #[serde(flatten)]
    pub selection: CheckoutSelection,
    /// Buyer locale, woven into the success return URL
    #[serde(default = "default_locale")]
    pub locale: String,
    /// Affiliate attribution, frozen onto the order
    #[serde(default)]
    pub referrer_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order_no: String,
    pub checkout_url: String,
    pub mode: CheckoutMode,
}

/// Create an order and a payable handle for it.
///
/// The client's commercial fields are validated against the catalog before
/// anything is persisted; a tampered request leaves no order row behind.
/// The hosted session API is preferred, a direct payment link is the
/// degraded fallback. Repeat submissions create fresh orders by design -
/// unpaid duplicates simply never settle.
pub async fn create_checkout(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>> {
    // No checkout mechanism configured at all means we cannot produce a
    // payable handle; refuse before creating an order that can never settle.
    let Some(product_id) = state.product_id.as_deref() else {
        return Err(AppError::Unavailable(msg::CHECKOUT_UNAVAILABLE.into()));
    };

    let plan = state.catalog.validate_checkout(&request.selection)?;
    let now = Utc::now().timestamp();

    let conn = state.db.get()?;
    let order = queries::create_order(
        &conn,
        &CreateOrder {
            user_id: user.user_id.clone(),
            user_email: user.email.clone(),
            plan_id: plan.plan_id.clone(),
            plan_name: plan.name.clone(),
            amount: request.selection.amount,
            currency: request.selection.currency.to_lowercase(),
            credits: plan.credits,
            billing_interval: plan.interval,
            entitlement_months: plan.entitlement_months,
            referrer_id: request.referrer_id.clone(),
            expires_at: plan.expires_at(now),
        },
    )?;

    let success_url = format!(
        "{}/pay/success/{}/{}",
        state.base_url, request.locale, order.order_no
    );

    // Preferred path: hosted checkout session carrying the order_no as
    // request_id. Any API failure degrades to the direct link instead of
    // failing the checkout.
    if let Some(creem) = &state.creem {
        match creem
            .create_checkout(&order.order_no, product_id, &user.email, &success_url)
            .await
        {
            Ok((session_id, checkout_url)) => {
                queries::set_checkout_handle(
                    &conn,
                    &order.order_no,
                    CheckoutMode::Api,
                    Some(&session_id),
                )?;
                return Ok(Json(CheckoutResponse {
                    order_no: order.order_no,
                    checkout_url,
                    mode: CheckoutMode::Api,
                }));
            }
            Err(e) => {
                tracing::warn!(
                    order_no = %order.order_no,
                    error = %e,
                    "Checkout session API failed, falling back to direct payment link"
                );
            }
        }
    }

    let checkout_url = direct_payment_link(
        &state.payment_link_base,
        product_id,
        &order.order_no,
        &user.email,
        &success_url,
    );
    // The link is the checkout handle on this path; keep it on the order
    // for later support lookups, same as a session id.
    queries::set_checkout_handle(&conn, &order.order_no, CheckoutMode::Link, Some(&checkout_url))?;

    Ok(Json(CheckoutResponse {
        order_no: order.order_no,
        checkout_url,
        mode: CheckoutMode::Link,
    }))
}
