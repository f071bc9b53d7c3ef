use axum::{extract::State, response::Redirect};

use crate::db::{queries, AppState};
use crate::extractors::Path;
use crate::models::PaymentEvent;
use crate::settlement;

/// Return URL the provider sends the buyer's browser to after payment.
///
/// Doubles as the settlement fallback: if the webhook was lost or delayed,
/// the redirect itself is treated as evidence of success and runs the same
/// idempotent settlement the webhook would have. The buyer is always
/// redirected - database trouble on this path degrades to the failure page
/// rather than an error response in the middle of a purchase.
pub async fn payment_success(
    State(state): State<AppState>,
    Path((locale, order_no)): Path<(String, String)>,
) -> Redirect {
    let failure_dest = format!("{}/{}/pay/failure", state.site_url, locale);

    let order = match state
        .db
        .get()
        .map_err(|e| e.to_string())
        .and_then(|conn| queries::get_order_by_no(&conn, &order_no).map_err(|e| e.to_string()))
    {
        Ok(Some(order)) => order,
        Ok(None) => {
            tracing::warn!(order_no = %order_no, "Success redirect for unknown order");
            return Redirect::temporary(&failure_dest);
        }
        Err(e) => {
            tracing::error!(order_no = %order_no, error = %e, "Success redirect lookup failed");
            return Redirect::temporary(&failure_dest);
        }
    };

    let event = PaymentEvent::from_success_redirect(&order.order_no);
    match settlement::settle_order(&state, &order, &event).await {
        Ok(outcome) if outcome.transitioned => {
            tracing::info!(
                order_no = %order.order_no,
                "Order settled via success-page fallback"
            );
        }
        Ok(_) => {} // webhook got there first
        Err(e) => {
            // The order exists and the provider vouched for the payment by
            // redirecting here; show success and leave the order for the
            // webhook retry or operator reconciliation.
            tracing::error!(
                order_no = %order.order_no,
                error = %e,
                "Fallback settlement failed"
            );
        }
    }

    let success_dest = format!(
        "{}/{}/pay/success?order_no={}",
        state.site_url,
        locale,
        urlencoding::encode(&order.order_no)
    );
    Redirect::temporary(&success_dest)
}
