//! Settlement orchestration: the single path by which an order becomes paid.
//!
//! Both webhook ingestion and the success-page fallback funnel through
//! `settle_order`. The conditional status update is the idempotency gate;
//! everything after it runs exactly once per order, in the request that won.
//!
//! Side effects are independent of each other. A failed credit grant does
//! not block the commission or the receipt, and no side-effect failure rolls
//! back the settlement: the paid status is the record of truth, failures are
//! logged for operator reconciliation.

use chrono::Utc;

use crate::db::{queries, AppState};
use crate::error::Result;
use crate::models::{Order, PaymentEvent};

/// What a settlement attempt did. All-false means another request already
/// settled this order and this attempt was a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct SettlementOutcome {
    /// This attempt won the created -> paid transition
    pub transitioned: bool,
    pub credits_granted: bool,
    pub commission_credited: bool,
    pub receipt_queued: bool,
}

/// Apply a success event to a matched order.
///
/// Safe to call any number of times, from any entry point, concurrently.
pub async fn settle_order(
    state: &AppState,
    order: &Order,
    event: &PaymentEvent,
) -> Result<SettlementOutcome> {
    let conn = state.db.get()?;

    let paid_at = Utc::now().timestamp();
    let paid_email = event.payer_email.as_deref().unwrap_or(&order.user_email);
    let raw_payload = event.raw.to_string();

    // The gate. Losing it means the order is already settled (or was moved
    // to a terminal failure state) and there is nothing left to do.
    if !queries::try_mark_paid(&conn, &order.order_no, paid_at, paid_email, &raw_payload)? {
        tracing::info!(
            order_no = %order.order_no,
            event_type = %event.event_type,
            "Order already settled, skipping"
        );
        return Ok(SettlementOutcome::default());
    }

    tracing::info!(
        order_no = %order.order_no,
        event_type = %event.event_type,
        amount = order.amount,
        "Order settled"
    );

    let mut outcome = SettlementOutcome {
        transitioned: true,
        ..Default::default()
    };

    // Credit grant. The ledger's UNIQUE(order_no) backstops the gate, so a
    // duplicate insert is absorbed rather than double-granted.
    if order.credits > 0 {
        match queries::insert_credit_grant(&conn, order) {
            Ok(inserted) => outcome.credits_granted = inserted,
            Err(e) => {
                tracing::error!(
                    order_no = %order.order_no,
                    error = %e,
                    "Credit grant failed, order remains settled"
                );
            }
        }
    }

    // Affiliate commission, only when the checkout carried attribution.
    if let Some(referrer_id) = order.referrer_id.as_deref() {
        let commission = order.amount * state.commission_rate_bps / 10_000;
        match queries::insert_commission(&conn, order, referrer_id, commission) {
            Ok(inserted) => outcome.commission_credited = inserted,
            Err(e) => {
                tracing::error!(
                    order_no = %order.order_no,
                    referrer_id = %referrer_id,
                    error = %e,
                    "Commission credit failed, order remains settled"
                );
            }
        }
    }

    // Receipt email runs detached; delivery latency and failures stay out
    // of the webhook response path.
    let email = state.email.clone();
    let mut receipt_order = order.clone();
    receipt_order.paid_at = Some(paid_at);
    receipt_order.paid_email = Some(paid_email.to_string());
    tokio::spawn(async move {
        if let Err(e) = email.send_receipt(&receipt_order).await {
            tracing::error!(
                order_no = %receipt_order.order_no,
                error = %e,
                "Receipt email failed"
            );
        }
    });
    outcome.receipt_queued = true;

    Ok(outcome)
}
