//! Event-to-order matching.
//!
//! Two tiers, tried in order:
//!   1. correlation token lookup (the order_no the provider echoed back)
//!   2. unique (payer_email, amount) among orders still in `created`
//!
//! A wrong match settles someone else's order, so every ambiguity resolves
//! to "no match" and leaves the event for the success-page fallback.

use rusqlite::Connection;

use crate::db::queries;
use crate::error::Result;
use crate::id::is_valid_prefixed_id;
use crate::models::{Order, PaymentEvent};

/// Resolve a normalized payment event to the order it settles, if any.
pub fn resolve_order(conn: &Connection, event: &PaymentEvent) -> Result<Option<Order>> {
    // Tier 1: the provider carried our order_no back to us. Malformed
    // tokens skip the lookup; providers sometimes echo their own ids into
    // the same fields.
    if let Some(token) = event.correlation_token.as_deref() {
        if is_valid_prefixed_id(token) {
            if let Some(order) = queries::get_order_by_no(conn, token)? {
                return Ok(Some(order));
            }
        }
        tracing::warn!(
            event_type = %event.event_type,
            token = %token,
            "Correlation token matches no order, trying fallback match"
        );
    }

    // Tier 2: unique open order for this payer and amount. Requires both
    // fields; a partial key is not evidence enough to move money on.
    let (Some(email), Some(amount)) = (event.payer_email.as_deref(), event.amount) else {
        return Ok(None);
    };

    let candidates = queries::find_created_orders_by_email_amount(conn, email, amount)?;
    match candidates.len() {
        1 => Ok(candidates.into_iter().next()),
        0 => Ok(None),
        _ => {
            tracing::warn!(
                event_type = %event.event_type,
                email = %email,
                amount,
                "Fallback match is ambiguous, leaving event unmatched"
            );
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::models::{BillingInterval, CreateOrder};
    use serde_json::json;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        conn
    }

    fn seed_order(conn: &Connection, email: &str, amount: i64) -> Order {
        queries::create_order(
            conn,
            &CreateOrder {
                user_id: "user_1".into(),
                user_email: email.into(),
                plan_id: "premium-monthly".into(),
                plan_name: "Premium Monthly".into(),
                amount,
                currency: "usd".into(),
                credits: 500,
                billing_interval: BillingInterval::Month,
                entitlement_months: 1,
                referrer_id: None,
                expires_at: 1_800_000_000,
            },
        )
        .unwrap()
    }

    fn event(token: Option<&str>, email: Option<&str>, amount: Option<i64>) -> PaymentEvent {
        PaymentEvent {
            event_type: "checkout.completed".into(),
            correlation_token: token.map(Into::into),
            payer_email: email.map(Into::into),
            amount,
            raw: json!({}),
        }
    }

    #[test]
    fn test_token_match() {
        let conn = test_conn();
        let order = seed_order(&conn, "a@example.com", 2999);

        let resolved = resolve_order(&conn, &event(Some(&order.order_no), None, None))
            .unwrap()
            .unwrap();
        assert_eq!(resolved.order_no, order.order_no);
    }

    #[test]
    fn test_unknown_token_falls_back_to_email_amount() {
        let conn = test_conn();
        let order = seed_order(&conn, "a@example.com", 2999);

        let resolved = resolve_order(
            &conn,
            &event(Some("tb_ord_unknown"), Some("a@example.com"), Some(2999)),
        )
        .unwrap()
        .unwrap();
        assert_eq!(resolved.order_no, order.order_no);
    }

    #[test]
    fn test_fallback_requires_both_fields() {
        let conn = test_conn();
        seed_order(&conn, "a@example.com", 2999);

        assert!(resolve_order(&conn, &event(None, Some("a@example.com"), None))
            .unwrap()
            .is_none());
        assert!(resolve_order(&conn, &event(None, None, Some(2999)))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_ambiguous_fallback_is_no_match() {
        let conn = test_conn();
        seed_order(&conn, "a@example.com", 2999);
        seed_order(&conn, "a@example.com", 2999);

        assert!(
            resolve_order(&conn, &event(None, Some("a@example.com"), Some(2999)))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_fallback_ignores_settled_orders() {
        let conn = test_conn();
        let paid = seed_order(&conn, "a@example.com", 2999);
        queries::try_mark_paid(&conn, &paid.order_no, 1_700_000_100, "a@example.com", "{}")
            .unwrap();
        let open = seed_order(&conn, "a@example.com", 2999);

        // The paid order no longer counts, so the single open one matches.
        let resolved = resolve_order(&conn, &event(None, Some("a@example.com"), Some(2999)))
            .unwrap()
            .unwrap();
        assert_eq!(resolved.order_no, open.order_no);
    }

    #[test]
    fn test_email_match_is_case_insensitive() {
        let conn = test_conn();
        let order = seed_order(&conn, "Buyer@Example.com", 2999);

        let resolved = resolve_order(&conn, &event(None, Some("buyer@example.com"), Some(2999)))
            .unwrap()
            .unwrap();
        assert_eq!(resolved.order_no, order.order_no);
    }

    #[test]
    fn test_no_match_at_all() {
        let conn = test_conn();
        assert!(
            resolve_order(&conn, &event(None, Some("x@example.com"), Some(1)))
                .unwrap()
                .is_none()
        );
    }
}
