use chrono::Utc;
use rusqlite::{params, Connection};

use crate::error::Result;
use crate::id::EntityType;
use crate::models::*;

use super::from_row::{
    query_all, query_one, COMMISSION_COLS, CREDIT_GRANT_COLS, ORDER_COLS,
};

fn now() -> i64 {
    Utc::now().timestamp()
}

// ============ Orders ============

/// Persist a new order in `Created` state.
///
/// The order_no is assigned here, exactly once. Commercial fields in the
/// input must already be catalog-validated; this function does not check.
pub fn create_order(conn: &Connection, input: &CreateOrder) -> Result<Order> {
    let order_no = EntityType::Order.gen_id();
    let created_at = now();
    let email = input.user_email.trim().to_lowercase();

    conn.execute(
        "INSERT INTO orders (order_no, user_id, user_email, plan_id, plan_name, amount, currency,
             credits, billing_interval, entitlement_months, referrer_id, status, created_at,
             expires_at, checkout_mode)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            &order_no,
            &input.user_id,
            &email,
            &input.plan_id,
            &input.plan_name,
            input.amount,
            &input.currency,
            input.credits,
            input.billing_interval.as_str(),
            input.entitlement_months,
            &input.referrer_id,
            OrderStatus::Created.as_str(),
            created_at,
            input.expires_at,
            CheckoutMode::Link.as_str(),
        ],
    )?;

    Ok(Order {
        order_no,
        user_id: input.user_id.clone(),
        user_email: email,
        plan_id: input.plan_id.clone(),
        plan_name: input.plan_name.clone(),
        amount: input.amount,
        currency: input.currency.clone(),
        credits: input.credits,
        billing_interval: input.billing_interval,
        entitlement_months: input.entitlement_months,
        referrer_id: input.referrer_id.clone(),
        status: OrderStatus::Created,
        created_at,
        paid_at: None,
        paid_email: None,
        expires_at: input.expires_at,
        provider_session_ref: None,
        checkout_mode: CheckoutMode::Link,
        raw_payload: None,
    })
}

pub fn get_order_by_no(conn: &Connection, order_no: &str) -> Result<Option<Order>> {
    query_one(
        conn,
        &format!("SELECT {} FROM orders WHERE order_no = ?1", ORDER_COLS),
        &[&order_no],
    )
}

/// Record which checkout path produced the payable handle.
pub fn set_checkout_handle(
    conn: &Connection,
    order_no: &str,
    mode: CheckoutMode,
    session_ref: Option<&str>,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE orders SET checkout_mode = ?1, provider_session_ref = ?2 WHERE order_no = ?3",
        params![mode.as_str(), session_ref, order_no],
    )?;
    Ok(affected > 0)
}

/// Fallback matching candidates: `Created` orders for this payer email and
/// amount. Scoped to `Created` so an already-settled order is never a false
/// match. Capped at 2 rows - the caller only needs to distinguish unique
/// from ambiguous.
pub fn find_created_orders_by_email_amount(
    conn: &Connection,
    payer_email: &str,
    amount: i64,
) -> Result<Vec<Order>> {
    let email = payer_email.trim().to_lowercase();
    query_all(
        conn,
        &format!(
            "SELECT {} FROM orders
             WHERE user_email = ?1 AND amount = ?2 AND status = 'created'
             ORDER BY created_at DESC LIMIT 2",
            ORDER_COLS
        ),
        &[&email, &amount],
    )
}

/// The idempotent settlement gate: transition `created -> paid` only if the
/// persisted status is still `created`. Returns true for the single winner;
/// false means another request already settled this order (a no-op, not an
/// error). This is the only place an order mutates after creation.
pub fn try_mark_paid(
    conn: &Connection,
    order_no: &str,
    paid_at: i64,
    paid_email: &str,
    raw_payload: &str,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE orders SET status = 'paid', paid_at = ?1, paid_email = ?2, raw_payload = ?3
         WHERE order_no = ?4 AND status = 'created'",
        params![paid_at, paid_email, raw_payload, order_no],
    )?;
    Ok(affected > 0)
}

pub fn list_orders_for_user(conn: &Connection, user_id: &str) -> Result<Vec<Order>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM orders WHERE user_id = ?1 ORDER BY created_at DESC",
            ORDER_COLS
        ),
        &[&user_id],
    )
}

// ============ Credit ledger ============

/// Issue the credit grant for a settled order. `INSERT OR IGNORE` on the
/// order_no unique key: returns false when the grant already exists.
pub fn insert_credit_grant(conn: &Connection, order: &Order) -> Result<bool> {
    let affected = conn.execute(
        "INSERT OR IGNORE INTO credit_grants (id, order_no, user_id, credits, reason, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            EntityType::CreditGrant.gen_id(),
            &order.order_no,
            &order.user_id,
            order.credits,
            format!("purchase:{}", order.plan_id),
            now(),
        ],
    )?;
    Ok(affected > 0)
}

pub fn get_credit_grant(conn: &Connection, order_no: &str) -> Result<Option<CreditGrant>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM credit_grants WHERE order_no = ?1",
            CREDIT_GRANT_COLS
        ),
        &[&order_no],
    )
}

pub fn count_credit_grants(conn: &Connection, order_no: &str) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM credit_grants WHERE order_no = ?1",
        [order_no],
        |row| row.get(0),
    )?;
    Ok(count)
}

// ============ Commission ledger ============

/// Credit the referrer's commission for a settled order, same idempotency
/// shape as the credit grant.
pub fn insert_commission(
    conn: &Connection,
    order: &Order,
    referrer_id: &str,
    amount: i64,
) -> Result<bool> {
    let affected = conn.execute(
        "INSERT OR IGNORE INTO commissions (id, order_no, referrer_id, amount, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            EntityType::Commission.gen_id(),
            &order.order_no,
            referrer_id,
            amount,
            now(),
        ],
    )?;
    Ok(affected > 0)
}

pub fn get_commission(conn: &Connection, order_no: &str) -> Result<Option<Commission>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM commissions WHERE order_no = ?1",
            COMMISSION_COLS
        ),
        &[&order_no],
    )
}

pub fn count_commissions(conn: &Connection, order_no: &str) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM commissions WHERE order_no = ?1",
        [order_no],
        |row| row.get(0),
    )?;
    Ok(count)
}
