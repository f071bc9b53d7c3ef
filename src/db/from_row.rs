//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to
/// rusqlite errors instead of panicking on corrupted values.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const ORDER_COLS: &str = "order_no, user_id, user_email, plan_id, plan_name, amount, currency, credits, billing_interval, entitlement_months, referrer_id, status, created_at, paid_at, paid_email, expires_at, provider_session_ref, checkout_mode, raw_payload";

pub const CREDIT_GRANT_COLS: &str = "id, order_no, user_id, credits, reason, created_at";

pub const COMMISSION_COLS: &str = "id, order_no, referrer_id, amount, created_at";

// ============ FromRow Implementations ============

impl FromRow for Order {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Order {
            order_no: row.get(0)?,
            user_id: row.get(1)?,
            user_email: row.get(2)?,
            plan_id: row.get(3)?,
            plan_name: row.get(4)?,
            amount: row.get(5)?,
            currency: row.get(6)?,
            credits: row.get(7)?,
            billing_interval: parse_enum(row, 8, "billing_interval")?,
            entitlement_months: row.get(9)?,
            referrer_id: row.get(10)?,
            status: parse_enum(row, 11, "status")?,
            created_at: row.get(12)?,
            paid_at: row.get(13)?,
            paid_email: row.get(14)?,
            expires_at: row.get(15)?,
            provider_session_ref: row.get(16)?,
            checkout_mode: parse_enum(row, 17, "checkout_mode")?,
            raw_payload: row.get(18)?,
        })
    }
}

impl FromRow for CreditGrant {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(CreditGrant {
            id: row.get(0)?,
            order_no: row.get(1)?,
            user_id: row.get(2)?,
            credits: row.get(3)?,
            reason: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

impl FromRow for Commission {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Commission {
            id: row.get(0)?,
            order_no: row.get(1)?,
            referrer_id: row.get(2)?,
            amount: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}
