use rusqlite::Connection;

/// Initialize the database schema.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Orders: one row per purchase attempt, never deleted (audit record).
        -- Commercial fields are frozen at creation from the plan catalog.
        -- status moves forward only; the created->paid transition is guarded
        -- by a conditional UPDATE (see queries::try_mark_paid).
        CREATE TABLE IF NOT EXISTS orders (
            order_no TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            user_email TEXT NOT NULL,
            plan_id TEXT NOT NULL,
            plan_name TEXT NOT NULL,
            amount INTEGER NOT NULL,
            currency TEXT NOT NULL,
            credits INTEGER NOT NULL,
            billing_interval TEXT NOT NULL CHECK (billing_interval IN ('one-time', 'month', 'year')),
            entitlement_months INTEGER NOT NULL,
            referrer_id TEXT,
            status TEXT NOT NULL CHECK (status IN ('created', 'paid', 'failed', 'expired')),
            created_at INTEGER NOT NULL,
            paid_at INTEGER,
            paid_email TEXT,
            expires_at INTEGER NOT NULL,
            provider_session_ref TEXT,
            checkout_mode TEXT NOT NULL CHECK (checkout_mode IN ('api', 'link')),
            raw_payload TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_orders_user ON orders(user_id);
        -- Fallback matching scans created orders by payer email + amount
        CREATE INDEX IF NOT EXISTS idx_orders_email_amount ON orders(user_email, amount) WHERE status = 'created';

        -- Credit ledger: UNIQUE(order_no) makes the grant idempotent per
        -- order at the storage layer, independent of the settlement gate.
        CREATE TABLE IF NOT EXISTS credit_grants (
            id TEXT PRIMARY KEY,
            order_no TEXT NOT NULL UNIQUE REFERENCES orders(order_no),
            user_id TEXT NOT NULL,
            credits INTEGER NOT NULL,
            reason TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_credit_grants_user ON credit_grants(user_id);

        -- Affiliate commission ledger, same idempotency shape.
        CREATE TABLE IF NOT EXISTS commissions (
            id TEXT PRIMARY KEY,
            order_no TEXT NOT NULL UNIQUE REFERENCES orders(order_no),
            referrer_id TEXT NOT NULL,
            amount INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_commissions_referrer ON commissions(referrer_id);
        "#,
    )
}
