//! Test utilities and fixtures for Tillbook integration tests

#![allow(dead_code)]

use axum::Router;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::sync::Arc;

pub use tillbook::catalog::PlanCatalog;
pub use tillbook::db::{init_db, queries, AppState};
pub use tillbook::email::EmailService;
pub use tillbook::models::*;

/// Create an in-memory test database with schema initialized
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

/// Create a test app state with an in-memory pool and the built-in catalog.
///
/// No provider client and no webhook secret: checkout degrades to direct
/// payment links and webhooks skip signature verification unless the test
/// opts in via `with_webhook_secret`.
pub fn create_test_app_state() -> AppState {
    let manager = SqliteConnectionManager::memory();
    let pool = Pool::builder().max_size(4).build(manager).unwrap();
    {
        let conn = pool.get().unwrap();
        init_db(&conn).unwrap();
    }

    AppState {
        db: pool,
        catalog: Arc::new(PlanCatalog::default()),
        creem: None,
        webhook_secret: None,
        product_id: Some("prod_test".to_string()),
        payment_link_base: "https://pay.example.com/payment".to_string(),
        base_url: "http://localhost:3000".to_string(),
        site_url: "https://shop.example.com".to_string(),
        commission_rate_bps: 2000,
        email: Arc::new(EmailService::new(None, "receipts@test.local".to_string())),
    }
}

pub fn with_webhook_secret(mut state: AppState, secret: &str) -> AppState {
    state.webhook_secret = Some(secret.to_string());
    state
}

/// App state backed by a temp file database. In-memory pools give each
/// pooled connection its own database, so concurrency tests need a real
/// file both workers can see.
pub fn create_file_backed_state() -> (AppState, std::path::PathBuf) {
    let path = std::env::temp_dir().join(format!(
        "tillbook-test-{}.db",
        uuid::Uuid::new_v4().simple()
    ));
    let pool = tillbook::db::create_pool(path.to_str().unwrap()).unwrap();
    {
        let conn = pool.get().unwrap();
        init_db(&conn).unwrap();
    }

    let mut state = create_test_app_state();
    state.db = pool;
    (state, path)
}

/// Router with all public endpoints
pub fn public_app(state: AppState) -> Router {
    tillbook::handlers::public_router().with_state(state)
}

/// Router with the webhook endpoint
pub fn webhook_app(state: AppState) -> Router {
    tillbook::handlers::webhook_router().with_state(state)
}

/// Create a test order in `Created` state with premium-monthly shape.
pub fn create_test_order(conn: &Connection, email: &str, amount: i64) -> Order {
    create_test_order_with_referrer(conn, email, amount, None)
}

pub fn create_test_order_with_referrer(
    conn: &Connection,
    email: &str,
    amount: i64,
    referrer_id: Option<&str>,
) -> Order {
    queries::create_order(
        conn,
        &CreateOrder {
            user_id: "user_test".to_string(),
            user_email: email.to_string(),
            plan_id: "premium-monthly".to_string(),
            plan_name: "Premium Monthly".to_string(),
            amount,
            currency: "usd".to_string(),
            credits: 500,
            billing_interval: BillingInterval::Month,
            entitlement_months: 1,
            referrer_id: referrer_id.map(|s| s.to_string()),
            expires_at: 1_900_000_000,
        },
    )
    .expect("Failed to create test order")
}

/// HMAC-SHA256 hex signature over a webhook body, as the provider computes it.
pub fn sign_payload(secret: &str, payload: &[u8]) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}
