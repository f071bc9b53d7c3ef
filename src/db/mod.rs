mod from_row;
mod schema;
pub mod queries;

pub use schema::init_db;

use std::sync::Arc;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::catalog::PlanCatalog;
use crate::email::EmailService;
use crate::payments::CreemClient;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state shared by every request handler.
///
/// There is no long-lived in-process coordination between handlers;
/// concurrency correctness lives in the store's conditional updates.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Authoritative plan/price table
    pub catalog: Arc<PlanCatalog>,
    /// Provider API client. None = degraded direct-link checkout only.
    pub creem: Option<CreemClient>,
    /// Webhook signing secret. None = unsigned events accepted with a warning.
    pub webhook_secret: Option<String>,
    /// Provider product ID for direct payment links
    pub product_id: Option<String>,
    pub payment_link_base: String,
    /// Base URL of this API (return URLs point here)
    pub base_url: String,
    /// Buyer-facing site for success/failure destinations
    pub site_url: String,
    pub commission_rate_bps: i64,
    pub email: Arc<EmailService>,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path)
        // Both settlement entry points may hit the same row concurrently;
        // wait out writer contention instead of surfacing SQLITE_BUSY.
        .with_init(|c| c.busy_timeout(Duration::from_secs(5)));
    Pool::builder().max_size(10).build(manager)
}
