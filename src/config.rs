use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    /// Base URL of this API (payment provider redirects and webhooks land here)
    pub base_url: String,
    /// Base URL of the buyer-facing site (success/failure destinations)
    pub site_url: String,
    /// Provider API key. Absent = degraded direct-link checkout only.
    pub creem_api_key: Option<String>,
    pub creem_api_url: String,
    /// Provider product ID for direct payment links (degraded checkout path)
    pub creem_product_id: Option<String>,
    /// Webhook signing secret. Absent = signatures logged but not enforced.
    pub creem_webhook_secret: Option<String>,
    pub creem_payment_link_base: String,
    pub resend_api_key: Option<String>,
    pub email_from: String,
    /// Affiliate commission in basis points of the order amount
    pub commission_rate_bps: i64,
    pub dev_mode: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("TILLBOOK_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let base_url =
            env::var("BASE_URL").unwrap_or_else(|_| format!("http://{}:{}", host, port));

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "tillbook.db".to_string()),
            site_url: env::var("SITE_URL").unwrap_or_else(|_| base_url.clone()),
            base_url,
            creem_api_key: env::var("CREEM_API_KEY").ok().filter(|s| !s.is_empty()),
            creem_api_url: env::var("CREEM_API_URL")
                .unwrap_or_else(|_| "https://api.creem.io".to_string()),
            creem_product_id: env::var("CREEM_PRODUCT_ID").ok().filter(|s| !s.is_empty()),
            creem_webhook_secret: env::var("CREEM_WEBHOOK_SECRET")
                .ok()
                .filter(|s| !s.is_empty()),
            creem_payment_link_base: env::var("CREEM_PAYMENT_LINK_BASE")
                .unwrap_or_else(|_| "https://www.creem.io/payment".to_string()),
            resend_api_key: env::var("RESEND_API_KEY").ok().filter(|s| !s.is_empty()),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "receipts@tillbook.local".to_string()),
            commission_rate_bps: env::var("COMMISSION_RATE_BPS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2000),
            dev_mode,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
