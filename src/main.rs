use std::sync::Arc;

use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tillbook::catalog::PlanCatalog;
use tillbook::config::Config;
use tillbook::db::{create_pool, init_db, AppState};
use tillbook::email::EmailService;
use tillbook::handlers;
use tillbook::payments::CreemClient;

#[derive(Parser, Debug)]
#[command(name = "tillbook")]
#[command(about = "Order reconciliation backend for credit-plan purchases")]
struct Cli {
    /// Load the plan catalog from a JSON file instead of the built-in table
    #[arg(long)]
    catalog: Option<std::path::PathBuf>,

    /// Delete the database on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tillbook=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    let catalog = match &cli.catalog {
        Some(path) => PlanCatalog::from_json_file(path).expect("Failed to load catalog file"),
        None => PlanCatalog::default(),
    };

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let creem = config
        .creem_api_key
        .clone()
        .map(|key| CreemClient::new(key, config.creem_api_url.clone()));
    if creem.is_none() {
        tracing::warn!("No Creem API key configured, checkout degraded to direct payment links");
    }
    if config.creem_webhook_secret.is_none() {
        tracing::warn!("No webhook secret configured, signatures will not be verified");
    }

    let state = AppState {
        db: db_pool,
        catalog: Arc::new(catalog),
        creem,
        webhook_secret: config.creem_webhook_secret.clone(),
        product_id: config.creem_product_id.clone(),
        payment_link_base: config.creem_payment_link_base.clone(),
        base_url: config.base_url.clone(),
        site_url: config.site_url.clone(),
        commission_rate_bps: config.commission_rate_bps,
        email: Arc::new(EmailService::new(
            config.resend_api_key.clone(),
            config.email_from.clone(),
        )),
    };

    let app = Router::new()
        .merge(handlers::public_router())
        .merge(handlers::webhook_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    if cleanup_on_exit {
        tracing::info!("EPHEMERAL MODE: database will be deleted on exit");
    }

    tracing::info!("Tillbook server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Failed to start server");

    if cleanup_on_exit {
        let db_path = &config.database_path;
        tracing::info!("Cleaning up ephemeral database...");
        if let Err(e) = std::fs::remove_file(db_path) {
            tracing::warn!("Failed to remove {}: {}", db_path, e);
        }
        let _ = std::fs::remove_file(format!("{}-wal", db_path));
        let _ = std::fs::remove_file(format!("{}-shm", db_path));
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
