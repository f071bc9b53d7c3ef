mod checkout;
mod orders;
mod success;
mod webhook;

pub use checkout::*;
pub use orders::*;
pub use success::*;
pub use webhook::*;

use axum::{
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::db::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/checkout", post(create_checkout))
        // Provider redirects the buyer's browser here after payment
        .route("/pay/success/{locale}/{order_no}", get(payment_success))
        .route("/orders", get(list_orders))
        .route("/orders/{order_no}", get(get_order))
}

pub fn webhook_router() -> Router<AppState> {
    Router::new()
        .route("/webhook/creem", post(handle_creem_webhook).get(webhook_health))
}
