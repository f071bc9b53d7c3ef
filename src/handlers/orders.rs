use axum::extract::State;
use serde::Serialize;

use crate::db::{queries, AppState};
use crate::error::{msg, OptionExt, Result};
use crate::extractors::{CurrentUser, Json, Path};
use crate::models::Order;

#[derive(Debug, Serialize)]
pub struct OrderListResponse {
    pub orders: Vec<Order>,
}

/// List the caller's orders, newest first. Raw settlement payloads are
/// excluded from serialization.
pub async fn list_orders(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<OrderListResponse>> {
    let conn = state.db.get()?;
    let orders = queries::list_orders_for_user(&conn, &user.user_id)?;
    Ok(Json(OrderListResponse { orders }))
}

/// Fetch one of the caller's orders. Someone else's order_no 404s rather
/// than 403s so order numbers leak nothing.
pub async fn get_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(order_no): Path<String>,
) -> Result<Json<Order>> {
    let conn = state.db.get()?;
    let order = queries::get_order_by_no(&conn, &order_no)?
        .filter(|o| o.user_id == user.user_id)
        .or_not_found(msg::ORDER_NOT_FOUND)?;
    Ok(Json(order))
}
