//! `GET /orders` and `GET /orders/tracking-stocks/{id}` - paginated order
//! history.

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use model::Order;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    page: Option<i64>,
    limit: Option<i64>,
}

impl PageQuery {
    fn page(&self) -> i64 {
        self.page.unwrap_or(0).max(0)
    }

    fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

#[derive(Debug, Serialize)]
struct OrderView {
    id: Uuid,
    tracking_stock_id: Uuid,
    broker_order_id: Option<String>,
    exchange_order_id: Option<String>,
    parent_order_id: Option<String>,
    order_type: String,
    event_type: String,
    transaction_type: String,
    exchange: String,
    product: String,
    base_price: rust_decimal::Decimal,
    quantity: u32,
    trigger_price: rust_decimal::Decimal,
    purchase_price: Option<rust_decimal::Decimal>,
    status: String,
    status_message: Option<String>,
    placed_at: chrono::NaiveDateTime,
}

impl From<Order> for OrderView {
    fn from(order: Order) -> Self {
        OrderView {
            id: order.id,
            tracking_stock_id: order.tracking_stock_id,
            broker_order_id: order.broker_order_id,
            exchange_order_id: order.exchange_order_id,
            parent_order_id: order.parent_order_id,
            order_type: format!("{:?}", order.order_type),
            event_type: format!("{:?}", order.event_type),
            transaction_type: order.transaction_type.to_string(),
            exchange: order.exchange,
            product: order.product,
            base_price: order.base_price,
            quantity: order.quantity,
            trigger_price: order.trigger_price,
            purchase_price: order.purchase_price,
            status: format!("{:?}", order.status),
            status_message: order.status_message,
            placed_at: order.placed_at,
        }
    }
}

pub async fn list_for_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<OrderView>>, ApiError> {
    let database = state.database.clone();
    let (p, limit) = (page.page(), page.limit());
    let orders = tokio::task::spawn_blocking(move || database.order_read().for_user(auth.user_id, p, limit)).await??;
    Ok(Json(orders.into_iter().map(OrderView::from).collect()))
}

pub async fn list_for_tracking_stock(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(tracking_stock_id): Path<Uuid>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<OrderView>>, ApiError> {
    let database = state.database.clone();
    let row = tokio::task::spawn_blocking(move || database.tracking_stock_read().for_id(tracking_stock_id)).await??;
    if row.user_id != auth.user_id {
        return Err(ApiError::NotFound);
    }

    let database = state.database.clone();
    let (p, limit) = (page.page(), page.limit());
    let orders =
        tokio::task::spawn_blocking(move || database.order_read().for_tracking_stock(tracking_stock_id, p, limit)).await??;
    Ok(Json(orders.into_iter().map(OrderView::from).collect()))
}
