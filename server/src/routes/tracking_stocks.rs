//! `/tracking-stocks*` - CRUD plus the `start`/`stop` lifecycle toggles.

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::Json;
use model::{NewTrackingStock, TrackingStockRow};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateTrackingStockRequest {
    stock_symbol: String,
    exchange: String,
    instrument_token: u32,
    target: Decimal,
    stoploss: Decimal,
    quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    status: String,
}

#[derive(Debug, Serialize)]
struct TrackingStockView {
    id: String,
    stock_symbol: String,
    exchange: String,
    instrument_token: u32,
    target: Decimal,
    stoploss: Decimal,
    quantity: u32,
    status: String,
    created_at: chrono::NaiveDateTime,
}

impl From<TrackingStockRow> for TrackingStockView {
    fn from(row: TrackingStockRow) -> Self {
        TrackingStockView {
            id: row.id.to_string(),
            stock_symbol: row.stock_symbol,
            exchange: row.exchange,
            instrument_token: row.instrument_token,
            target: row.target,
            stoploss: row.stop_loss,
            quantity: row.quantity,
            status: row.status.to_string(),
            created_at: row.created_at,
        }
    }
}

fn require_owner(row: &TrackingStockRow, user_id: Uuid) -> Result<(), ApiError> {
    if row.user_id == user_id {
        Ok(())
    } else {
        Err(ApiError::NotFound)
    }
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateTrackingStockRequest>,
) -> Result<Json<TrackingStockView>, ApiError> {
    if body.target <= Decimal::ZERO || body.stoploss <= Decimal::ZERO || body.quantity == 0 {
        return Err(ApiError::Validation(
            "target and stoploss must be positive, quantity must be nonzero".to_string(),
        ));
    }

    let draft = NewTrackingStock {
        user_id: auth.user_id,
        stock_symbol: body.stock_symbol,
        exchange: body.exchange,
        instrument_token: body.instrument_token,
        target: body.target,
        stop_loss: body.stoploss,
        quantity: body.quantity,
    };
    let database = state.database.clone();
    let row = tokio::task::spawn_blocking(move || database.tracking_stock_write().create(draft)).await??;
    Ok(Json(TrackingStockView::from(row)))
}

pub async fn list(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Vec<TrackingStockView>>, ApiError> {
    let database = state.database.clone();
    let rows = tokio::task::spawn_blocking(move || database.tracking_stock_read().for_user(auth.user_id)).await??;
    Ok(Json(rows.into_iter().map(TrackingStockView::from).collect()))
}

pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<TrackingStockView>, ApiError> {
    let database = state.database.clone();
    let row = tokio::task::spawn_blocking(move || database.tracking_stock_read().for_id(id)).await??;
    require_owner(&row, auth.user_id)?;
    Ok(Json(TrackingStockView::from(row)))
}

pub async fn update_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<TrackingStockView>, ApiError> {
    let status = model::TrackingStatus::from_str(&body.status)
        .map_err(|_| ApiError::Validation(format!("unknown status '{}'", body.status)))?;

    let database = state.database.clone();
    let existing = tokio::task::spawn_blocking(move || database.tracking_stock_read().for_id(id)).await??;
    require_owner(&existing, auth.user_id)?;

    let database = state.database.clone();
    let row = tokio::task::spawn_blocking(move || database.tracking_stock_write().update_status(id, status)).await??;
    Ok(Json(TrackingStockView::from(row)))
}

pub async fn delete(State(state): State<AppState>, auth: AuthUser, Path(id): Path<Uuid>) -> Result<axum::http::StatusCode, ApiError> {
    let database = state.database.clone();
    let existing = tokio::task::spawn_blocking(move || database.tracking_stock_read().for_id(id)).await??;
    require_owner(&existing, auth.user_id)?;

    let database = state.database.clone();
    tokio::task::spawn_blocking(move || database.tracking_stock_write().delete(id)).await??;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

async fn set_lifecycle_status(
    state: AppState,
    auth: AuthUser,
    id: Uuid,
    status: model::TrackingStatus,
) -> Result<Json<TrackingStockView>, ApiError> {
    let database = state.database.clone();
    let existing = tokio::task::spawn_blocking(move || database.tracking_stock_read().for_id(id)).await??;
    require_owner(&existing, auth.user_id)?;

    let database = state.database.clone();
    let row = tokio::task::spawn_blocking(move || database.tracking_stock_write().update_status(id, status)).await??;
    Ok(Json(TrackingStockView::from(row)))
}

/// `PATCH /tracking-stocks/{id}/start` - user re-enables a stopped row.
pub async fn start(State(state): State<AppState>, auth: AuthUser, Path(id): Path<Uuid>) -> Result<Json<TrackingStockView>, ApiError> {
    set_lifecycle_status(state, auth, id, model::TrackingStatus::Active).await
}

/// `PATCH /tracking-stocks/{id}/stop` - user pulls a row out of tracking.
pub async fn stop(State(state): State<AppState>, auth: AuthUser, Path(id): Path<Uuid>) -> Result<Json<TrackingStockView>, ApiError> {
    set_lifecycle_status(state, auth, id, model::TrackingStatus::Inactive).await
}
