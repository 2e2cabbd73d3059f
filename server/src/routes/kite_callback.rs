//! `GET /kite/callback?request_token=...` - Kite Connect's login redirect
//! target. Exchanges the one-time `request_token` for a session, then lets
//! the supervisor load today's stocks immediately rather than waiting for
//! the next `MarketOpen` firing.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    request_token: String,
}

pub async fn kite_callback(State(state): State<AppState>, Query(query): Query<CallbackQuery>) -> Result<Response, ApiError> {
    let broker = state.broker.clone();
    let request_token = query.request_token;
    tokio::task::spawn_blocking(move || broker.generate_session(&request_token)).await??;

    state.supervisor.on_broker_authenticated().await;

    match &state.frontend_url {
        Some(frontend_url) => Ok(Redirect::to(&format!("{frontend_url}?kite=connected")).into_response()),
        None => Ok(axum::Json(serde_json::json!({ "status": "connected" })).into_response()),
    }
}
