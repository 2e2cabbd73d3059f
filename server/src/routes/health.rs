//! `GET /health` - unauthenticated liveness probe.

use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "broker_ready": state.supervisor.is_broker_ready(),
        "tracked": state.supervisor.tracked_count(),
    }))
}
