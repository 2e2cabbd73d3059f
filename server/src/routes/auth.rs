//! `/auth/*` and `/user/profile` - signup, login, logout, profile.

use crate::auth::{hash_password, issue_token, verify_password, AuthUser};
use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    full_name: String,
    phone: String,
    password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    phone: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct UserView {
    id: String,
    full_name: String,
    phone: String,
    created_at: chrono::NaiveDateTime,
}

impl From<model::User> for UserView {
    fn from(user: model::User) -> Self {
        UserView {
            id: user.id.to_string(),
            full_name: user.full_name,
            phone: user.phone,
            created_at: user.created_at,
        }
    }
}

pub async fn signup(State(state): State<AppState>, Json(body): Json<SignupRequest>) -> Result<Json<Value>, ApiError> {
    if body.full_name.trim().is_empty() || body.phone.trim().is_empty() {
        return Err(ApiError::Validation("full_name and phone are required".to_string()));
    }
    if body.password.len() < 8 {
        return Err(ApiError::Validation("password must be at least 8 characters".to_string()));
    }

    let database = state.database.clone();
    let phone = body.phone.clone();
    let existing = tokio::task::spawn_blocking(move || database.user_read().for_phone(&phone)).await??;
    if existing.is_some() {
        return Err(ApiError::Conflict("phone is already registered".to_string()));
    }

    let password_hash = hash_password(&body.password)?;
    let database = state.database.clone();
    let user = tokio::task::spawn_blocking(move || database.user_write().create(&body.full_name, &body.phone, &password_hash))
        .await??;

    let token = issue_token(user.id, &state.jwt_secret)?;
    Ok(Json(json!({ "token": token, "user": UserView::from(user) })))
}

pub async fn login(State(state): State<AppState>, Json(body): Json<LoginRequest>) -> Result<Json<Value>, ApiError> {
    let database = state.database.clone();
    let phone = body.phone.clone();
    let user = tokio::task::spawn_blocking(move || database.user_read().for_phone(&phone))
        .await??
        .ok_or(ApiError::Unauthorized)?;

    if !verify_password(&body.password, &user.password_hash) {
        return Err(ApiError::Unauthorized);
    }

    let token = issue_token(user.id, &state.jwt_secret)?;
    Ok(Json(json!({ "token": token, "user": UserView::from(user) })))
}

/// Stateless JWTs carry no server-side session to invalidate; this route
/// exists purely so the frontend has a conventional endpoint to call.
pub async fn logout() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn profile(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Value>, ApiError> {
    let database = state.database.clone();
    let user = tokio::task::spawn_blocking(move || database.user_read().for_id(auth.user_id)).await??;
    Ok(Json(json!(UserView::from(user))))
}
