//! HTTP surface - distilled spec section 6 "External interfaces".

mod auth;
mod health;
mod kite_callback;
mod orders;
mod stocks;
mod tracking_stocks;

use crate::state::AppState;
use axum::routing::{get, patch, post};
use axum::Router;

/// Builds the full router: public routes plus every authenticated route,
/// all sharing one [`AppState`].
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health::health))
        .route("/auth/login", post(auth::login))
        .route("/auth/signup", post(auth::signup))
        .route("/auth/logout", post(auth::logout))
        .route("/kite/callback", get(kite_callback::kite_callback));

    let authenticated = Router::new()
        .route("/user/profile", get(auth::profile))
        .route("/tracking-stocks", post(tracking_stocks::create).get(tracking_stocks::list))
        .route(
            "/tracking-stocks/:id",
            get(tracking_stocks::get)
                .put(tracking_stocks::update_status)
                .delete(tracking_stocks::delete),
        )
        .route("/tracking-stocks/:id/start", patch(tracking_stocks::start))
        .route("/tracking-stocks/:id/stop", patch(tracking_stocks::stop))
        .route("/orders", get(orders::list_for_user))
        .route("/orders/tracking-stocks/:id", get(orders::list_for_tracking_stock))
        .route("/stocks/search", get(stocks::search));

    Router::new().merge(public).merge(authenticated).with_state(state)
}
