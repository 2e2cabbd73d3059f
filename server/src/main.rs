//! Trackr Server - HTTP surface and process entry point for the intraday
//! tracking-and-execution runtime.
//!
//! Wires the persisted store, the Kite Connect broker adapter, and the
//! `core` runtime supervisor into one process, then serves the HTTP API
//! described in `SPEC_FULL.md` section 6. Starts and stays up even if the
//! broker has no session yet; `GET /kite/callback` establishes one and the
//! supervisor takes it from there.

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::float_arithmetic,
    clippy::arithmetic_side_effects,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cognitive_complexity,
    clippy::too_many_lines
)]
#![warn(missing_docs, rust_2018_idioms, missing_debug_implementations)]

mod auth;
mod error;
mod routes;
mod state;

use broker_kite::{KiteBroker, KiteTicker};
use core::RuntimeConfig;
use db_sqlite::SqliteDatabase;
use model::{Broker, DatabaseFactory, TokenSubscriber};
use state::AppState;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")))
        .init();

    let config = RuntimeConfig::from_env().unwrap_or_else(|error| {
        tracing::error!(%error, "failed to load runtime configuration");
        std::process::exit(1);
    });

    let database: Arc<dyn DatabaseFactory> = Arc::new(SqliteDatabase::new(&config.database_url));

    let broker = Arc::new(KiteBroker::new(
        config.kite_api_key.clone().unwrap_or_default(),
        config.kite_api_secret.clone().unwrap_or_default(),
        config.token_store_path.clone(),
    ));

    let ticker = Arc::new(KiteTicker::new(broker.clone()));
    let subscriber: Arc<dyn TokenSubscriber> = ticker.clone();
    let broker_for_supervisor: Arc<dyn Broker> = broker.clone();
    let supervisor = core::RuntimeSupervisor::new(database.clone(), broker_for_supervisor, subscriber);
    ticker.bind(supervisor.broadcaster(), supervisor.order_service());

    if broker.is_authenticated() {
        supervisor.on_broker_authenticated().await;
    }

    ticker.start().await;
    supervisor.start().await;

    let state = AppState {
        database,
        supervisor: supervisor.clone(),
        broker,
        jwt_secret: Arc::from(config.jwt_secret.as_str()),
        frontend_url: config.frontend_url.as_deref().map(Arc::from),
    };

    let app = routes::router(state).layer(tower_http::trace::TraceLayer::new_for_http()).layer(
        tower_http::cors::CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any),
    );

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap_or_else(|error| {
        tracing::error!(%error, %addr, "failed to bind HTTP listener");
        std::process::exit(1);
    });
    tracing::info!(%addr, "trackr server listening");

    let shutdown_supervisor = supervisor.clone();
    let shutdown_ticker = ticker.clone();
    let shutdown = async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
        shutdown_ticker.stop().await;
        shutdown_supervisor.stop().await;
    };

    if let Err(error) = axum::serve(listener, app).with_graceful_shutdown(shutdown).await {
        tracing::error!(%error, "server error");
    }
}
