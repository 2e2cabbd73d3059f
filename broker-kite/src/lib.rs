//! Zerodha Kite Connect broker adapter.
//!
//! Splits into two collaborators per `SPEC_FULL.md` section 4.B: [`KiteBroker`]
//! is the synchronous REST facade that implements `model::Broker` (session
//! exchange, LTP lookups, the instrument dump, order placement); [`ticker::KiteTicker`]
//! is the long-lived async websocket connection that streams ticks into the
//! runtime's broadcaster and order-update events into its order service, and
//! implements `model::TokenSubscriber` so the tracking registry can drive its
//! subscribed-token set.

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
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs, rust_2018_idioms, missing_debug_implementations)]

mod error;
mod instruments;
mod market_data;
mod orders;
mod session;
/// Persisted OAuth token pair.
pub mod token_store;
/// The broker's streaming connection adapter.
pub mod ticker;

pub use error::KiteError;
pub use ticker::KiteTicker;

use model::{Broker, Instrument, OrderParams};
use rust_decimal::Decimal;
use std::error::Error;
use std::sync::RwLock;
use token_store::{StoredToken, TokenStore};

const DEFAULT_BASE_URL: &str = "https://api.kite.trade";
const DEFAULT_WS_URL: &str = "wss://ws.kite.trade";

/// Synchronous REST facade over Kite Connect. Holds the current session in
/// memory, backed by a persisted [`TokenStore`] so a restart with a still
/// valid token does not force a fresh login.
pub struct KiteBroker {
    http: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    token_store: TokenStore,
    session: RwLock<Option<StoredToken>>,
}

impl std::fmt::Debug for KiteBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KiteBroker")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

impl KiteBroker {
    /// Builds a broker over `api_key`/`api_secret`, loading any previously
    /// persisted session from `token_store_path`.
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>, token_store_path: impl Into<std::path::PathBuf>) -> Self {
        Self::with_base_url(api_key, api_secret, token_store_path, DEFAULT_BASE_URL)
    }

    /// Builds a broker against a non-default base URL. Exists so tests can
    /// point the client at a local mock server.
    pub fn with_base_url(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        token_store_path: impl Into<std::path::PathBuf>,
        base_url: impl Into<String>,
    ) -> Self {
        let token_store = TokenStore::new(token_store_path);
        let session = token_store.load();
        KiteBroker {
            http: reqwest::blocking::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            token_store,
            session: RwLock::new(session),
        }
    }

    /// Whether a session - persisted or freshly generated - is currently
    /// held in memory. Used by the runtime supervisor to decide whether to
    /// wait for `GET /kite/callback` before loading tracked stocks.
    pub fn is_authenticated(&self) -> bool {
        self.session().is_some()
    }

    fn session(&self) -> Option<StoredToken> {
        self.session
            .read()
            .unwrap_or_else(|e| {
                tracing::error!("kite session lock poisoned: {e}");
                std::process::exit(1);
            })
            .clone()
    }

    fn auth_header(&self) -> Result<String, KiteError> {
        let session = self.session().ok_or(KiteError::NotAuthenticated)?;
        Ok(format!("token {}:{}", self.api_key, session.access_token))
    }

    /// Builds the ticker websocket endpoint carrying the current session's
    /// access token, or `None` if no session is established yet. Read fresh
    /// by [`ticker::KiteTicker`] on every connect/reconnect attempt, since
    /// the access token can change between attempts (a fresh login after a
    /// forced logout) without the ticker itself being reconstructed.
    pub fn ws_url(&self) -> Option<String> {
        let session = self.session()?;
        Some(format!("{DEFAULT_WS_URL}?api_key={}&access_token={}", self.api_key, session.access_token))
    }
}

impl Broker for KiteBroker {
    fn generate_session(&self, request_token: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
        let token = session::generate_session(&self.http, &self.base_url, &self.api_key, &self.api_secret, request_token)?;
        self.token_store.store(&token)?;
        *self.session.write().unwrap_or_else(|e| {
            tracing::error!("kite session lock poisoned: {e}");
            std::process::exit(1);
        }) = Some(token);
        Ok(())
    }

    fn get_ltp(&self, tokens: &[u32]) -> Result<Vec<(u32, Decimal)>, Box<dyn Error + Send + Sync>> {
        let auth = self.auth_header()?;
        Ok(market_data::get_ltp(&self.http, &self.base_url, &auth, tokens)?)
    }

    fn get_instruments(&self, exchanges: &[String]) -> Result<Vec<Instrument>, Box<dyn Error + Send + Sync>> {
        let auth = self.auth_header()?;
        Ok(instruments::get_instruments(&self.http, &self.base_url, &auth, exchanges)?)
    }

    fn place_order(&self, params: &OrderParams) -> Result<String, Box<dyn Error + Send + Sync>> {
        let auth = self.auth_header()?;
        Ok(orders::place_order(&self.http, &self.base_url, &auth, params)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_broker_with_no_stored_session_is_not_authenticated() {
        let dir = std::env::temp_dir().join(format!("trackr-kite-broker-test-{}", std::process::id()));
        let broker = KiteBroker::new("key", "secret", dir.join("token.json"));
        assert!(!broker.is_authenticated());
        assert!(broker.get_ltp(&[1]).is_err());
    }
}
