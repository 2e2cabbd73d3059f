//! `GET /stocks/search?name=` - substring search over the cached instrument
//! catalogue. Not an `InstrumentRead` method: filtering by a free-text
//! fragment is an HTTP-layer concern, not part of the core crate's thin
//! symbol/token resolver.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::Json;
use core::supervisor::CATALOGUE_EXCHANGES;
use model::Instrument;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    name: String,
}

#[derive(Debug, Serialize)]
struct InstrumentView {
    token: u32,
    symbol: String,
    exchange: String,
}

impl From<Instrument> for InstrumentView {
    fn from(instrument: Instrument) -> Self {
        InstrumentView {
            token: instrument.token,
            symbol: instrument.symbol,
            exchange: instrument.exchange,
        }
    }
}

pub async fn search(State(state): State<AppState>, Query(query): Query<SearchQuery>) -> Result<Json<Vec<InstrumentView>>, ApiError> {
    let needle = query.name.trim().to_uppercase();
    if needle.is_empty() {
        return Ok(Json(Vec::new()));
    }

    let database = state.database.clone();
    let exchanges: Vec<String> = CATALOGUE_EXCHANGES.iter().map(|e| e.to_string()).collect();
    let instruments = tokio::task::spawn_blocking(move || database.instrument_read().for_exchanges(&exchanges)).await??;

    let matches = instruments
        .into_iter()
        .filter(|instrument| instrument.symbol.to_uppercase().contains(&needle))
        .map(InstrumentView::from)
        .collect();
    Ok(Json(matches))
}
