//! Thin symbol/exchange -> token lookup - distilled spec section 4.J.
//!
//! The catalogue's own data-fetch path (the broker's instrument dump) is out
//! of scope; this crate only consumes the symbol -> token lookup it backs.
//! The lookup is served directly from the `instruments` table rather than an
//! in-memory map, since `FetchInstruments` already keeps that table current
//! and a second cache would just be another place for the two to drift.

use model::database::DatabaseFactory;
use std::sync::Arc;
use tracing::info;

/// Resolves `(symbol, exchange)` pairs to broker-assigned instrument tokens,
/// and refreshes the underlying catalogue from the broker.
pub struct InstrumentCatalogue {
    database: Arc<dyn DatabaseFactory>,
}

impl std::fmt::Debug for InstrumentCatalogue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstrumentCatalogue").finish()
    }
}

impl InstrumentCatalogue {
    /// Constructs a catalogue backed by `database`.
    pub fn new(database: Arc<dyn DatabaseFactory>) -> Self {
        InstrumentCatalogue { database }
    }

    /// Resolves a trading symbol on an exchange to its instrument token.
    /// Returns `None` if the symbol is unknown to the stored catalogue.
    pub async fn resolve(&self, symbol: &str, exchange: &str) -> Result<Option<u32>, Box<dyn std::error::Error + Send + Sync>> {
        let database = self.database.clone();
        let symbol = symbol.to_string();
        let exchange = exchange.to_string();
        tokio::task::spawn_blocking(move || database.instrument_read().resolve(&symbol, &exchange))
            .await?
    }

    /// Replaces the stored catalogue for `exchange` with `instruments`, as
    /// called by the `FetchInstruments` scheduler job.
    pub async fn replace_for_exchange(
        &self,
        exchange: &str,
        instruments: Vec<model::Instrument>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let database = self.database.clone();
        let exchange = exchange.to_string();
        let count = instruments.len();
        let exchange_for_job = exchange.clone();
        tokio::task::spawn_blocking(move || {
            database
                .instrument_write()
                .replace_for_exchange(&exchange_for_job, &instruments)
        })
        .await??;
        info!(exchange = %exchange, count, "instrument catalogue refreshed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use db_sqlite::SqliteDatabase;
    use model::Instrument;

    #[tokio::test]
    async fn replace_then_resolve_roundtrips() {
        let database: Arc<dyn DatabaseFactory> = Arc::new(SqliteDatabase::new_in_memory());
        let catalogue = InstrumentCatalogue::new(database);
        catalogue
            .replace_for_exchange(
                "NSE",
                vec![Instrument {
                    token: 42,
                    symbol: "INFY".to_string(),
                    exchange: "NSE".to_string(),
                }],
            )
            .await
            .unwrap();
        assert_eq!(catalogue.resolve("INFY", "NSE").await.unwrap(), Some(42));
    }

    #[tokio::test]
    async fn resolve_returns_none_for_unknown_symbol() {
        let database: Arc<dyn DatabaseFactory> = Arc::new(SqliteDatabase::new_in_memory());
        let catalogue = InstrumentCatalogue::new(database);
        assert_eq!(catalogue.resolve("UNKNOWN", "NSE").await.unwrap(), None);
    }
}
