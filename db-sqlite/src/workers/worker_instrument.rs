use crate::error::{token_from_i32, token_to_i32, ConversionError, IntoDomainModel, IntoDomainModels};
use crate::schema::instruments;
use chrono::Utc;
use diesel::prelude::*;
use diesel::OptionalExtension;
use model::database::{InstrumentRead, InstrumentWrite};
use model::Instrument;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tracing::error;

/// Database worker for instrument catalogue operations.
pub struct InstrumentDB {
    pub connection: Arc<Mutex<SqliteConnection>>,
}

impl std::fmt::Debug for InstrumentDB {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstrumentDB")
            .field("connection", &"Arc<Mutex<SqliteConnection>>")
            .finish()
    }
}

impl InstrumentRead for InstrumentDB {
    fn resolve(&mut self, symbol: &str, exchange: &str) -> Result<Option<u32>, Box<dyn Error + Send + Sync>> {
        let connection: &mut SqliteConnection = &mut self.connection.lock().unwrap_or_else(|e| {
            eprintln!("Failed to acquire connection lock: {e}");
            std::process::exit(1);
        });
        let token = instruments::table
            .filter(instruments::symbol.eq(symbol))
            .filter(instruments::exchange.eq(exchange))
            .select(instruments::token)
            .first::<i32>(connection)
            .optional()
            .map_err(|error| {
                error!("Error resolving instrument: {:?}", error);
                error
            })?;
        token.map(token_from_i32).transpose().map_err(Into::into)
    }

    fn for_exchanges(&mut self, exchanges: &[String]) -> Result<Vec<Instrument>, Box<dyn Error + Send + Sync>> {
        let connection: &mut SqliteConnection = &mut self.connection.lock().unwrap_or_else(|e| {
            eprintln!("Failed to acquire connection lock: {e}");
            std::process::exit(1);
        });
        instruments::table
            .filter(instruments::exchange.eq_any(exchanges))
            .load::<InstrumentSQLite>(connection)
            .map_err(|error| {
                error!("Error reading instrument catalogue: {:?}", error);
                error
            })?
            .into_domain_models()
    }
}

impl InstrumentWrite for InstrumentDB {
    fn replace_for_exchange(
        &mut self,
        exchange: &str,
        fresh: &[Instrument],
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let now = Utc::now().naive_utc();
        let connection: &mut SqliteConnection = &mut self.connection.lock().unwrap_or_else(|e| {
            eprintln!("Failed to acquire connection lock: {e}");
            std::process::exit(1);
        });

        connection.transaction::<(), Box<dyn Error + Send + Sync>, _>(|conn| {
            diesel::delete(instruments::table.filter(instruments::exchange.eq(exchange)))
                .execute(conn)
                .map_err(|error| {
                    error!("Error clearing instrument catalogue: {:?}", error);
                    error
                })?;

            for instrument in fresh {
                let row = InstrumentSQLite {
                    token: token_to_i32(instrument.token)?,
                    symbol: instrument.symbol.clone(),
                    exchange: instrument.exchange.clone(),
                    updated_at: now,
                };
                diesel::insert_into(instruments::table)
                    .values(&row)
                    .execute(conn)
                    .map_err(|error| {
                        error!("Error inserting instrument: {:?}", error);
                        error
                    })?;
            }
            Ok(())
        })
    }
}

#[derive(Debug, Queryable, Identifiable, AsChangeset, Insertable)]
#[diesel(table_name = instruments)]
#[diesel(primary_key(token))]
struct InstrumentSQLite {
    token: i32,
    symbol: String,
    exchange: String,
    updated_at: chrono::NaiveDateTime,
}

impl TryFrom<InstrumentSQLite> for Instrument {
    type Error = ConversionError;

    fn try_from(value: InstrumentSQLite) -> Result<Self, Self::Error> {
        Ok(Instrument {
            token: token_from_i32(value.token)?,
            symbol: value.symbol,
            exchange: value.exchange,
        })
    }
}

impl IntoDomainModel<Instrument> for InstrumentSQLite {
    fn into_domain_model(self) -> Result<Instrument, Box<dyn Error + Send + Sync>> {
        self.try_into().map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel_migrations::*;

    pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

    fn establish_connection() -> SqliteConnection {
        let mut connection = SqliteConnection::establish(":memory:").unwrap();
        connection.run_pending_migrations(MIGRATIONS).unwrap();
        connection.begin_test_transaction().unwrap();
        connection
    }

    #[test]
    fn replace_for_exchange_clears_stale_rows() {
        let conn = establish_connection();
        let mut db = InstrumentDB {
            connection: Arc::new(Mutex::new(conn)),
        };
        db.replace_for_exchange(
            "NSE",
            &[Instrument {
                token: 1,
                symbol: "INFY".to_string(),
                exchange: "NSE".to_string(),
            }],
        )
        .unwrap();
        assert_eq!(db.resolve("INFY", "NSE").unwrap(), Some(1));

        db.replace_for_exchange(
            "NSE",
            &[Instrument {
                token: 2,
                symbol: "TCS".to_string(),
                exchange: "NSE".to_string(),
            }],
        )
        .unwrap();
        assert_eq!(db.resolve("INFY", "NSE").unwrap(), None);
        assert_eq!(db.resolve("TCS", "NSE").unwrap(), Some(2));
    }

    #[test]
    fn resolve_returns_none_for_unknown_pair() {
        let conn = establish_connection();
        let mut db = InstrumentDB {
            connection: Arc::new(Mutex::new(conn)),
        };
        assert_eq!(db.resolve("UNKNOWN", "NSE").unwrap(), None);
    }
}
