use crate::workers::{InstrumentDB, OrderDB, TrackingStockDB, UserDB};
use diesel::prelude::*;
use diesel::sql_query;
use model::database::{
    DatabaseFactory, InstrumentRead, InstrumentWrite, OrderRead, OrderWrite, TrackingStockRead,
    TrackingStockWrite, UserRead, UserWrite,
};
use std::error::Error;
use std::sync::{Arc, Mutex};

/// SQLite database implementation providing access to all database operations.
pub struct SqliteDatabase {
    connection: Arc<Mutex<SqliteConnection>>,
}

impl std::fmt::Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDatabase")
            .field("connection", &"Arc<Mutex<SqliteConnection>>")
            .finish()
    }
}

impl DatabaseFactory for SqliteDatabase {
    fn tracking_stock_read(&self) -> Box<dyn TrackingStockRead> {
        Box::new(TrackingStockDB {
            connection: self.connection.clone(),
        })
    }

    fn tracking_stock_write(&self) -> Box<dyn TrackingStockWrite> {
        Box::new(TrackingStockDB {
            connection: self.connection.clone(),
        })
    }

    fn order_read(&self) -> Box<dyn OrderRead> {
        Box::new(OrderDB {
            connection: self.connection.clone(),
        })
    }

    fn order_write(&self) -> Box<dyn OrderWrite> {
        Box::new(OrderDB {
            connection: self.connection.clone(),
        })
    }

    fn instrument_read(&self) -> Box<dyn InstrumentRead> {
        Box::new(InstrumentDB {
            connection: self.connection.clone(),
        })
    }

    fn instrument_write(&self) -> Box<dyn InstrumentWrite> {
        Box::new(InstrumentDB {
            connection: self.connection.clone(),
        })
    }

    fn user_read(&self) -> Box<dyn UserRead> {
        Box::new(UserDB {
            connection: self.connection.clone(),
        })
    }

    fn user_write(&self) -> Box<dyn UserWrite> {
        Box::new(UserDB {
            connection: self.connection.clone(),
        })
    }

    fn begin_savepoint(&mut self, name: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.execute_savepoint_statement("SAVEPOINT", name)
    }

    fn release_savepoint(&mut self, name: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.execute_savepoint_statement("RELEASE SAVEPOINT", name)
    }

    fn rollback_to_savepoint(&mut self, name: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.execute_savepoint_statement("ROLLBACK TO SAVEPOINT", name)
    }
}

impl SqliteDatabase {
    fn validate_savepoint_name(name: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
        if name.is_empty() {
            return Err("savepoint name cannot be empty".into());
        }
        if !name.bytes().all(|c| c.is_ascii_alphanumeric() || c == b'_') {
            return Err(format!(
                "invalid savepoint name '{name}': only ASCII alphanumeric and '_' are allowed"
            )
            .into());
        }
        Ok(())
    }

    fn execute_savepoint_statement(
        &mut self,
        statement: &str,
        savepoint: &str,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        Self::validate_savepoint_name(savepoint)?;
        let sql = format!("{statement} {savepoint}");
        let mut connection = self.connection.lock().unwrap_or_else(|e| {
            eprintln!("Failed to acquire connection lock: {e}");
            std::process::exit(1);
        });
        sql_query(sql).execute(&mut *connection)?;
        Ok(())
    }

    fn configure_connection(connection: &mut SqliteConnection) {
        // SQLite does not enable FK constraints by default; every FK in
        // schema.rs (tracking_stocks -> users, orders -> tracking_stocks)
        // depends on this.
        sql_query("PRAGMA foreign_keys = ON;")
            .execute(connection)
            .unwrap_or_else(|e| {
                eprintln!("Failed to enable foreign_keys pragma: {e}");
                std::process::exit(1);
            });
    }

    /// Creates a new SQLite database connection from a URL, running pending
    /// migrations if the database file does not already exist.
    pub fn new(url: &str) -> Self {
        let connection: SqliteConnection = Self::establish_connection(url);
        SqliteDatabase {
            connection: Arc::new(Mutex::new(connection)),
        }
    }

    /// Creates a new SQLite database wrapper from an existing shared connection.
    pub fn new_from(connection: Arc<Mutex<SqliteConnection>>) -> Self {
        SqliteDatabase { connection }
    }

    #[doc(hidden)]
    pub fn new_in_memory() -> Self {
        use diesel_migrations::*;
        pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();
        // Only used for tests, so panics here are acceptable.
        let mut connection = SqliteConnection::establish(":memory:").unwrap_or_else(|e| {
            eprintln!("Failed to establish in-memory database connection: {e}");
            std::process::exit(1);
        });
        connection
            .run_pending_migrations(MIGRATIONS)
            .unwrap_or_else(|e| {
                eprintln!("Failed to run migrations on in-memory database: {e}");
                std::process::exit(1);
            });
        Self::configure_connection(&mut connection);
        connection.begin_test_transaction().unwrap_or_else(|e| {
            eprintln!("Failed to begin test transaction: {e}");
            std::process::exit(1);
        });
        SqliteDatabase {
            connection: Arc::new(Mutex::new(connection)),
        }
    }

    /// Establishes a connection to the SQLite database, running migrations
    /// only when the database file is newly created.
    fn establish_connection(database_url: &str) -> SqliteConnection {
        let db_exists = std::path::Path::new(database_url).exists();
        let mut connection = SqliteConnection::establish(database_url).unwrap_or_else(|e| {
            eprintln!("Error connecting to {database_url}: {e}");
            std::process::exit(1);
        });

        if !db_exists {
            use diesel_migrations::*;
            pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();
            connection
                .run_pending_migrations(MIGRATIONS)
                .unwrap_or_else(|e| {
                    eprintln!("Failed to run migrations on new database: {e}");
                    std::process::exit(1);
                });
        }

        Self::configure_connection(&mut connection);
        connection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::database::NewTrackingStock;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    #[test]
    fn savepoint_rejects_unsafe_names() {
        let mut db = SqliteDatabase::new_in_memory();
        let err = db
            .begin_savepoint("robert'; drop table users; --")
            .expect_err("unsafe savepoint name must be rejected");
        assert!(err.to_string().contains("invalid savepoint name"));
    }

    #[test]
    fn savepoint_rollback_discards_writes() {
        let mut db = SqliteDatabase::new_in_memory();
        let user = db
            .user_write()
            .create("Jane Doe", "+911234567890", "hash")
            .unwrap();

        db.begin_savepoint("before_create").unwrap();
        db.tracking_stock_write()
            .create(NewTrackingStock {
                user_id: user.id,
                stock_symbol: "INFY".to_string(),
                exchange: "NSE".to_string(),
                instrument_token: 42,
                target: dec!(5),
                stop_loss: dec!(3),
                quantity: 10,
            })
            .unwrap();
        db.rollback_to_savepoint("before_create").unwrap();

        assert!(db
            .tracking_stock_read()
            .for_token(42)
            .unwrap()
            .is_none());
    }

    #[test]
    fn factory_wires_all_readers_and_writers_to_the_same_connection() {
        let db = SqliteDatabase::new_in_memory();
        let user = db
            .user_write()
            .create("Jane Doe", "+911234567891", "hash")
            .unwrap();
        assert_eq!(
            db.user_read().for_id(user.id).unwrap().phone,
            "+911234567891"
        );

        let _ = Uuid::new_v4();
    }
}
