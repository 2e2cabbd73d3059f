use crate::error::{
    decimal_from_text, decimal_to_text, token_from_i32, token_to_i32, ConversionError,
    IntoDomainModel, IntoDomainModels,
};
use crate::schema::tracking_stocks;
use chrono::Utc;
use diesel::prelude::*;
use diesel::OptionalExtension;
use model::database::{NewTrackingStock, TrackingStockRead, TrackingStockWrite};
use model::{TrackingStatus, TrackingStockRow};
use rust_decimal::Decimal;
use std::error::Error;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::error;
use uuid::Uuid;

/// Database worker for tracking-stock operations.
pub struct TrackingStockDB {
    pub connection: Arc<Mutex<SqliteConnection>>,
}

impl std::fmt::Debug for TrackingStockDB {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingStockDB")
            .field("connection", &"Arc<Mutex<SqliteConnection>>")
            .finish()
    }
}

impl TrackingStockRead for TrackingStockDB {
    fn for_id(&mut self, id: Uuid) -> Result<TrackingStockRow, Box<dyn Error + Send + Sync>> {
        let connection: &mut SqliteConnection = &mut self.connection.lock().unwrap_or_else(|e| {
            eprintln!("Failed to acquire connection lock: {e}");
            std::process::exit(1);
        });
        tracking_stocks::table
            .filter(tracking_stocks::id.eq(id.to_string()))
            .filter(tracking_stocks::deleted_at.is_null())
            .first::<TrackingStockSQLite>(connection)
            .map_err(|error| {
                error!("Error reading tracking stock {}: {:?}", id, error);
                error
            })?
            .into_domain_model()
    }

    fn for_token(&mut self, token: u32) -> Result<Option<TrackingStockRow>, Box<dyn Error + Send + Sync>> {
        let token = token_to_i32(token)?;
        let connection: &mut SqliteConnection = &mut self.connection.lock().unwrap_or_else(|e| {
            eprintln!("Failed to acquire connection lock: {e}");
            std::process::exit(1);
        });
        tracking_stocks::table
            .filter(tracking_stocks::instrument_token.eq(token))
            .filter(tracking_stocks::deleted_at.is_null())
            .first::<TrackingStockSQLite>(connection)
            .optional()
            .map_err(|error| {
                error!("Error resolving tracking stock for token {}: {:?}", token, error);
                error
            })?
            .map(IntoDomainModel::into_domain_model)
            .transpose()
    }

    fn for_user(&mut self, user_id: Uuid) -> Result<Vec<TrackingStockRow>, Box<dyn Error + Send + Sync>> {
        let connection: &mut SqliteConnection = &mut self.connection.lock().unwrap_or_else(|e| {
            eprintln!("Failed to acquire connection lock: {e}");
            std::process::exit(1);
        });
        tracking_stocks::table
            .filter(tracking_stocks::user_id.eq(user_id.to_string()))
            .filter(tracking_stocks::deleted_at.is_null())
            .load::<TrackingStockSQLite>(connection)
            .map_err(|error| {
                error!("Error reading tracking stocks for user {}: {:?}", user_id, error);
                error
            })?
            .into_domain_models()
    }

    fn with_status(
        &mut self,
        statuses: &[TrackingStatus],
    ) -> Result<Vec<TrackingStockRow>, Box<dyn Error + Send + Sync>> {
        let statuses: Vec<String> = statuses.iter().map(ToString::to_string).collect();
        let connection: &mut SqliteConnection = &mut self.connection.lock().unwrap_or_else(|e| {
            eprintln!("Failed to acquire connection lock: {e}");
            std::process::exit(1);
        });
        tracking_stocks::table
            .filter(tracking_stocks::status.eq_any(statuses))
            .filter(tracking_stocks::deleted_at.is_null())
            .load::<TrackingStockSQLite>(connection)
            .map_err(|error| {
                error!("Error reading tracking stocks by status: {:?}", error);
                error
            })?
            .into_domain_models()
    }
}

impl TrackingStockWrite for TrackingStockDB {
    fn create(&mut self, draft: NewTrackingStock) -> Result<TrackingStockRow, Box<dyn Error + Send + Sync>> {
        let now = Utc::now().naive_utc();
        let row = TrackingStockSQLite {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
            user_id: draft.user_id.to_string(),
            stock_symbol: draft.stock_symbol,
            exchange: draft.exchange,
            instrument_token: token_to_i32(draft.instrument_token)?,
            base_price: decimal_to_text(Decimal::ZERO),
            target: decimal_to_text(draft.target),
            stop_loss: decimal_to_text(draft.stop_loss),
            quantity: i32::try_from(draft.quantity)
                .map_err(|_| "quantity does not fit in i32")?,
            status: TrackingStatus::Active.to_string(),
        };
        let connection: &mut SqliteConnection = &mut self.connection.lock().unwrap_or_else(|e| {
            eprintln!("Failed to acquire connection lock: {e}");
            std::process::exit(1);
        });
        diesel::insert_into(tracking_stocks::table)
            .values(&row)
            .execute(connection)
            .map_err(|error| {
                error!("Error creating tracking stock: {:?}", error);
                error
            })?;
        row.into_domain_model()
    }

    fn update_status(
        &mut self,
        id: Uuid,
        status: TrackingStatus,
    ) -> Result<TrackingStockRow, Box<dyn Error + Send + Sync>> {
        let now = Utc::now().naive_utc();
        let connection: &mut SqliteConnection = &mut self.connection.lock().unwrap_or_else(|e| {
            eprintln!("Failed to acquire connection lock: {e}");
            std::process::exit(1);
        });
        diesel::update(tracking_stocks::table.filter(tracking_stocks::id.eq(id.to_string())))
            .set((
                tracking_stocks::status.eq(status.to_string()),
                tracking_stocks::updated_at.eq(now),
            ))
            .execute(connection)
            .map_err(|error| {
                error!("Error updating tracking stock status {}: {:?}", id, error);
                error
            })?;
        tracking_stocks::table
            .filter(tracking_stocks::id.eq(id.to_string()))
            .first::<TrackingStockSQLite>(connection)?
            .into_domain_model()
    }

    fn update_base_price(
        &mut self,
        id: Uuid,
        base_price: Decimal,
    ) -> Result<TrackingStockRow, Box<dyn Error + Send + Sync>> {
        let now = Utc::now().naive_utc();
        let connection: &mut SqliteConnection = &mut self.connection.lock().unwrap_or_else(|e| {
            eprintln!("Failed to acquire connection lock: {e}");
            std::process::exit(1);
        });
        diesel::update(tracking_stocks::table.filter(tracking_stocks::id.eq(id.to_string())))
            .set((
                tracking_stocks::base_price.eq(decimal_to_text(base_price)),
                tracking_stocks::updated_at.eq(now),
            ))
            .execute(connection)
            .map_err(|error| {
                error!("Error updating base price for tracking stock {}: {:?}", id, error);
                error
            })?;
        tracking_stocks::table
            .filter(tracking_stocks::id.eq(id.to_string()))
            .first::<TrackingStockSQLite>(connection)?
            .into_domain_model()
    }

    fn delete(&mut self, id: Uuid) -> Result<(), Box<dyn Error + Send + Sync>> {
        let now = Utc::now().naive_utc();
        let connection: &mut SqliteConnection = &mut self.connection.lock().unwrap_or_else(|e| {
            eprintln!("Failed to acquire connection lock: {e}");
            std::process::exit(1);
        });
        diesel::update(tracking_stocks::table.filter(tracking_stocks::id.eq(id.to_string())))
            .set((
                tracking_stocks::deleted_at.eq(Some(now)),
                tracking_stocks::status.eq(TrackingStatus::Inactive.to_string()),
                tracking_stocks::updated_at.eq(now),
            ))
            .execute(connection)
            .map_err(|error| {
                error!("Error deleting tracking stock {}: {:?}", id, error);
                error
            })?;
        Ok(())
    }
}

#[derive(Debug, Queryable, Identifiable, AsChangeset, Insertable)]
#[diesel(table_name = tracking_stocks)]
struct TrackingStockSQLite {
    id: String,
    created_at: chrono::NaiveDateTime,
    updated_at: chrono::NaiveDateTime,
    deleted_at: Option<chrono::NaiveDateTime>,
    user_id: String,
    stock_symbol: String,
    exchange: String,
    instrument_token: i32,
    base_price: String,
    target: String,
    stop_loss: String,
    quantity: i32,
    status: String,
}

impl TryFrom<TrackingStockSQLite> for TrackingStockRow {
    type Error = ConversionError;

    fn try_from(value: TrackingStockSQLite) -> Result<Self, Self::Error> {
        Ok(TrackingStockRow {
            id: Uuid::from_str(&value.id)
                .map_err(|_| ConversionError::new("id", "invalid uuid"))?,
            user_id: Uuid::from_str(&value.user_id)
                .map_err(|_| ConversionError::new("user_id", "invalid uuid"))?,
            stock_symbol: value.stock_symbol,
            exchange: value.exchange,
            instrument_token: token_from_i32(value.instrument_token)?,
            target: decimal_from_text(&value.target)?,
            stop_loss: decimal_from_text(&value.stop_loss)?,
            quantity: u32::try_from(value.quantity)
                .map_err(|_| ConversionError::new("quantity", "negative quantity"))?,
            status: TrackingStatus::from_str(&value.status)
                .map_err(|_| ConversionError::new("status", "unknown status"))?,
            created_at: value.created_at,
        })
    }
}

impl IntoDomainModel<TrackingStockRow> for TrackingStockSQLite {
    fn into_domain_model(self) -> Result<TrackingStockRow, Box<dyn Error + Send + Sync>> {
        self.try_into().map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel_migrations::*;
    use rust_decimal_macros::dec;

    pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

    fn establish_connection() -> SqliteConnection {
        let mut connection = SqliteConnection::establish(":memory:").unwrap();
        connection.run_pending_migrations(MIGRATIONS).unwrap();
        connection.begin_test_transaction().unwrap();
        connection
    }

    fn seed_user(connection: &mut SqliteConnection) -> Uuid {
        use crate::schema::users;
        let id = Uuid::new_v4();
        diesel::insert_into(users::table)
            .values((
                users::id.eq(id.to_string()),
                users::created_at.eq(Utc::now().naive_utc()),
                users::full_name.eq("Test User"),
                users::phone.eq(id.to_string()),
                users::password_hash.eq("hash"),
            ))
            .execute(connection)
            .unwrap();
        id
    }

    #[test]
    fn create_defaults_to_active_with_zero_base_price() {
        let mut conn = establish_connection();
        let user_id = seed_user(&mut conn);
        let mut db = TrackingStockDB {
            connection: Arc::new(Mutex::new(conn)),
        };
        let row = db
            .create(NewTrackingStock {
                user_id,
                stock_symbol: "INFY".to_string(),
                exchange: "NSE".to_string(),
                instrument_token: 42,
                target: dec!(5),
                stop_loss: dec!(3),
                quantity: 10,
            })
            .unwrap();
        assert_eq!(row.status, TrackingStatus::Active);
        assert_eq!(row.target, dec!(5));
        assert_eq!(db.for_token(42).unwrap().map(|r| r.id), Some(row.id));
    }

    #[test]
    fn update_status_preserves_other_fields() {
        let mut conn = establish_connection();
        let user_id = seed_user(&mut conn);
        let mut db = TrackingStockDB {
            connection: Arc::new(Mutex::new(conn)),
        };
        let row = db
            .create(NewTrackingStock {
                user_id,
                stock_symbol: "INFY".to_string(),
                exchange: "NSE".to_string(),
                instrument_token: 42,
                target: dec!(5),
                stop_loss: dec!(3),
                quantity: 10,
            })
            .unwrap();
        let updated = db.update_status(row.id, TrackingStatus::AutoInactive).unwrap();
        assert_eq!(updated.status, TrackingStatus::AutoInactive);
        assert_eq!(updated.target, dec!(5));
        assert_eq!(updated.quantity, 10);
    }

    #[test]
    fn delete_excludes_row_from_subsequent_reads() {
        let mut conn = establish_connection();
        let user_id = seed_user(&mut conn);
        let mut db = TrackingStockDB {
            connection: Arc::new(Mutex::new(conn)),
        };
        let row = db
            .create(NewTrackingStock {
                user_id,
                stock_symbol: "INFY".to_string(),
                exchange: "NSE".to_string(),
                instrument_token: 42,
                target: dec!(5),
                stop_loss: dec!(3),
                quantity: 10,
            })
            .unwrap();
        db.delete(row.id).unwrap();
        assert!(db.for_token(42).unwrap().is_none());
        assert!(db.for_id(row.id).is_err());
    }
}
