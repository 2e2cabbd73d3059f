use crate::error::{
    decimal_from_text, decimal_to_text, ConversionError, IntoDomainModel,
};
use crate::schema::orders;
use chrono::Utc;
use diesel::prelude::*;
use diesel::OptionalExtension;
use model::database::{OrderRead, OrderWrite};
use model::{BrokerOrderUpdate, Order, OrderEventType, OrderStatus, OrderType, TransactionType};
use std::error::Error;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::error;
use uuid::Uuid;

/// Database worker for order operations.
pub struct OrderDB {
    pub connection: Arc<Mutex<SqliteConnection>>,
}

impl std::fmt::Debug for OrderDB {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderDB")
            .field("connection", &"Arc<Mutex<SqliteConnection>>")
            .finish()
    }
}

impl OrderRead for OrderDB {
    fn for_id(&mut self, id: Uuid) -> Result<Order, Box<dyn Error + Send + Sync>> {
        let connection: &mut SqliteConnection = &mut self.connection.lock().unwrap_or_else(|e| {
            eprintln!("Failed to acquire connection lock: {e}");
            std::process::exit(1);
        });
        orders::table
            .filter(orders::id.eq(id.to_string()))
            .first::<OrderSQLite>(connection)
            .map_err(|error| {
                error!("Error reading order {}: {:?}", id, error);
                error
            })?
            .into_domain_model()
    }

    fn for_broker_order_id(
        &mut self,
        broker_order_id: &str,
    ) -> Result<Option<Order>, Box<dyn Error + Send + Sync>> {
        let connection: &mut SqliteConnection = &mut self.connection.lock().unwrap_or_else(|e| {
            eprintln!("Failed to acquire connection lock: {e}");
            std::process::exit(1);
        });
        orders::table
            .filter(orders::broker_order_id.eq(broker_order_id))
            .first::<OrderSQLite>(connection)
            .optional()
            .map_err(|error| {
                error!(
                    "Error resolving order for broker order id {}: {:?}",
                    broker_order_id, error
                );
                error
            })?
            .map(IntoDomainModel::into_domain_model)
            .transpose()
    }

    fn for_tracking_stock(
        &mut self,
        tracking_stock_id: Uuid,
        page: i64,
        limit: i64,
    ) -> Result<Vec<Order>, Box<dyn Error + Send + Sync>> {
        let connection: &mut SqliteConnection = &mut self.connection.lock().unwrap_or_else(|e| {
            eprintln!("Failed to acquire connection lock: {e}");
            std::process::exit(1);
        });
        orders::table
            .filter(orders::tracking_stock_id.eq(tracking_stock_id.to_string()))
            .order(orders::placed_at.desc())
            .limit(limit)
            .offset(page.saturating_mul(limit))
            .load::<OrderSQLite>(connection)
            .map_err(|error| {
                error!("Error listing orders for tracking stock {}: {:?}", tracking_stock_id, error);
                error
            })?
            .into_iter()
            .map(IntoDomainModel::into_domain_model)
            .collect()
    }

    fn for_user(&mut self, user_id: Uuid, page: i64, limit: i64) -> Result<Vec<Order>, Box<dyn Error + Send + Sync>> {
        use crate::schema::tracking_stocks;

        let connection: &mut SqliteConnection = &mut self.connection.lock().unwrap_or_else(|e| {
            eprintln!("Failed to acquire connection lock: {e}");
            std::process::exit(1);
        });
        orders::table
            .inner_join(tracking_stocks::table)
            .filter(tracking_stocks::user_id.eq(user_id.to_string()))
            .select(orders::all_columns)
            .order(orders::placed_at.desc())
            .limit(limit)
            .offset(page.saturating_mul(limit))
            .load::<OrderSQLite>(connection)
            .map_err(|error| {
                error!("Error listing orders for user {}: {:?}", user_id, error);
                error
            })?
            .into_iter()
            .map(IntoDomainModel::into_domain_model)
            .collect()
    }
}

impl OrderWrite for OrderDB {
    fn create(&mut self, order: &Order) -> Result<Order, Box<dyn Error + Send + Sync>> {
        let row = OrderSQLite {
            id: order.id.to_string(),
            created_at: order.placed_at,
            updated_at: order.updated_at,
            tracking_stock_id: order.tracking_stock_id.to_string(),
            broker_order_id: order.broker_order_id.clone(),
            exchange_order_id: order.exchange_order_id.clone(),
            parent_order_id: order.parent_order_id.clone(),
            order_type: order.order_type.to_string(),
            event_type: order.event_type.to_string(),
            transaction_type: order.transaction_type.to_string(),
            exchange: order.exchange.clone(),
            product: order.product.clone(),
            base_price: decimal_to_text(order.base_price),
            quantity: i32::try_from(order.quantity).map_err(|_| "quantity does not fit in i32")?,
            trigger_price: decimal_to_text(order.trigger_price),
            purchase_price: order.purchase_price.map(decimal_to_text),
            status: order.status.to_string(),
            status_message: order.status_message.clone(),
            placed_at: order.placed_at,
        };
        let connection: &mut SqliteConnection = &mut self.connection.lock().unwrap_or_else(|e| {
            eprintln!("Failed to acquire connection lock: {e}");
            std::process::exit(1);
        });
        diesel::insert_into(orders::table)
            .values(&row)
            .execute(connection)
            .map_err(|error| {
                error!("Error creating order: {:?}", error);
                error
            })?;
        row.into_domain_model()
    }

    fn attach_broker_order_id(
        &mut self,
        id: Uuid,
        broker_order_id: &str,
    ) -> Result<Order, Box<dyn Error + Send + Sync>> {
        let now = Utc::now().naive_utc();
        let connection: &mut SqliteConnection = &mut self.connection.lock().unwrap_or_else(|e| {
            eprintln!("Failed to acquire connection lock: {e}");
            std::process::exit(1);
        });
        diesel::update(orders::table.filter(orders::id.eq(id.to_string())))
            .set((
                orders::broker_order_id.eq(broker_order_id),
                orders::updated_at.eq(now),
            ))
            .execute(connection)
            .map_err(|error| {
                error!("Error attaching broker order id to order {}: {:?}", id, error);
                error
            })?;
        orders::table
            .filter(orders::id.eq(id.to_string()))
            .first::<OrderSQLite>(connection)?
            .into_domain_model()
    }

    fn apply_update(&mut self, update: &BrokerOrderUpdate) -> Result<Order, Box<dyn Error + Send + Sync>> {
        let connection: &mut SqliteConnection = &mut self.connection.lock().unwrap_or_else(|e| {
            eprintln!("Failed to acquire connection lock: {e}");
            std::process::exit(1);
        });
        diesel::update(
            orders::table.filter(orders::broker_order_id.eq(&update.broker_order_id)),
        )
        .set((
            orders::exchange_order_id.eq(&update.exchange_order_id),
            orders::parent_order_id.eq(&update.parent_order_id),
            orders::transaction_type.eq(update.transaction_type.to_string()),
            orders::exchange.eq(&update.exchange),
            orders::product.eq(&update.product),
            orders::status.eq(update.status.to_string()),
            orders::purchase_price.eq(update.average_price.map(decimal_to_text)),
            orders::status_message.eq(&update.status_message),
            orders::updated_at.eq(update.exchange_update_at),
        ))
        .execute(connection)
        .map_err(|error| {
            error!(
                "Error applying update for broker order {}: {:?}",
                update.broker_order_id, error
            );
            error
        })?;
        orders::table
            .filter(orders::broker_order_id.eq(&update.broker_order_id))
            .first::<OrderSQLite>(connection)?
            .into_domain_model()
    }
}

#[derive(Debug, Queryable, Identifiable, AsChangeset, Insertable)]
#[diesel(table_name = orders)]
struct OrderSQLite {
    id: String,
    created_at: chrono::NaiveDateTime,
    updated_at: chrono::NaiveDateTime,
    tracking_stock_id: String,
    broker_order_id: Option<String>,
    exchange_order_id: Option<String>,
    parent_order_id: Option<String>,
    order_type: String,
    event_type: String,
    transaction_type: String,
    exchange: String,
    product: String,
    base_price: String,
    quantity: i32,
    trigger_price: String,
    purchase_price: Option<String>,
    status: String,
    status_message: Option<String>,
    placed_at: chrono::NaiveDateTime,
}

impl TryFrom<OrderSQLite> for Order {
    type Error = ConversionError;

    fn try_from(value: OrderSQLite) -> Result<Self, Self::Error> {
        Ok(Order {
            id: Uuid::from_str(&value.id).map_err(|_| ConversionError::new("id", "invalid uuid"))?,
            tracking_stock_id: Uuid::from_str(&value.tracking_stock_id)
                .map_err(|_| ConversionError::new("tracking_stock_id", "invalid uuid"))?,
            broker_order_id: value.broker_order_id,
            exchange_order_id: value.exchange_order_id,
            parent_order_id: value.parent_order_id,
            order_type: match value.order_type.as_str() {
                "BUY" => OrderType::Buy,
                "SELL" => OrderType::Sell,
                _ => return Err(ConversionError::new("order_type", "unknown order type")),
            },
            event_type: match value.event_type.as_str() {
                "TARGET_HIT" => OrderEventType::TargetHit,
                "STOPLOSS_HIT" => OrderEventType::StoplossHit,
                _ => return Err(ConversionError::new("event_type", "unknown event type")),
            },
            transaction_type: match value.transaction_type.as_str() {
                "BUY" => TransactionType::Buy,
                "SELL" => TransactionType::Sell,
                _ => return Err(ConversionError::new("transaction_type", "unknown transaction type")),
            },
            exchange: value.exchange,
            product: value.product,
            base_price: decimal_from_text(&value.base_price)?,
            quantity: u32::try_from(value.quantity)
                .map_err(|_| ConversionError::new("quantity", "negative quantity"))?,
            trigger_price: decimal_from_text(&value.trigger_price)?,
            purchase_price: value
                .purchase_price
                .as_deref()
                .map(decimal_from_text)
                .transpose()?,
            status: value
                .status
                .parse()
                .map_err(|_| ConversionError::new("status", "unknown status"))?,
            status_message: value.status_message,
            placed_at: value.placed_at,
            updated_at: value.updated_at,
        })
    }
}

impl IntoDomainModel<Order> for OrderSQLite {
    fn into_domain_model(self) -> Result<Order, Box<dyn Error + Send + Sync>> {
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

    fn seed_tracking_stock(connection: &mut SqliteConnection) -> Uuid {
        use crate::schema::{tracking_stocks, users};
        let user_id = Uuid::new_v4();
        diesel::insert_into(users::table)
            .values((
                users::id.eq(user_id.to_string()),
                users::created_at.eq(Utc::now().naive_utc()),
                users::full_name.eq("Test User"),
                users::phone.eq(user_id.to_string()),
                users::password_hash.eq("hash"),
            ))
            .execute(connection)
            .unwrap();
        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();
        diesel::insert_into(tracking_stocks::table)
            .values((
                tracking_stocks::id.eq(id.to_string()),
                tracking_stocks::created_at.eq(now),
                tracking_stocks::updated_at.eq(now),
                tracking_stocks::user_id.eq(user_id.to_string()),
                tracking_stocks::stock_symbol.eq("INFY"),
                tracking_stocks::exchange.eq("NSE"),
                tracking_stocks::instrument_token.eq(42),
                tracking_stocks::base_price.eq("100"),
                tracking_stocks::target.eq("5"),
                tracking_stocks::stop_loss.eq("3"),
                tracking_stocks::quantity.eq(10),
                tracking_stocks::status.eq("ACTIVE"),
            ))
            .execute(connection)
            .unwrap();
        id
    }

    fn sample_order(tracking_stock_id: Uuid) -> Order {
        let now = Utc::now().naive_utc();
        Order {
            id: Uuid::new_v4(),
            tracking_stock_id,
            broker_order_id: None,
            exchange_order_id: None,
            parent_order_id: None,
            order_type: OrderType::Buy,
            event_type: OrderEventType::TargetHit,
            transaction_type: TransactionType::Buy,
            exchange: "NSE".to_string(),
            product: "MIS".to_string(),
            base_price: dec!(100),
            quantity: 10,
            trigger_price: dec!(105),
            purchase_price: None,
            status: OrderStatus::Pending,
            status_message: None,
            placed_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn create_and_attach_broker_order_id_roundtrips() {
        let mut conn = establish_connection();
        let tracking_stock_id = seed_tracking_stock(&mut conn);
        let mut db = OrderDB {
            connection: Arc::new(Mutex::new(conn)),
        };
        let order = db.create(&sample_order(tracking_stock_id)).unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.broker_order_id.is_none());

        let attached = db.attach_broker_order_id(order.id, "BROKER-1").unwrap();
        assert_eq!(attached.broker_order_id.as_deref(), Some("BROKER-1"));
        assert_eq!(
            db.for_broker_order_id("BROKER-1").unwrap().map(|o| o.id),
            Some(order.id)
        );
    }

    #[test]
    fn apply_update_reconciles_fill() {
        let mut conn = establish_connection();
        let tracking_stock_id = seed_tracking_stock(&mut conn);
        let mut db = OrderDB {
            connection: Arc::new(Mutex::new(conn)),
        };
        let order = db.create(&sample_order(tracking_stock_id)).unwrap();
        db.attach_broker_order_id(order.id, "BROKER-2").unwrap();

        let updated = db
            .apply_update(&BrokerOrderUpdate {
                broker_order_id: "BROKER-2".to_string(),
                exchange_order_id: Some("EXCH-1".to_string()),
                parent_order_id: None,
                transaction_type: TransactionType::Buy,
                exchange: "NSE".to_string(),
                product: "MIS".to_string(),
                status: OrderStatus::Completed,
                average_price: Some(dec!(104.5)),
                status_message: None,
                exchange_update_at: Utc::now().naive_utc(),
            })
            .unwrap();
        assert_eq!(updated.status, OrderStatus::Completed);
        assert_eq!(updated.purchase_price, Some(dec!(104.5)));
        assert_eq!(updated.exchange_order_id.as_deref(), Some("EXCH-1"));
    }

    #[test]
    fn for_tracking_stock_pages_most_recent_first() {
        let mut conn = establish_connection();
        let tracking_stock_id = seed_tracking_stock(&mut conn);
        let mut db = OrderDB {
            connection: Arc::new(Mutex::new(conn)),
        };
        for _ in 0..3 {
            db.create(&sample_order(tracking_stock_id)).unwrap();
        }

        let page = db.for_tracking_stock(tracking_stock_id, 0, 2).unwrap();
        assert_eq!(page.len(), 2);
        let next_page = db.for_tracking_stock(tracking_stock_id, 1, 2).unwrap();
        assert_eq!(next_page.len(), 1);
    }

    #[test]
    fn for_user_lists_orders_across_all_their_tracking_stocks() {
        use crate::schema::tracking_stocks;

        let mut conn = establish_connection();
        let tracking_stock_id = seed_tracking_stock(&mut conn);
        let user_id = Uuid::from_str(
            &tracking_stocks::table
                .filter(tracking_stocks::id.eq(tracking_stock_id.to_string()))
                .select(tracking_stocks::user_id)
                .first::<String>(&mut conn)
                .unwrap(),
        )
        .unwrap();

        let mut db = OrderDB {
            connection: Arc::new(Mutex::new(conn)),
        };
        db.create(&sample_order(tracking_stock_id)).unwrap();
        db.create(&sample_order(tracking_stock_id)).unwrap();

        let orders = db.for_user(user_id, 0, 10).unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].tracking_stock_id, tracking_stock_id);
    }
}
