//! Reconciles broker order-update events with persisted orders and
//! resolves the placed-before-update race - distilled spec section 4.G.

use chrono::{NaiveDateTime, Utc};
use dashmap::DashMap;
use model::database::DatabaseFactory;
use model::{BasePriceUpdater, BrokerOrderUpdate, Order, OrderStatus};
use std::sync::Arc;
use tracing::{info, warn};

/// TTL for a pending broker order-update that arrived before the local
/// insert committed.
const PENDING_UPDATE_TTL: chrono::Duration = chrono::Duration::minutes(2);

#[derive(Clone)]
struct PendingUpdate {
    update: BrokerOrderUpdate,
    received_at: NaiveDateTime,
}

/// Bridges the order-placed and order-update event streams, which arrive
/// from independent sources and may interleave in either order.
pub struct OrderService {
    database: Arc<dyn DatabaseFactory>,
    pending: DashMap<String, PendingUpdate>,
    base_price_updater: Arc<dyn BasePriceUpdater>,
}

impl std::fmt::Debug for OrderService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderService")
            .field("pending_count", &self.pending.len())
            .finish()
    }
}

impl OrderService {
    /// Constructs an order service over `database`, wired to the registry's
    /// `BasePriceUpdater` capability so completed fills can push a fresh
    /// cost basis without this crate depending on the registry type.
    pub fn new(database: Arc<dyn DatabaseFactory>, base_price_updater: Arc<dyn BasePriceUpdater>) -> Self {
        OrderService {
            database,
            pending: DashMap::new(),
            base_price_updater,
        }
    }

    /// Persists a freshly placed order, then applies any order-update that
    /// arrived before the insert committed.
    pub async fn add_placed_order(&self, order: Order) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let broker_order_id = order.broker_order_id.clone();
        let database = self.database.clone();
        tokio::task::spawn_blocking(move || database.order_write().create(&order)).await??;

        if let Some(broker_order_id) = broker_order_id {
            self.prune_expired();
            if let Some((_, pending)) = self.pending.remove(&broker_order_id) {
                self.reconcile(pending.update).await?;
            }
        }
        Ok(())
    }

    /// Applies a broker order-update event. If the corresponding order has
    /// not been persisted yet, the update is cached until
    /// [`Self::add_placed_order`] resolves it, or it expires after
    /// [`PENDING_UPDATE_TTL`].
    pub async fn process_order_update(
        &self,
        update: BrokerOrderUpdate,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.prune_expired();

        let database = self.database.clone();
        let broker_order_id = update.broker_order_id.clone();
        let existing =
            tokio::task::spawn_blocking(move || database.order_read().for_broker_order_id(&broker_order_id))
                .await??;

        if existing.is_some() {
            self.reconcile(update).await
        } else {
            self.pending.insert(
                update.broker_order_id.clone(),
                PendingUpdate {
                    update,
                    received_at: Utc::now().naive_utc(),
                },
            );
            Ok(())
        }
    }

    async fn reconcile(&self, update: BrokerOrderUpdate) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let database = self.database.clone();
        let status = update.status;
        let average_price = update.average_price;
        let update_for_write = update.clone();

        let order =
            tokio::task::spawn_blocking(move || database.order_write().apply_update(&update_for_write))
                .await??;

        info!(order_id = %update.broker_order_id, %status, "order reconciled");

        if status == OrderStatus::Completed {
            if let Some(price) = average_price {
                if let Some(token) = self.resolve_token(order.tracking_stock_id).await {
                    self.base_price_updater.update_base_price(token, price);
                }
            }
        }
        Ok(())
    }

    async fn resolve_token(&self, tracking_stock_id: uuid::Uuid) -> Option<u32> {
        let database = self.database.clone();
        match tokio::task::spawn_blocking(move || database.tracking_stock_read().for_id(tracking_stock_id))
            .await
        {
            Ok(Ok(row)) => Some(row.instrument_token),
            Ok(Err(error)) => {
                warn!(%error, "failed to resolve tracking stock for base-price update");
                None
            }
            Err(error) => {
                warn!(%error, "tracking stock lookup task panicked");
                None
            }
        }
    }

    fn prune_expired(&self) {
        let now = Utc::now().naive_utc();
        self.pending
            .retain(|_, pending| now.signed_duration_since(pending.received_at) <= PENDING_UPDATE_TTL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use db_sqlite::SqliteDatabase;
    use model::database::{NewTrackingStock, TrackingStockWrite};
    use model::{OrderEventType, OrderType, TransactionType};
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use uuid::Uuid;

    #[derive(Default)]
    struct RecordingUpdater {
        calls: AtomicUsize,
    }
    impl BasePriceUpdater for RecordingUpdater {
        fn update_base_price(&self, _token: u32, _price: rust_decimal::Decimal) {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
        }
    }

    fn sample_order(tracking_stock_id: Uuid, broker_order_id: &str) -> Order {
        let now = Utc::now().naive_utc();
        Order {
            id: Uuid::new_v4(),
            tracking_stock_id,
            broker_order_id: Some(broker_order_id.to_string()),
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

    fn seed_tracking_stock(database: &Arc<dyn DatabaseFactory>) -> Uuid {
        let user = database
            .user_write()
            .create("Jane Doe", "+911234567890", "hash")
            .unwrap();
        database
            .tracking_stock_write()
            .create(NewTrackingStock {
                user_id: user.id,
                stock_symbol: "INFY".to_string(),
                exchange: "NSE".to_string(),
                instrument_token: 42,
                target: dec!(5),
                stop_loss: dec!(3),
                quantity: 10,
            })
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn update_before_place_is_applied_once_the_row_exists() {
        let database: Arc<dyn DatabaseFactory> = Arc::new(SqliteDatabase::new_in_memory());
        let tracking_stock_id = seed_tracking_stock(&database);
        let updater = Arc::new(RecordingUpdater::default());
        let service = OrderService::new(database.clone(), updater.clone());

        service
            .process_order_update(BrokerOrderUpdate {
                broker_order_id: "X".to_string(),
                exchange_order_id: Some("EXCH-X".to_string()),
                parent_order_id: None,
                transaction_type: TransactionType::Buy,
                exchange: "NSE".to_string(),
                product: "MIS".to_string(),
                status: OrderStatus::Completed,
                average_price: Some(dec!(123.45)),
                status_message: None,
                exchange_update_at: Utc::now().naive_utc(),
            })
            .await
            .unwrap();

        service
            .add_placed_order(sample_order(tracking_stock_id, "X"))
            .await
            .unwrap();

        let order = database.order_read().for_broker_order_id("X").unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.purchase_price, Some(dec!(123.45)));
        assert_eq!(updater.calls.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn place_before_update_is_applied_immediately() {
        let database: Arc<dyn DatabaseFactory> = Arc::new(SqliteDatabase::new_in_memory());
        let tracking_stock_id = seed_tracking_stock(&database);
        let updater = Arc::new(RecordingUpdater::default());
        let service = OrderService::new(database.clone(), updater);

        service
            .add_placed_order(sample_order(tracking_stock_id, "Y"))
            .await
            .unwrap();
        service
            .process_order_update(BrokerOrderUpdate {
                broker_order_id: "Y".to_string(),
                exchange_order_id: None,
                parent_order_id: None,
                transaction_type: TransactionType::Buy,
                exchange: "NSE".to_string(),
                product: "MIS".to_string(),
                status: OrderStatus::Completed,
                average_price: Some(dec!(50)),
                status_message: None,
                exchange_update_at: Utc::now().naive_utc(),
            })
            .await
            .unwrap();

        let order = database.order_read().for_broker_order_id("Y").unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
    }

    #[tokio::test]
    async fn expired_pending_update_is_not_applied() {
        let database: Arc<dyn DatabaseFactory> = Arc::new(SqliteDatabase::new_in_memory());
        let tracking_stock_id = seed_tracking_stock(&database);
        let updater = Arc::new(RecordingUpdater::default());
        let service = OrderService::new(database.clone(), updater);

        service
            .pending
            .insert(
                "Z".to_string(),
                PendingUpdate {
                    update: BrokerOrderUpdate {
                        broker_order_id: "Z".to_string(),
                        exchange_order_id: None,
                        parent_order_id: None,
                        transaction_type: TransactionType::Buy,
                        exchange: "NSE".to_string(),
                        product: "MIS".to_string(),
                        status: OrderStatus::Completed,
                        average_price: Some(dec!(1)),
                        status_message: None,
                        exchange_update_at: Utc::now().naive_utc(),
                    },
                    received_at: Utc::now().naive_utc() - chrono::Duration::minutes(3),
                },
            );

        service
            .add_placed_order(sample_order(tracking_stock_id, "Z"))
            .await
            .unwrap();

        let order = database.order_read().for_broker_order_id("Z").unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
    }
}
