//! End-to-end exercise of the tick -> signal -> order -> fill -> base-price
//! loop across crate boundaries, using an in-memory SQLite database. Unit
//! tests within each module cover the pieces in isolation; this test wires
//! them the way the runtime supervisor does.

use core::order_service::OrderService;
use core::registry::TrackingRegistry;
use core::signal_engine::SignalEngine;
use core::signal_queue::SignalQueue;
use core::broadcaster::TickBroadcaster;
use db_sqlite::SqliteDatabase;
use model::database::{DatabaseFactory, NewTrackingStock, TrackingStockWrite};
use model::{
    BasePriceUpdater, BrokerOrderUpdate, Instrument, Order, OrderEventType, OrderParams,
    OrderStatus, OrderType, Tick, TickBatch, TokenSubscriber, TrackedStock,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::error::Error;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use uuid::Uuid;

struct NoopSubscriber;
impl TokenSubscriber for NoopSubscriber {
    fn subscribe_token(&self, _token: u32) {}
    fn unsubscribe_token(&self, _token: u32) {}
}

struct StubBroker;
impl model::Broker for StubBroker {
    fn generate_session(&self, _request_token: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
    fn get_ltp(&self, _tokens: &[u32]) -> Result<Vec<(u32, Decimal)>, Box<dyn Error + Send + Sync>> {
        Ok(Vec::new())
    }
    fn get_instruments(&self, _exchanges: &[String]) -> Result<Vec<Instrument>, Box<dyn Error + Send + Sync>> {
        Ok(Vec::new())
    }
    fn place_order(&self, _params: &OrderParams) -> Result<String, Box<dyn Error + Send + Sync>> {
        Ok("KITE-ORDER-1".to_string())
    }
}

#[tokio::test]
async fn fill_feedback_loop_primes_the_stock_for_the_next_trigger() {
    let database: Arc<dyn DatabaseFactory> = Arc::new(SqliteDatabase::new_in_memory());
    let user = database.user_write().create("Jane Doe", "+911234560000", "hash").unwrap();
    let row = database
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
        .unwrap();

    let registry = Arc::new(TrackingRegistry::new(Arc::new(NoopSubscriber)));
    // Market-open loads AUTO_INACTIVE rows with base_price = 0 - unprimed
    // until a fill lands; see SPEC_FULL.md section 9.1.
    registry.add(TrackedStock::new(42, "INFY", "NSE", Decimal::ZERO, dec!(5), dec!(3), 10).unwrap());

    let broadcaster = Arc::new(TickBroadcaster::new());
    let queue = Arc::new(SignalQueue::new());
    let signal_engine = Arc::new(SignalEngine::new(broadcaster.clone(), registry.clone(), queue.clone()));
    signal_engine.start().await;

    // An unprimed stock ignores every tick, however high.
    broadcaster.publish(TickBatch::single(Tick {
        instrument_token: 42,
        last_price: dec!(500),
    }));
    sleep(Duration::from_millis(30)).await;
    assert!(queue.is_empty(), "unprimed stock must not fire a signal");

    // Simulate a fill arriving through the order service, independent of
    // the order engine's minute cadence.
    let base_updater: Arc<dyn BasePriceUpdater> = registry.clone();
    let order_service = Arc::new(OrderService::new(database.clone(), base_updater));

    let broker = Arc::new(StubBroker);
    let params = OrderParams::market_intraday("NSE", "INFY", model::TransactionType::Buy, 10);
    let broker_order_id = broker.place_order(&params).unwrap();

    let now = chrono::Utc::now().naive_utc();
    let order = Order {
        id: Uuid::new_v4(),
        tracking_stock_id: row.id,
        broker_order_id: Some(broker_order_id.clone()),
        exchange_order_id: None,
        parent_order_id: None,
        order_type: OrderType::Buy,
        event_type: OrderEventType::TargetHit,
        transaction_type: model::TransactionType::Buy,
        exchange: "NSE".to_string(),
        product: "MIS".to_string(),
        base_price: Decimal::ZERO,
        quantity: 10,
        trigger_price: dec!(500),
        purchase_price: None,
        status: OrderStatus::Pending,
        status_message: None,
        placed_at: now,
        updated_at: now,
    };
    order_service.add_placed_order(order).await.unwrap();

    order_service
        .process_order_update(BrokerOrderUpdate {
            broker_order_id,
            exchange_order_id: None,
            parent_order_id: None,
            transaction_type: model::TransactionType::Buy,
            exchange: "NSE".to_string(),
            product: "MIS".to_string(),
            status: OrderStatus::Completed,
            average_price: Some(dec!(100)),
            status_message: None,
            exchange_update_at: now,
        })
        .await
        .unwrap();

    // The fill primed the registry's cost basis; a tick crossing the new
    // target now fires.
    broadcaster.publish(TickBatch::single(Tick {
        instrument_token: 42,
        last_price: dec!(106),
    }));
    sleep(Duration::from_millis(30)).await;
    signal_engine.stop().await;

    let signals = queue.peek();
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].kind, model::SignalKind::TargetHit);
    assert_eq!(signals[0].base_price, dec!(100));
}
