//! Minute-aligned drain of the signal queue and order dispatch -
//! distilled spec section 4.F.

use crate::market_time::is_market_time;
use crate::order_service::OrderService;
use crate::signal_queue::SignalQueue;
use chrono::Utc;
use model::database::DatabaseFactory;
use model::{Broker, Order, OrderEventType, OrderParams, OrderStatus, OrderType, TradeSignal, TransactionType};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Per-order broker call budget - distilled spec section 4.F/5.
const ORDER_PLACEMENT_TIMEOUT: Duration = Duration::from_secs(5);

struct RunningHandle {
    stop_tx: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

/// Drains the signal queue every minute and dispatches orders.
pub struct OrderEngine {
    broker: Arc<dyn Broker>,
    queue: Arc<SignalQueue>,
    order_service: Arc<OrderService>,
    database: Arc<dyn DatabaseFactory>,
    running: AtomicBool,
    handle: Mutex<Option<RunningHandle>>,
}

impl std::fmt::Debug for OrderEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderEngine")
            .field("running", &self.is_running())
            .finish()
    }
}

impl OrderEngine {
    /// Constructs an order engine. Does not start its minute loop until
    /// [`Self::start`].
    pub fn new(
        broker: Arc<dyn Broker>,
        queue: Arc<SignalQueue>,
        order_service: Arc<OrderService>,
        database: Arc<dyn DatabaseFactory>,
    ) -> Self {
        OrderEngine {
            broker,
            queue,
            order_service,
            database,
            running: AtomicBool::new(false),
            handle: Mutex::new(None),
        }
    }

    /// Whether the minute loop is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Starts the minute-aligned loop. A second call while running is a
    /// no-op.
    pub async fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let (stop_tx, mut stop_rx) = oneshot::channel();
        let engine = self.clone();

        let join = tokio::spawn(async move {
            let mut ticker = minute_aligned_ticker();
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        if !is_market_time() {
                            continue;
                        }
                        engine.flush_and_dispatch().await;
                    }
                }
            }
        });

        *self.handle.lock().await = Some(RunningHandle { stop_tx, join });
        info!("order engine started");
    }

    /// Stops the minute loop. Signals queued for the current minute are
    /// discarded - `flush` is not called on shutdown. A call while not
    /// running is a no-op.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.handle.lock().await.take() {
            let _ = handle.stop_tx.send(());
            let _ = handle.join.await;
        }
        info!("order engine stopped");
    }

    async fn flush_and_dispatch(&self) {
        let signals = self.queue.flush();
        if signals.is_empty() {
            return;
        }
        info!(count = signals.len(), "processing signals from queue");
        for signal in signals {
            if let Err(error) = self.dispatch(&signal).await {
                error!(token = signal.token, %error, "failed to dispatch signal");
            }
        }
    }

    async fn dispatch(&self, signal: &TradeSignal) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        // BUG: both TARGET_HIT and STOPLOSS_HIT map to BUY. This mirrors the
        // source's behavior and looks inverted for a stop-out on a long
        // position - preserved per the open-question resolution rather than
        // silently "fixed".
        let transaction_type = TransactionType::Buy;
        let order_type = OrderType::Buy;

        let database = self.database.clone();
        let tracking_stock_id = {
            let token = signal.token;
            let mut reader = database.tracking_stock_read();
            tokio::task::spawn_blocking(move || reader.for_token(token))
                .await
                .map_err(|e| -> Box<dyn std::error::Error + Send + Sync> { Box::new(e) })??
        }
        .ok_or(crate::error::OrderServiceError::UnknownTrackingStock(signal.token))?
        .id;

        let params = OrderParams::market_intraday(
            signal.exchange.clone(),
            signal.symbol.clone(),
            transaction_type,
            signal.quantity,
        );
        let exchange = params.exchange.clone();
        let product = params.product.clone();

        let broker = self.broker.clone();
        let broker_order_id = tokio::time::timeout(
            ORDER_PLACEMENT_TIMEOUT,
            tokio::task::spawn_blocking(move || broker.place_order(&params)),
        )
        .await
        .map_err(|_| -> Box<dyn std::error::Error + Send + Sync> {
            "order placement timed out".into()
        })?
        .map_err(|e| -> Box<dyn std::error::Error + Send + Sync> { Box::new(e) })??;

        info!(
            symbol = %signal.symbol,
            order_id = %broker_order_id,
            order_type = %order_type,
            "order placed"
        );

        let now = Utc::now().naive_utc();
        let order = Order {
            id: Uuid::new_v4(),
            tracking_stock_id,
            broker_order_id: Some(broker_order_id),
            exchange_order_id: None,
            parent_order_id: None,
            order_type,
            event_type: match signal.kind {
                model::SignalKind::TargetHit => OrderEventType::TargetHit,
                model::SignalKind::StoplossHit => OrderEventType::StoplossHit,
            },
            transaction_type,
            exchange,
            product,
            base_price: signal.base_price,
            quantity: signal.quantity,
            trigger_price: signal.trigger_price,
            purchase_price: None,
            status: OrderStatus::Pending,
            status_message: None,
            placed_at: now,
            updated_at: now,
        };

        if let Err(error) = self.order_service.add_placed_order(order).await {
            warn!(%error, "failed to save placed order to database");
        }
        Ok(())
    }
}

fn minute_aligned_ticker() -> tokio::time::Interval {
    let now = Utc::now();
    let next_minute = (now + chrono::Duration::minutes(1))
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);
    let delay = (next_minute - now).to_std().unwrap_or(Duration::ZERO);
    let start = tokio::time::Instant::now() + delay;
    tokio::time::interval_at(start, Duration::from_secs(60))
}

use chrono::Timelike;

#[cfg(test)]
mod tests {
    use super::*;

    // The minute-alignment math is exercised indirectly through the
    // scheduler's equivalent helper in `market_time`; `OrderEngine`'s own
    // Start/Stop idempotency and dispatch error path are covered by the
    // `order_service` integration tests, which exercise the full
    // signal -> order -> persistence path against an in-memory database.
    #[test]
    fn ticker_delay_is_never_negative() {
        let _ = minute_aligned_ticker();
    }
}
