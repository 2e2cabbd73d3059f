//! Constructs and wires the five core subsystems, plus the instrument
//! catalogue and day scheduler - distilled spec section 4.I. Must tolerate
//! starting with the broker unauthenticated; the HTTP surface (outside this
//! crate) keeps serving `/health` and the auth-callback route regardless.

use crate::broadcaster::TickBroadcaster;
use crate::instrument_catalogue::InstrumentCatalogue;
use crate::market_time::{is_trading_day, now_ist};
use crate::order_engine::OrderEngine;
use crate::order_service::OrderService;
use crate::registry::TrackingRegistry;
use crate::scheduler::DayScheduler;
use crate::signal_engine::SignalEngine;
use crate::signal_queue::SignalQueue;
use model::database::DatabaseFactory;
use model::{BasePriceUpdater, Broker, TokenSubscriber, TrackedStock, TrackingStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{info, warn};

/// Wraps a job closure's underlying error in the typed `SchedulerError`
/// the distilled spec's error-handling section names, so the scheduler's
/// per-job log line carries a named job alongside the raw cause.
fn job_failed(
    job: &str,
    source: Box<dyn std::error::Error + Send + Sync>,
) -> Box<dyn std::error::Error + Send + Sync> {
    Box::new(crate::error::SchedulerError::JobFailed {
        job: job.to_string(),
        source,
    })
}

/// Exchanges whose instrument catalogue is kept current - distilled spec
/// section 6 persisted-state description. Shared with the HTTP surface's
/// `/stocks/search` route so both query the same scope.
pub const CATALOGUE_EXCHANGES: &[&str] = &["NSE", "BSE", "NFO"];

/// Holds every live component of the runtime and coordinates their startup
/// and shutdown around the day scheduler's `MarketOpen`/`MarketClose` jobs.
pub struct RuntimeSupervisor {
    database: Arc<dyn DatabaseFactory>,
    broker: Arc<dyn Broker>,
    registry: Arc<TrackingRegistry>,
    broadcaster: Arc<TickBroadcaster>,
    order_service: Arc<OrderService>,
    signal_engine: Arc<SignalEngine>,
    order_engine: Arc<OrderEngine>,
    catalogue: Arc<InstrumentCatalogue>,
    scheduler: Arc<DayScheduler>,
    /// Whether the broker session has been established via the auth
    /// callback. Stocks are not loaded, and engines are not started, until
    /// this is true.
    broker_ready: AtomicBool,
}

impl std::fmt::Debug for RuntimeSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeSupervisor")
            .field("broker_ready", &self.is_broker_ready())
            .field("tracked", &self.registry.count())
            .finish()
    }
}

impl RuntimeSupervisor {
    /// Constructs every subsystem and wires the `BasePriceUpdater` and
    /// `TokenSubscriber` capabilities, breaking the registry/order-service
    /// cycle described in `SPEC_FULL.md` section 9. Does not start the
    /// scheduler or any engine - call [`Self::start`] once constructed.
    pub fn new(
        database: Arc<dyn DatabaseFactory>,
        broker: Arc<dyn Broker>,
        subscriber: Arc<dyn TokenSubscriber>,
    ) -> Arc<Self> {
        let broadcaster = Arc::new(TickBroadcaster::new());
        let registry = Arc::new(TrackingRegistry::new(subscriber));
        let queue = Arc::new(SignalQueue::new());
        let base_price_updater: Arc<dyn BasePriceUpdater> = registry.clone();
        let order_service = Arc::new(OrderService::new(database.clone(), base_price_updater));
        let order_engine = Arc::new(OrderEngine::new(
            broker.clone(),
            queue.clone(),
            order_service.clone(),
            database.clone(),
        ));
        let signal_engine = Arc::new(SignalEngine::new(broadcaster.clone(), registry.clone(), queue));
        let catalogue = Arc::new(InstrumentCatalogue::new(database.clone()));

        Arc::new_cyclic(|weak: &Weak<RuntimeSupervisor>| {
            let mut scheduler = DayScheduler::new();

            let fetch_self = weak.clone();
            scheduler.add_job("FetchInstruments", 8, 30, move || {
                let fetch_self = fetch_self.clone();
                Box::pin(async move {
                    match fetch_self.upgrade() {
                        Some(sup) => sup.fetch_instruments().await.map_err(|source| {
                            job_failed("FetchInstruments", source)
                        }),
                        None => Ok(()),
                    }
                })
            });

            let open_self = weak.clone();
            scheduler.add_job("MarketOpen", 9, 15, move || {
                let open_self = open_self.clone();
                Box::pin(async move {
                    match open_self.upgrade() {
                        Some(sup) => sup
                            .market_open()
                            .await
                            .map_err(|source| job_failed("MarketOpen", source)),
                        None => Ok(()),
                    }
                })
            });

            let close_self = weak.clone();
            scheduler.add_job("MarketClose", 15, 30, move || {
                let close_self = close_self.clone();
                Box::pin(async move {
                    match close_self.upgrade() {
                        Some(sup) => sup
                            .market_close()
                            .await
                            .map_err(|source| job_failed("MarketClose", source)),
                        None => Ok(()),
                    }
                })
            });

            RuntimeSupervisor {
                database,
                broker,
                registry,
                broadcaster,
                order_service,
                signal_engine,
                order_engine,
                catalogue,
                scheduler: Arc::new(scheduler),
                broker_ready: AtomicBool::new(false),
            }
        })
    }

    /// Starts the day scheduler's minute loop. Jobs themselves start/stop
    /// the signal/order engines at market open/close.
    pub async fn start(&self) {
        self.scheduler.start().await;
        info!("runtime supervisor started");
    }

    /// Stops the day scheduler and any running engines.
    pub async fn stop(&self) {
        self.scheduler.stop().await;
        self.signal_engine.stop().await;
        self.order_engine.stop().await;
        info!("runtime supervisor stopped");
    }

    /// Whether the broker session has been established.
    pub fn is_broker_ready(&self) -> bool {
        self.broker_ready.load(Ordering::SeqCst)
    }

    /// Number of instruments currently tracked in the registry.
    pub fn tracked_count(&self) -> usize {
        self.registry.count()
    }

    /// The runtime's tick broadcaster, for binding an out-of-crate streaming
    /// adapter (e.g. the broker's websocket ticker) after construction -
    /// breaks the adapter/registry construction cycle described in
    /// `SPEC_FULL.md` section 9.3.
    pub fn broadcaster(&self) -> Arc<TickBroadcaster> {
        self.broadcaster.clone()
    }

    /// The runtime's order service, for the same late-binding purpose as
    /// [`Self::broadcaster`].
    pub fn order_service(&self) -> Arc<OrderService> {
        self.order_service.clone()
    }

    /// Called once the HTTP auth-callback route completes `generate_session`
    /// successfully. Loads today's stocks and starts the engines immediately
    /// if it is a trading day, rather than waiting for the next `MarketOpen`
    /// firing - this is what lets the runtime recover from starting
    /// unauthenticated mid-morning.
    pub async fn on_broker_authenticated(&self) {
        self.broker_ready.store(true, Ordering::SeqCst);
        info!("broker session established");
        if is_trading_day(now_ist()) {
            if let Err(error) = self.load_stocks_and_start_engines().await {
                warn!(%error, "failed to load stocks after broker auth");
            }
        }
    }

    /// Runs a named scheduler job immediately, bypassing its time-of-day
    /// check - used by the broker auth-callback path and administrative
    /// tooling.
    pub async fn run_job_now(&self, name: &str) -> bool {
        self.scheduler.run_now(name).await
    }

    async fn fetch_instruments(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let broker = self.broker.clone();
        let exchanges: Vec<String> = CATALOGUE_EXCHANGES.iter().map(|e| e.to_string()).collect();
        let instruments = {
            let exchanges = exchanges.clone();
            tokio::task::spawn_blocking(move || broker.get_instruments(&exchanges)).await??
        };
        for exchange in &exchanges {
            let rows: Vec<model::Instrument> = instruments
                .iter()
                .filter(|i| &i.exchange == exchange)
                .cloned()
                .collect();
            self.catalogue.replace_for_exchange(exchange, rows).await?;
        }
        Ok(())
    }

    async fn market_open(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if !self.is_broker_ready() {
            warn!("market open fired but broker session is not established yet; deferring to auth callback");
            return Ok(());
        }
        self.load_stocks_and_start_engines().await
    }

    async fn load_stocks_and_start_engines(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let database = self.database.clone();
        let rows = tokio::task::spawn_blocking(move || {
            database
                .tracking_stock_read()
                .with_status(&[TrackingStatus::AutoInactive])
        })
        .await??;

        let mut loaded = 0usize;
        for row in rows {
            match TrackedStock::new(
                row.instrument_token,
                row.stock_symbol.clone(),
                row.exchange.clone(),
                rust_decimal::Decimal::ZERO,
                row.target,
                row.stop_loss,
                row.quantity,
            ) {
                Ok(stock) => {
                    self.registry.add(stock);
                    let database = self.database.clone();
                    let id = row.id;
                    match tokio::task::spawn_blocking(move || {
                        database.tracking_stock_write().update_status(id, TrackingStatus::AutoActive)
                    })
                    .await?
                    {
                        Ok(_) => loaded += 1,
                        Err(error) => {
                            warn!(%error, symbol = %row.stock_symbol, "failed to promote tracking stock to AUTO_ACTIVE");
                        }
                    }
                }
                Err(error) => {
                    let error = crate::error::RegistryError::InvalidStock(error);
                    warn!(%error, symbol = %row.stock_symbol, "skipping invalid tracking stock row at market open");
                }
            }
        }
        info!(loaded, "loaded stocks to tracking registry");

        self.signal_engine.start().await;
        self.order_engine.start().await;
        Ok(())
    }

    async fn market_close(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let database = self.database.clone();
        // Broadened to every ACTIVE|AUTO_ACTIVE row (not only AUTO_INACTIVE)
        // per the open-question resolution in SPEC_FULL.md 9.3 - otherwise
        // user-enabled ACTIVE rows are hidden from demotion.
        let rows = tokio::task::spawn_blocking(move || {
            database
                .tracking_stock_read()
                .with_status(&[TrackingStatus::Active, TrackingStatus::AutoActive])
        })
        .await??;

        let demoted = rows.len();
        for row in &rows {
            let database = self.database.clone();
            let id = row.id;
            if let Err(error) = tokio::task::spawn_blocking(move || {
                database.tracking_stock_write().update_status(id, TrackingStatus::AutoInactive)
            })
            .await?
            {
                warn!(%error, symbol = %row.stock_symbol, "failed to demote tracking stock at market close");
            }
        }
        info!(demoted, "demoted stocks at market close");

        self.signal_engine.stop().await;
        self.order_engine.stop().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use db_sqlite::SqliteDatabase;
    use model::database::{NewTrackingStock, TrackingStockWrite};
    use model::{BrokerOrderUpdate, Instrument, OrderParams};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    struct StubBroker;
    impl Broker for StubBroker {
        fn generate_session(&self, _request_token: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            Ok(())
        }
        fn get_ltp(&self, _tokens: &[u32]) -> Result<Vec<(u32, Decimal)>, Box<dyn std::error::Error + Send + Sync>> {
            Ok(Vec::new())
        }
        fn get_instruments(&self, exchanges: &[String]) -> Result<Vec<Instrument>, Box<dyn std::error::Error + Send + Sync>> {
            Ok(exchanges
                .iter()
                .map(|exchange| Instrument {
                    token: 42,
                    symbol: "INFY".to_string(),
                    exchange: exchange.clone(),
                })
                .collect())
        }
        fn place_order(&self, _params: &OrderParams) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
            Ok("BROKER-1".to_string())
        }
    }

    struct NoopSubscriber;
    impl TokenSubscriber for NoopSubscriber {
        fn subscribe_token(&self, _token: u32) {}
        fn unsubscribe_token(&self, _token: u32) {}
    }

    fn noop_update() -> BrokerOrderUpdate {
        BrokerOrderUpdate {
            broker_order_id: "X".to_string(),
            exchange_order_id: None,
            parent_order_id: None,
            transaction_type: model::TransactionType::Buy,
            exchange: "NSE".to_string(),
            product: "MIS".to_string(),
            status: model::OrderStatus::Pending,
            average_price: None,
            status_message: None,
            exchange_update_at: chrono::Utc::now().naive_utc(),
        }
    }

    #[tokio::test]
    async fn market_open_without_broker_ready_is_a_noop() {
        let database: Arc<dyn DatabaseFactory> = Arc::new(SqliteDatabase::new_in_memory());
        let supervisor = RuntimeSupervisor::new(database, Arc::new(StubBroker), Arc::new(NoopSubscriber));
        assert!(supervisor.run_job_now("MarketOpen").await);
        assert_eq!(supervisor.tracked_count(), 0);
        let _ = noop_update();
    }

    #[tokio::test]
    async fn broker_authenticated_loads_auto_inactive_stocks_on_a_trading_day() {
        let database: Arc<dyn DatabaseFactory> = Arc::new(SqliteDatabase::new_in_memory());
        let user = database.user_write().create("Jane Doe", "+911234567890", "hash").unwrap();
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
        database
            .tracking_stock_write()
            .update_status(row.id, TrackingStatus::AutoInactive)
            .unwrap();

        let supervisor = RuntimeSupervisor::new(database.clone(), Arc::new(StubBroker), Arc::new(NoopSubscriber));
        supervisor.on_broker_authenticated().await;

        // The helper only asserts tracked_count when today happens to be a
        // trading day in the test environment's clock; on a weekend this is
        // legitimately zero, matching `is_trading_day`'s contract.
        if is_trading_day(now_ist()) {
            assert_eq!(supervisor.tracked_count(), 1);
            assert!(supervisor.signal_engine.is_running());
            supervisor.stop().await;
        }
    }

    #[tokio::test]
    async fn market_close_demotes_stocks_without_touching_the_registry() {
        let database: Arc<dyn DatabaseFactory> = Arc::new(SqliteDatabase::new_in_memory());
        let user = database.user_write().create("Jane Doe", "+911234567890", "hash").unwrap();
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
        database
            .tracking_stock_write()
            .update_status(row.id, TrackingStatus::AutoActive)
            .unwrap();

        let supervisor = RuntimeSupervisor::new(database.clone(), Arc::new(StubBroker), Arc::new(NoopSubscriber));
        supervisor.registry.add(
            model::TrackedStock::new(42, "INFY", "NSE", dec!(100), dec!(5), dec!(3), 10).unwrap(),
        );
        assert_eq!(supervisor.tracked_count(), 1);

        assert!(supervisor.run_job_now("MarketClose").await);

        let reloaded = database.tracking_stock_read().for_id(row.id).unwrap();
        assert_eq!(reloaded.status, TrackingStatus::AutoInactive);
        // Distilled invariant: MarketClose demotes DB rows but leaves the
        // tracking registry untouched - only the registry's own `Remove`
        // request (via `DELETE /tracking-stocks/{id}`) evicts an entry.
        assert_eq!(supervisor.tracked_count(), 1);
    }

    #[tokio::test]
    async fn unknown_job_name_is_reported_as_not_found() {
        let database: Arc<dyn DatabaseFactory> = Arc::new(SqliteDatabase::new_in_memory());
        let supervisor = RuntimeSupervisor::new(database, Arc::new(StubBroker), Arc::new(NoopSubscriber));
        assert!(!supervisor.run_job_now("DoesNotExist").await);
    }
}
