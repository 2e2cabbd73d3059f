use crate::broker::BrokerOrderUpdate;
use crate::order::Order;
use crate::tracked_stock::{TrackingStatus, TrackingStockRow};
use crate::{Instrument, User};
use rust_decimal::Decimal;
use std::error::Error;
use uuid::Uuid;

/// Database trait with all the methods needed to interact with persistence.
///
/// The trait abstracts the database implementation so it can be swapped or
/// mocked in tests. As in the rest of this crate's persistence boundary:
/// reads return domain models keyed by `Uuid`, writes take and return
/// domain models.
pub trait DatabaseFactory: Send + Sync {
    /// Returns a reader for tracking-stock data operations.
    fn tracking_stock_read(&self) -> Box<dyn TrackingStockRead>;
    /// Returns a writer for tracking-stock data operations.
    fn tracking_stock_write(&self) -> Box<dyn TrackingStockWrite>;
    /// Returns a reader for order data operations.
    fn order_read(&self) -> Box<dyn OrderRead>;
    /// Returns a writer for order data operations.
    fn order_write(&self) -> Box<dyn OrderWrite>;
    /// Returns a reader for instrument catalogue operations.
    fn instrument_read(&self) -> Box<dyn InstrumentRead>;
    /// Returns a writer for instrument catalogue operations.
    fn instrument_write(&self) -> Box<dyn InstrumentWrite>;
    /// Returns a reader for user account operations.
    fn user_read(&self) -> Box<dyn UserRead>;
    /// Returns a writer for user account operations.
    fn user_write(&self) -> Box<dyn UserWrite>;

    /// Begins a named savepoint.
    ///
    /// Savepoints can be nested and are compatible with existing outer
    /// transactions.
    fn begin_savepoint(&mut self, name: &str) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Releases a previously opened named savepoint.
    fn release_savepoint(&mut self, name: &str) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Rolls back all changes after a named savepoint.
    fn rollback_to_savepoint(&mut self, name: &str) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// Input for creating a new tracking-stock row.
#[derive(Debug, Clone)]
pub struct NewTrackingStock {
    /// Owning user.
    pub user_id: Uuid,
    /// Trading symbol.
    pub stock_symbol: String,
    /// Exchange the symbol trades on.
    pub exchange: String,
    /// Broker-assigned instrument token.
    pub instrument_token: u32,
    /// Absolute price offset above base price that fires `TARGET_HIT`.
    pub target: Decimal,
    /// Absolute price offset below base price that fires `STOPLOSS_HIT`.
    pub stop_loss: Decimal,
    /// Quantity to trade when a signal fires.
    pub quantity: u32,
}

/// Trait for reading tracking-stock data from the database.
pub trait TrackingStockRead: Send {
    /// Retrieves a tracking-stock row by its id.
    fn for_id(&mut self, id: Uuid) -> Result<TrackingStockRow, Box<dyn Error + Send + Sync>>;
    /// Retrieves a tracking-stock row by its broker-assigned instrument token.
    ///
    /// Used by the order engine to resolve `trackingStockId` from the
    /// `token` carried on a `TradeSignal` - see `SPEC_FULL.md` section 9.3
    /// (resolved by token, not symbol, to avoid a same-symbol/different-
    /// exchange collision).
    fn for_token(&mut self, token: u32) -> Result<Option<TrackingStockRow>, Box<dyn Error + Send + Sync>>;
    /// Retrieves all tracking-stock rows owned by a user.
    fn for_user(&mut self, user_id: Uuid) -> Result<Vec<TrackingStockRow>, Box<dyn Error + Send + Sync>>;
    /// Retrieves all rows with any of the given statuses, across all users.
    /// Used by the day scheduler's `MarketOpen`/`MarketClose` jobs.
    fn with_status(&mut self, statuses: &[TrackingStatus]) -> Result<Vec<TrackingStockRow>, Box<dyn Error + Send + Sync>>;
}

/// Trait for writing tracking-stock data to the database.
pub trait TrackingStockWrite: Send {
    /// Creates a new tracking-stock row in `ACTIVE` status.
    fn create(&mut self, draft: NewTrackingStock) -> Result<TrackingStockRow, Box<dyn Error + Send + Sync>>;
    /// Updates the lifecycle status of a tracking-stock row.
    fn update_status(
        &mut self,
        id: Uuid,
        status: TrackingStatus,
    ) -> Result<TrackingStockRow, Box<dyn Error + Send + Sync>>;
    /// Updates the base price used to evaluate future triggers, as called by
    /// the order service once a fill lands.
    fn update_base_price(
        &mut self,
        id: Uuid,
        base_price: Decimal,
    ) -> Result<TrackingStockRow, Box<dyn Error + Send + Sync>>;
    /// Soft-deletes a tracking-stock row (`DELETE /tracking-stocks/{id}`).
    /// The row is excluded from subsequent reads but kept for order history.
    fn delete(&mut self, id: Uuid) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// Trait for reading order data from the database.
pub trait OrderRead: Send {
    /// Retrieves an order by its id.
    fn for_id(&mut self, id: Uuid) -> Result<Order, Box<dyn Error + Send + Sync>>;
    /// Retrieves an order by the broker's own order id.
    fn for_broker_order_id(&mut self, broker_order_id: &str) -> Result<Option<Order>, Box<dyn Error + Send + Sync>>;
    /// Retrieves a page of orders dispatched for a single tracking-stock row,
    /// most recent first. Backs `GET /orders/tracking-stocks/{id}`.
    fn for_tracking_stock(
        &mut self,
        tracking_stock_id: Uuid,
        page: i64,
        limit: i64,
    ) -> Result<Vec<Order>, Box<dyn Error + Send + Sync>>;
    /// Retrieves a page of orders across every tracking-stock row owned by
    /// `user_id`, most recent first. Backs `GET /orders`.
    fn for_user(&mut self, user_id: Uuid, page: i64, limit: i64) -> Result<Vec<Order>, Box<dyn Error + Send + Sync>>;
}

/// Trait for writing order data to the database.
pub trait OrderWrite: Send {
    /// Creates a new pending order row dispatched for the given
    /// tracking-stock row.
    fn create(&mut self, order: &Order) -> Result<Order, Box<dyn Error + Send + Sync>>;
    /// Records the broker-assigned order id once placement succeeds.
    fn attach_broker_order_id(
        &mut self,
        id: Uuid,
        broker_order_id: &str,
    ) -> Result<Order, Box<dyn Error + Send + Sync>>;
    /// Reconciles a broker order-update event against the persisted row,
    /// patching the exchange ids, order metadata, fill price, status and
    /// status message the update carries.
    fn apply_update(&mut self, update: &BrokerOrderUpdate) -> Result<Order, Box<dyn Error + Send + Sync>>;
}

/// Trait for reading instrument catalogue data from the database.
pub trait InstrumentRead: Send {
    /// Resolves a symbol/exchange pair to its broker-assigned token.
    fn resolve(&mut self, symbol: &str, exchange: &str) -> Result<Option<u32>, Box<dyn Error + Send + Sync>>;
    /// Retrieves the full catalogue for the given exchanges.
    fn for_exchanges(&mut self, exchanges: &[String]) -> Result<Vec<Instrument>, Box<dyn Error + Send + Sync>>;
}

/// Trait for writing instrument catalogue data to the database.
pub trait InstrumentWrite: Send {
    /// Replaces the stored catalogue for an exchange with a fresh dump,
    /// as called by the `FetchInstruments` scheduler job.
    fn replace_for_exchange(
        &mut self,
        exchange: &str,
        instruments: &[Instrument],
    ) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// Trait for reading user account data from the database.
pub trait UserRead: Send {
    /// Retrieves a user by id.
    fn for_id(&mut self, id: Uuid) -> Result<User, Box<dyn Error + Send + Sync>>;
    /// Retrieves a user by their unique phone number.
    fn for_phone(&mut self, phone: &str) -> Result<Option<User>, Box<dyn Error + Send + Sync>>;
}

/// Trait for writing user account data to the database.
pub trait UserWrite: Send {
    /// Creates a new user account with an already-hashed password.
    fn create(
        &mut self,
        full_name: &str,
        phone: &str,
        password_hash: &str,
    ) -> Result<User, Box<dyn Error + Send + Sync>>;
}
