use crate::order::OrderStatus;
use crate::Instrument;
use rust_decimal::Decimal;
use std::error::Error;

/// Side of an order as sent to the broker's REST API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionType {
    /// Buy order.
    Buy,
    /// Sell order.
    Sell,
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransactionType::Buy => "BUY",
            TransactionType::Sell => "SELL",
        };
        write!(f, "{s}")
    }
}

/// Parameters for a single market order, in the broker's own vocabulary
/// (`MIS`/`DAY`/`MARKET` - see `SPEC_FULL.md` glossary).
#[derive(Debug, Clone, PartialEq)]
pub struct OrderParams {
    /// Exchange the symbol trades on.
    pub exchange: String,
    /// Trading symbol.
    pub tradingsymbol: String,
    /// Side of the order.
    pub transaction_type: TransactionType,
    /// Quantity to trade.
    pub quantity: u32,
    /// Product code. Always `MIS` (margin intraday square-off) for this
    /// runtime - no overnight positions are ever opened.
    pub product: String,
    /// Order type. Always `MARKET` - no limit orders are placed.
    pub order_type: String,
    /// Validity. Always `DAY`.
    pub validity: String,
}

impl OrderParams {
    /// Build the market/MIS/DAY order params this runtime always sends;
    /// only side, symbol, exchange and quantity vary per dispatch.
    pub fn market_intraday(
        exchange: impl Into<String>,
        tradingsymbol: impl Into<String>,
        transaction_type: TransactionType,
        quantity: u32,
    ) -> Self {
        OrderParams {
            exchange: exchange.into(),
            tradingsymbol: tradingsymbol.into(),
            transaction_type,
            quantity,
            product: "MIS".to_string(),
            order_type: "MARKET".to_string(),
            validity: "DAY".to_string(),
        }
    }
}

/// An order-update event delivered by the broker's streaming connection.
///
/// Mirrors the subset of the broker's postback/WS order-update payload the
/// order service needs to reconcile a persisted order.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerOrderUpdate {
    /// Broker-assigned order id this update refers to.
    pub broker_order_id: String,
    /// Exchange-assigned order id echoed back by this update.
    pub exchange_order_id: Option<String>,
    /// Parent order id echoed back by this update, if this order is a leg
    /// of a multi-leg order.
    pub parent_order_id: Option<String>,
    /// Side of the order as reported by the broker.
    pub transaction_type: TransactionType,
    /// Exchange the order was routed to, as reported by the broker.
    pub exchange: String,
    /// Broker product code, as reported by the broker.
    pub product: String,
    /// Reconciled status.
    pub status: OrderStatus,
    /// Average fill price, present once the order has any fill.
    pub average_price: Option<Decimal>,
    /// Free-text broker status detail, e.g. a rejection reason.
    pub status_message: Option<String>,
    /// Broker-side timestamp of this update, used for `updated_at`.
    pub exchange_update_at: chrono::NaiveDateTime,
}

/// Trait for implementing broker integrations.
///
/// Implementations own the broker's authentication/session lifecycle and
/// transport; callers only see the domain-level operations below.
pub trait Broker: Send + Sync {
    /// Exchange a login `request_token` for an access/refresh token pair and
    /// persist it to the token store.
    fn generate_session(&self, request_token: &str) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Fetch the last traded price for a set of instrument tokens.
    fn get_ltp(&self, tokens: &[u32]) -> Result<Vec<(u32, Decimal)>, Box<dyn Error + Send + Sync>>;

    /// Fetch the full instrument catalogue dump for the given exchanges.
    fn get_instruments(&self, exchanges: &[String]) -> Result<Vec<Instrument>, Box<dyn Error + Send + Sync>>;

    /// Place a market order and return the broker-assigned order id.
    fn place_order(&self, params: &OrderParams) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// Capability to control the broker's live-tick token subscription set.
///
/// Implemented by the broker's streaming-connection adapter. The tracking
/// registry holds one of these and calls it on every `Add`/`Remove` so the
/// adapter's subscribed-token set always mirrors the registry's contents;
/// see `SPEC_FULL.md` 4.C. Kept as a one-method-per-direction capability
/// (rather than handing the registry the whole `Broker`) for the same reason
/// `BasePriceUpdater` exists: the registry should not need to know about the
/// broker's transport, only that it can (un)subscribe a token.
pub trait TokenSubscriber: Send + Sync {
    /// Subscribe to live ticks for `token`. Idempotent.
    fn subscribe_token(&self, token: u32);
    /// Unsubscribe from live ticks for `token`. Idempotent.
    fn unsubscribe_token(&self, token: u32);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_intraday_always_uses_mis_market_day() {
        let params = OrderParams::market_intraday("NSE", "INFY", TransactionType::Buy, 10);
        assert_eq!(params.product, "MIS");
        assert_eq!(params.order_type, "MARKET");
        assert_eq!(params.validity, "DAY");
    }
}
