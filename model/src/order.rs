use crate::broker::TransactionType;
use rust_decimal::Decimal;

/// Side of an order submitted to the broker.
///
/// Both `SignalKind` variants currently map to `Buy` - see the `// BUG:`
/// comment at the mapping site in the order engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    /// Buy order.
    Buy,
    /// Sell order.
    Sell,
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderType::Buy => "BUY",
            OrderType::Sell => "SELL",
        };
        write!(f, "{s}")
    }
}

/// Which trigger produced the order, mirrors `SignalKind` but persisted
/// alongside the order row so the trigger that caused a fill is still known
/// after the signal itself has been consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderEventType {
    /// Order was dispatched because of a `TARGET_HIT` signal.
    TargetHit,
    /// Order was dispatched because of a `STOPLOSS_HIT` signal.
    StoplossHit,
}

impl std::fmt::Display for OrderEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderEventType::TargetHit => "TARGET_HIT",
            OrderEventType::StoplossHit => "STOPLOSS_HIT",
        };
        write!(f, "{s}")
    }
}

/// Lifecycle status of an order as reconciled with the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderStatus {
    /// Placed with the broker, no terminal update received yet.
    #[default]
    Pending,
    /// Broker confirmed a fill.
    Completed,
    /// Order was cancelled, by us or by the broker.
    Cancelled,
    /// Broker rejected the order.
    Rejected,
}

impl OrderStatus {
    /// Whether this status is terminal - no further broker updates are
    /// expected once an order reaches it.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Rejected => "REJECTED",
        };
        write!(f, "{s}")
    }
}

/// Error returned when parsing an invalid order status string.
#[derive(Debug)]
pub struct OrderStatusParseError;

impl std::str::FromStr for OrderStatus {
    type Err = OrderStatusParseError;
    fn from_str(status: &str) -> Result<Self, Self::Err> {
        match status {
            "PENDING" => Ok(OrderStatus::Pending),
            "COMPLETED" => Ok(OrderStatus::Completed),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            "REJECTED" => Ok(OrderStatus::Rejected),
            _ => Err(OrderStatusParseError),
        }
    }
}

/// A persisted order, keyed on the broker's own order id once placement
/// succeeds.
///
/// Created by the order engine at dispatch time and reconciled by the order
/// service as broker order-update events arrive; see `PendingUpdate` in the
/// order service for the placed-before-update race this record exists to
/// resolve.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    /// Database identity.
    pub id: uuid::Uuid,
    /// The tracking-stock row this order was dispatched for.
    pub tracking_stock_id: uuid::Uuid,
    /// Broker-assigned order id, unique once placement succeeds.
    pub broker_order_id: Option<String>,
    /// Exchange-assigned order id, echoed back on a broker order-update.
    pub exchange_order_id: Option<String>,
    /// Parent order id, set when the broker reports this order as a leg of
    /// a multi-leg order.
    pub parent_order_id: Option<String>,
    /// Side of the order.
    pub order_type: OrderType,
    /// Trigger that caused this order.
    pub event_type: OrderEventType,
    /// Side of the order in the broker's own vocabulary, as echoed back on
    /// an order-update - kept alongside `order_type` since the broker's
    /// update payload reports it independently.
    pub transaction_type: TransactionType,
    /// Exchange the order was routed to.
    pub exchange: String,
    /// Broker product code (always `MIS` for this runtime).
    pub product: String,
    /// Base price in effect when the order was dispatched.
    pub base_price: Decimal,
    /// Quantity dispatched.
    pub quantity: u32,
    /// Tick price that caused the trigger.
    pub trigger_price: Decimal,
    /// Broker-reported average fill price, set on completion.
    pub purchase_price: Option<Decimal>,
    /// Current lifecycle status.
    pub status: OrderStatus,
    /// Free-text status detail from the broker, e.g. a rejection reason.
    pub status_message: Option<String>,
    /// When the order was dispatched.
    pub placed_at: chrono::NaiveDateTime,
    /// When this row was last reconciled against a broker update.
    pub updated_at: chrono::NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_completed_cancelled_rejected_are_terminal() {
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
    }

    #[test]
    fn status_roundtrips_through_display_and_fromstr() {
        use std::str::FromStr;
        for status in [
            OrderStatus::Pending,
            OrderStatus::Completed,
            OrderStatus::Cancelled,
            OrderStatus::Rejected,
        ] {
            let parsed = OrderStatus::from_str(&status.to_string()).unwrap();
            assert_eq!(parsed, status);
        }
    }
}
