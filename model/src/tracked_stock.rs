use rust_decimal::Decimal;

/// Capability to push a fresh cost basis into the tracking registry.
///
/// Implemented by the registry. The order service calls this, and only
/// this, when a fill completes - it must not depend on the registry type
/// itself, since the registry also depends on the order service's
/// `TradeSignal` consumers indirectly through the signal queue. The
/// supervisor wires the capability in after both objects exist, breaking
/// the cycle; see `SPEC_FULL.md` section 9.
pub trait BasePriceUpdater: Send + Sync {
    /// Updates the base price of the tracked instrument identified by
    /// `token`. No-op if the token is not currently tracked.
    fn update_base_price(&self, token: u32, price: Decimal);
}

/// A tracked instrument as held by the in-memory tracking registry.
///
/// `TrackedStock` is the registry's authoritative unit: triggers are always
/// evaluated against the copy held by the registry, never against a stale
/// clone kept by a caller.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedStock {
    /// Broker-assigned instrument token. Primary key; a token appears at most
    /// once in the registry.
    pub token: u32,
    /// Trading symbol. Display/lookup only - the token is the identity.
    pub symbol: String,
    /// Exchange the symbol trades on (e.g. `NSE`, `BSE`).
    pub exchange: String,
    /// Reference price triggers are evaluated relative to. `0` means "not yet
    /// primed" - see [`TrackedStock::is_primed`].
    pub base_price: Decimal,
    /// Absolute price offset above `base_price` that fires `TARGET_HIT`.
    pub target: Decimal,
    /// Absolute price offset below `base_price` that fires `STOPLOSS_HIT`.
    pub stop_loss: Decimal,
    /// Quantity to trade when a signal fires.
    pub quantity: u32,
}

/// Error returned when constructing a `TrackedStock` with invalid parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TrackedStockError {
    /// `target` must be strictly positive.
    #[error("target must be greater than zero")]
    NonPositiveTarget,
    /// `stop_loss` must be strictly positive.
    #[error("stop_loss must be greater than zero")]
    NonPositiveStopLoss,
    /// `quantity` must be strictly positive.
    #[error("quantity must be greater than zero")]
    NonPositiveQuantity,
}

impl TrackedStock {
    /// Construct a tracked stock, validating the invariants the spec requires:
    /// `target > 0`, `stop_loss > 0`, `quantity > 0`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        token: u32,
        symbol: impl Into<String>,
        exchange: impl Into<String>,
        base_price: Decimal,
        target: Decimal,
        stop_loss: Decimal,
        quantity: u32,
    ) -> Result<Self, TrackedStockError> {
        if target <= Decimal::ZERO {
            return Err(TrackedStockError::NonPositiveTarget);
        }
        if stop_loss <= Decimal::ZERO {
            return Err(TrackedStockError::NonPositiveStopLoss);
        }
        if quantity == 0 {
            return Err(TrackedStockError::NonPositiveQuantity);
        }
        Ok(TrackedStock {
            token,
            symbol: symbol.into(),
            exchange: exchange.into(),
            base_price,
            target,
            stop_loss,
            quantity,
        })
    }

    /// Whether this stock has a meaningful cost basis to evaluate triggers
    /// against. See open question resolution in `SPEC_FULL.md` section 9.1.
    pub fn is_primed(&self) -> bool {
        self.base_price > Decimal::ZERO
    }

    /// The price at or above which a `TARGET_HIT` fires.
    pub fn target_price(&self) -> Decimal {
        self.base_price + self.target
    }

    /// The price at or below which a `STOPLOSS_HIT` fires.
    pub fn stop_price(&self) -> Decimal {
        self.base_price - self.stop_loss
    }
}

/// System-managed lifecycle status of a persisted tracking-stock row.
///
/// `ACTIVE` is user-enabled today. `AUTO_ACTIVE` is system re-enabled at open
/// from a prior `AUTO_INACTIVE`. `AUTO_INACTIVE` is parked overnight.
/// `INACTIVE` is user-stopped and never auto-resumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackingStatus {
    /// User-enabled today.
    Active,
    /// System-enabled at open from a prior `AUTO_INACTIVE`.
    AutoActive,
    /// Parked overnight by the market-close job.
    AutoInactive,
    /// User-stopped.
    #[default]
    Inactive,
}

impl TrackingStatus {
    /// Whether this status counts as "currently tracked" for the purposes of
    /// the market-close demotion job.
    pub fn is_active(self) -> bool {
        matches!(self, TrackingStatus::Active | TrackingStatus::AutoActive)
    }
}

impl std::fmt::Display for TrackingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TrackingStatus::Active => "ACTIVE",
            TrackingStatus::AutoActive => "AUTO_ACTIVE",
            TrackingStatus::AutoInactive => "AUTO_INACTIVE",
            TrackingStatus::Inactive => "INACTIVE",
        };
        write!(f, "{s}")
    }
}

/// Error returned when parsing an invalid tracking status string.
#[derive(Debug)]
pub struct TrackingStatusParseError;

impl std::str::FromStr for TrackingStatus {
    type Err = TrackingStatusParseError;
    fn from_str(status: &str) -> Result<Self, Self::Err> {
        match status {
            "ACTIVE" => Ok(TrackingStatus::Active),
            "AUTO_ACTIVE" => Ok(TrackingStatus::AutoActive),
            "AUTO_INACTIVE" => Ok(TrackingStatus::AutoInactive),
            "INACTIVE" => Ok(TrackingStatus::Inactive),
            _ => Err(TrackingStatusParseError),
        }
    }
}

/// Persisted form of a tracked stock, as stored in `tracking_stocks`.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingStockRow {
    /// Database identity.
    pub id: uuid::Uuid,
    /// Owning user.
    pub user_id: uuid::Uuid,
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
    /// Current lifecycle status.
    pub status: TrackingStatus,
    /// Creation timestamp.
    pub created_at: chrono::NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn new_rejects_non_positive_target() {
        let err = TrackedStock::new(1, "INFY", "NSE", dec!(0), dec!(0), dec!(3), 10)
            .expect_err("zero target must be rejected");
        assert_eq!(err, TrackedStockError::NonPositiveTarget);
    }

    #[test]
    fn new_rejects_non_positive_stop_loss() {
        let err = TrackedStock::new(1, "INFY", "NSE", dec!(0), dec!(5), dec!(-1), 10)
            .expect_err("negative stop_loss must be rejected");
        assert_eq!(err, TrackedStockError::NonPositiveStopLoss);
    }

    #[test]
    fn new_rejects_zero_quantity() {
        let err = TrackedStock::new(1, "INFY", "NSE", dec!(0), dec!(5), dec!(3), 0)
            .expect_err("zero quantity must be rejected");
        assert_eq!(err, TrackedStockError::NonPositiveQuantity);
    }

    #[test]
    fn is_primed_requires_positive_base_price() {
        let stock = TrackedStock::new(1, "INFY", "NSE", dec!(0), dec!(5), dec!(3), 10).unwrap();
        assert!(!stock.is_primed());
        let primed = TrackedStock {
            base_price: dec!(100),
            ..stock
        };
        assert!(primed.is_primed());
    }

    #[test]
    fn target_and_stop_price_are_offsets_from_base() {
        let stock = TrackedStock::new(1, "INFY", "NSE", dec!(100), dec!(5), dec!(3), 10).unwrap();
        assert_eq!(stock.target_price(), dec!(105));
        assert_eq!(stock.stop_price(), dec!(97));
    }

    #[test]
    fn status_roundtrips_through_display_and_fromstr() {
        use std::str::FromStr;
        for status in [
            TrackingStatus::Active,
            TrackingStatus::AutoActive,
            TrackingStatus::AutoInactive,
            TrackingStatus::Inactive,
        ] {
            let parsed = TrackingStatus::from_str(&status.to_string()).unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn only_active_variants_count_as_active() {
        assert!(TrackingStatus::Active.is_active());
        assert!(TrackingStatus::AutoActive.is_active());
        assert!(!TrackingStatus::AutoInactive.is_active());
        assert!(!TrackingStatus::Inactive.is_active());
    }
}
