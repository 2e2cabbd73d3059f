use rust_decimal::Decimal;

/// Which trigger fired.
///
/// See the open question resolution in `SPEC_FULL.md` section 9.2: both
/// variants currently map to the same order side in the order engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// Last price crossed at or above `base_price + target`.
    TargetHit,
    /// Last price crossed at or below `base_price - stop_loss`.
    StoplossHit,
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SignalKind::TargetHit => "TARGET_HIT",
            SignalKind::StoplossHit => "STOPLOSS_HIT",
        };
        write!(f, "{s}")
    }
}

/// A trigger event produced by the signal engine, at most one per instrument
/// per wall-clock minute.
///
/// Carries enough of the registry's snapshot at the moment of the crossing
/// that the order engine and signal queue never need to look the instrument
/// back up in the registry to act on it.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeSignal {
    /// Broker-assigned instrument token.
    pub token: u32,
    /// Trading symbol, carried for logging/persistence only.
    pub symbol: String,
    /// Exchange the symbol trades on.
    pub exchange: String,
    /// Quantity to trade, copied from the registry entry at signal time.
    pub quantity: u32,
    /// Which trigger fired.
    pub kind: SignalKind,
    /// The tick price that caused the crossing.
    pub trigger_price: Decimal,
    /// The base price the crossing was evaluated against.
    pub base_price: Decimal,
    /// The target offset in effect at signal time.
    pub target: Decimal,
    /// The stop-loss offset in effect at signal time.
    pub stop_loss: Decimal,
    /// Wall-clock minute this signal belongs to, for dedup bookkeeping.
    pub minute: chrono::NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_kind_displays_as_spec_vocabulary() {
        assert_eq!(SignalKind::TargetHit.to_string(), "TARGET_HIT");
        assert_eq!(SignalKind::StoplossHit.to_string(), "STOPLOSS_HIT");
    }
}
