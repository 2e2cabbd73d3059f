use rust_decimal::Decimal;

/// A single timestamped market-data record for one instrument.
///
/// Ticks are the commodity input of the system: stale ticks are worse than
/// missing ones, so nothing downstream blocks waiting for one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    /// Broker-assigned instrument token this tick refers to.
    pub instrument_token: u32,
    /// Last traded price. A value of zero means "no trade yet" and is dropped
    /// by the signal engine rather than treated as a real price.
    pub last_price: Decimal,
}

/// A batch of ticks delivered together by the broker's streaming connection.
///
/// The broker typically frames several instrument updates per websocket
/// message; the broadcaster fans out whole batches rather than unpacking them,
/// so subscribers see the same framing the wire did.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TickBatch {
    /// Ticks contained in this batch, in wire order.
    pub ticks: Vec<Tick>,
}

impl TickBatch {
    /// Wrap a single tick in a one-element batch. Convenient for tests and
    /// for adapters that receive ticks one at a time.
    pub fn single(tick: Tick) -> Self {
        TickBatch { ticks: vec![tick] }
    }
}
