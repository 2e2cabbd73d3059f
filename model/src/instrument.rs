/// A single row of the broker's instrument catalogue, as needed by the
/// symbol/exchange -> token resolver.
///
/// Only the fields the resolver needs are kept; the catalogue's fuller
/// dump (lot size, tick size, expiry, etc.) is out of scope - see
/// `SPEC_FULL.md` section 4.J.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instrument {
    /// Broker-assigned instrument token.
    pub token: u32,
    /// Trading symbol.
    pub symbol: String,
    /// Exchange the symbol trades on.
    pub exchange: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instrument_is_identified_by_symbol_and_exchange_pair() {
        let nse = Instrument {
            token: 1,
            symbol: "INFY".to_string(),
            exchange: "NSE".to_string(),
        };
        let bse = Instrument {
            token: 2,
            symbol: "INFY".to_string(),
            exchange: "BSE".to_string(),
        };
        assert_ne!(nse, bse);
    }
}
