//! Instrument catalogue dump - backs `FetchInstruments`, the scheduler job
//! that refreshes the symbol/exchange -> token resolver every morning.

use crate::error::KiteError;
use model::Instrument;
use serde::Deserialize;

/// One row of Kite Connect's published instrument CSV dump. Only the
/// columns the resolver needs are kept; the dump carries many more (expiry,
/// strike, lot size, tick size) that are out of scope here.
#[derive(Debug, Deserialize)]
struct InstrumentRow {
    instrument_token: u32,
    tradingsymbol: String,
    exchange: String,
}

/// Fetches and parses the instrument dump for each of `exchanges`.
/// Kite publishes one CSV per exchange at `/instruments/{exchange}`.
pub fn get_instruments(
    http: &reqwest::blocking::Client,
    base_url: &str,
    auth_header: &str,
    exchanges: &[String],
) -> Result<Vec<Instrument>, KiteError> {
    let mut instruments = Vec::new();
    for exchange in exchanges {
        let response = http
            .get(format!("{base_url}/instruments/{exchange}"))
            .header("X-Kite-Version", "3")
            .header("Authorization", auth_header)
            .send()?
            .error_for_status()?;

        let body = response.text()?;
        let mut reader = csv::Reader::from_reader(body.as_bytes());
        for record in reader.deserialize::<InstrumentRow>() {
            let row = record.map_err(|error| KiteError::InstrumentDump(error.to_string()))?;
            instruments.push(Instrument {
                token: row.instrument_token,
                symbol: row.tradingsymbol,
                exchange: row.exchange,
            });
        }
    }
    Ok(instruments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_documented_csv_columns() {
        let csv = "instrument_token,exchange_token,tradingsymbol,name,last_price,expiry,strike,tick_size,lot_size,instrument_type,segment,exchange\n\
                    408065,1594,INFY,INFOSYS,0,,0,0.05,1,EQ,NSE,NSE\n";
        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        let rows: Vec<InstrumentRow> = reader.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].instrument_token, 408065);
        assert_eq!(rows[0].tradingsymbol, "INFY");
    }
}
