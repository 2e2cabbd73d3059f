//! Last-traded-price lookups - backs the signal engine's base-price priming
//! when a tracked stock is first added, before any tick or fill has arrived.

use crate::error::KiteError;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
struct LtpQuote {
    instrument_token: u32,
    last_price: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum LtpEnvelope {
    Success { data: HashMap<String, LtpQuote> },
    Error { message: String },
}

/// Fetches the last traded price for each of `tokens`, in the broker's own
/// ordering (callers must not assume the response preserves request order).
pub fn get_ltp(
    http: &reqwest::blocking::Client,
    base_url: &str,
    auth_header: &str,
    tokens: &[u32],
) -> Result<Vec<(u32, Decimal)>, KiteError> {
    if tokens.is_empty() {
        return Ok(Vec::new());
    }

    let query: Vec<(&str, String)> = tokens.iter().map(|t| ("i", t.to_string())).collect();
    let response = http
        .get(format!("{base_url}/quote/ltp"))
        .header("X-Kite-Version", "3")
        .header("Authorization", auth_header)
        .query(&query)
        .send()?
        .error_for_status()?;

    let envelope: LtpEnvelope = response.json()?;
    match envelope {
        LtpEnvelope::Success { data } => Ok(data
            .into_values()
            .map(|quote| (quote.instrument_token, quote.last_price))
            .collect()),
        LtpEnvelope::Error { message } => Err(KiteError::Api {
            status: "error".to_string(),
            message,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_token_list_skips_the_network_call() {
        let http = reqwest::blocking::Client::new();
        let result = get_ltp(&http, "http://127.0.0.1:1", "token x:y", &[]).unwrap();
        assert!(result.is_empty());
    }
}
