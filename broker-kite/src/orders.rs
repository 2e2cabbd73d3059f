//! Order placement - the order engine's only outbound call to the broker.

use crate::error::KiteError;
use model::OrderParams;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct PlaceOrderData {
    order_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum PlaceOrderEnvelope {
    Success { data: PlaceOrderData },
    Error { message: String },
}

/// Places a single `regular`-variety market order and returns the
/// broker-assigned order id the order service tracks for reconciliation.
pub fn place_order(
    http: &reqwest::blocking::Client,
    base_url: &str,
    auth_header: &str,
    params: &OrderParams,
) -> Result<String, KiteError> {
    let response = http
        .post(format!("{base_url}/orders/regular"))
        .header("X-Kite-Version", "3")
        .header("Authorization", auth_header)
        .form(&[
            ("tradingsymbol", params.tradingsymbol.as_str()),
            ("exchange", params.exchange.as_str()),
            ("transaction_type", &params.transaction_type.to_string()),
            ("order_type", params.order_type.as_str()),
            ("quantity", &params.quantity.to_string()),
            ("product", params.product.as_str()),
            ("validity", params.validity.as_str()),
        ])
        .send()?
        .error_for_status()?;

    let envelope: PlaceOrderEnvelope = response.json()?;
    match envelope {
        PlaceOrderEnvelope::Success { data } => Ok(data.order_id),
        PlaceOrderEnvelope::Error { message } => Err(KiteError::Api {
            status: "error".to_string(),
            message,
        }),
    }
}
