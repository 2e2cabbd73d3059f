//! Login exchange: trades a request token for an access/refresh token pair.
//!
//! Kite Connect's login flow redirects the user's browser back to the
//! registered callback URL with a `request_token` query parameter (see
//! `SPEC_FULL.md` section 4.K, route `GET /kite/callback`). The broker
//! adapter exchanges that token for a session here; every other REST/WS call
//! then authenticates with the resulting access token.

use crate::error::KiteError;
use crate::token_store::StoredToken;
use chrono::Timelike;
use serde::Deserialize;
use sha2::{Digest, Sha256};

#[derive(Debug, Deserialize)]
struct SessionData {
    access_token: String,
    refresh_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum SessionEnvelope {
    Success { data: SessionData },
    Error { message: String },
}

/// Kite Connect's login checksum: `sha256(api_key + request_token + api_secret)`.
fn checksum(api_key: &str, request_token: &str, api_secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    hasher.update(request_token.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Access tokens expire at the next 6 AM IST forced logout, per Kite
/// Connect's published session lifetime.
fn next_expiry(now: chrono::DateTime<chrono_tz::Tz>) -> chrono::NaiveDateTime {
    let today_reset = now.date_naive().and_hms_opt(6, 0, 0).unwrap_or_default();
    if now.hour() < 6 {
        today_reset.naive_local()
    } else {
        (today_reset + chrono::Duration::days(1)).naive_local()
    }
}

/// Exchanges `request_token` for a session and returns the token to persist.
pub fn generate_session(
    http: &reqwest::blocking::Client,
    base_url: &str,
    api_key: &str,
    api_secret: &str,
    request_token: &str,
) -> Result<StoredToken, KiteError> {
    let checksum = checksum(api_key, request_token, api_secret);
    let response = http
        .post(format!("{base_url}/session/token"))
        .header("X-Kite-Version", "3")
        .form(&[
            ("api_key", api_key),
            ("request_token", request_token),
            ("checksum", checksum.as_str()),
        ])
        .send()?
        .error_for_status()?;

    let envelope: SessionEnvelope = response.json()?;
    match envelope {
        SessionEnvelope::Success { data } => {
            let now = chrono::Utc::now().with_timezone(&chrono_tz::Asia::Kolkata);
            Ok(StoredToken {
                access_token: data.access_token,
                refresh_token: data.refresh_token,
                expiry: next_expiry(now),
            })
        }
        SessionEnvelope::Error { message } => Err(KiteError::Api {
            status: "error".to_string(),
            message,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_the_documented_sha256_concatenation() {
        let digest = checksum("key", "token", "secret");
        let mut hasher = Sha256::new();
        hasher.update(b"keytokensecret");
        assert_eq!(digest, hex::encode(hasher.finalize()));
    }

    #[test]
    fn expiry_rolls_to_the_next_six_am_after_the_morning_reset() {
        use chrono::TimeZone;
        let before_reset = chrono_tz::Asia::Kolkata.with_ymd_and_hms(2026, 7, 28, 5, 0, 0).unwrap();
        assert_eq!(next_expiry(before_reset).date(), chrono::NaiveDate::from_ymd_opt(2026, 7, 28).unwrap());

        let after_reset = chrono_tz::Asia::Kolkata.with_ymd_and_hms(2026, 7, 28, 10, 0, 0).unwrap();
        assert_eq!(next_expiry(after_reset).date(), chrono::NaiveDate::from_ymd_opt(2026, 7, 29).unwrap());
    }
}
