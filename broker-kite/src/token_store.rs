//! Persisted OAuth token pair - distilled spec section 6 "Token store".
//!
//! Kite Connect's login flow exchanges a short-lived `request_token` for an
//! `access_token` that is valid until the next day's forced logout. We keep
//! that pair (plus the refresh token Kite issues alongside it) in a small
//! JSON file so a restart does not force a fresh browser login while the
//! token is still live.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// The persisted shape of `TOKEN_STORE_PATH`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredToken {
    /// Short-lived token used to authenticate REST and WS calls.
    pub access_token: String,
    /// Long-lived token Kite issues alongside the access token.
    pub refresh_token: String,
    /// UTC instant the access token stops being valid.
    pub expiry: chrono::NaiveDateTime,
}

/// Reads and writes the single persisted token file at a configured path.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// Builds a store rooted at `path`. Does not touch the filesystem.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        TokenStore { path: path.into() }
    }

    /// Loads the stored token, if the file exists and parses. Absence or a
    /// parse failure both read as "no session" - the caller falls back to
    /// the login-callback flow rather than treating this as fatal.
    pub fn load(&self) -> Option<StoredToken> {
        let contents = fs::read_to_string(&self.path).ok()?;
        serde_json::from_str(&contents).ok()
    }

    /// Persists `token`, overwriting whatever was there before. Regenerated
    /// on every fresh session per `SPEC_FULL.md` section 6.1.
    pub fn store(&self, token: &StoredToken) -> Result<(), std::io::Error> {
        let serialized = serde_json::to_string_pretty(token)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serialized)
    }

    /// Whether a stored token is still valid as of `now`.
    pub fn is_live(token: &StoredToken, now: chrono::NaiveDateTime) -> bool {
        token.expiry > now
    }

    /// The configured path, for diagnostics/logging.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample(expiry: chrono::NaiveDateTime) -> StoredToken {
        StoredToken {
            access_token: "abc".to_string(),
            refresh_token: "def".to_string(),
            expiry,
        }
    }

    #[test]
    fn round_trips_through_the_filesystem() {
        let dir = std::env::temp_dir().join(format!("trackr-token-store-test-{}", std::process::id()));
        let path = dir.join("token.json");
        let store = TokenStore::new(&path);

        assert!(store.load().is_none());

        let expiry = NaiveDate::from_ymd_opt(2026, 7, 29).unwrap().and_hms_opt(6, 0, 0).unwrap();
        store.store(&sample(expiry)).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.access_token, "abc");
        assert_eq!(loaded.expiry, expiry);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn is_live_compares_against_the_supplied_instant() {
        let expiry = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap().and_hms_opt(6, 0, 0).unwrap();
        let token = sample(expiry);
        let before = expiry - chrono::Duration::hours(1);
        let after = expiry + chrono::Duration::hours(1);
        assert!(TokenStore::is_live(&token, before));
        assert!(!TokenStore::is_live(&token, after));
    }
}
