//! Runtime configuration, loaded once at startup - distilled spec section 6
//! "Configuration (env)", expanded in `SPEC_FULL.md` section 1.1.

use std::env;

/// Error returned when a required environment variable is missing.
#[derive(Debug, thiserror::Error)]
#[error("missing required environment variable: {0}")]
pub struct MissingEnvVar(pub &'static str);

/// Process-wide configuration, assembled once at startup and threaded
/// through constructors rather than read from globals in the hot path - see
/// `SPEC_FULL.md` section 9 "Global process state".
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Secret used to sign/verify HS256 JWTs.
    pub jwt_secret: String,
    /// Connection string for the persisted store.
    pub database_url: String,
    /// Origin allowed to make authenticated browser requests.
    pub frontend_url: Option<String>,
    /// Port the HTTP router binds to.
    pub port: u16,
    /// Kite Connect API key.
    pub kite_api_key: Option<String>,
    /// Kite Connect API secret.
    pub kite_api_secret: Option<String>,
    /// Redirect URL registered with Kite Connect for the login callback.
    pub kite_callback_url: Option<String>,
    /// Path to the persisted broker OAuth token file.
    pub token_store_path: String,
}

impl RuntimeConfig {
    /// Loads configuration from the process environment. `DATABASE_URL` is
    /// the only variable whose absence is fatal; the Kite credentials are
    /// optional so the runtime can start unauthenticated and defer to the
    /// auth-callback path, per `SPEC_FULL.md` section 4.I.
    pub fn from_env() -> Result<Self, MissingEnvVar> {
        Ok(RuntimeConfig {
            jwt_secret: env::var("JWT_SECRET").unwrap_or_default(),
            database_url: env::var("DATABASE_URL").map_err(|_| MissingEnvVar("DATABASE_URL"))?,
            frontend_url: env::var("FRONTEND_URL").ok(),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            kite_api_key: env::var("KITE_API_KEY").ok(),
            kite_api_secret: env::var("KITE_API_SECRET").ok(),
            kite_callback_url: env::var("KITE_CALLBACK_URL").ok(),
            token_store_path: env::var("TOKEN_STORE_PATH").unwrap_or_else(|_| "./.token.json".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn missing_database_url_is_the_only_fatal_variable() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        env::remove_var("DATABASE_URL");
        env::remove_var("KITE_API_KEY");
        let err = RuntimeConfig::from_env().expect_err("DATABASE_URL must be required");
        assert_eq!(err.0, "DATABASE_URL");
    }

    #[test]
    fn token_store_path_defaults_to_dot_token_json() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        env::set_var("DATABASE_URL", "sqlite://test.db");
        env::remove_var("TOKEN_STORE_PATH");
        let config = RuntimeConfig::from_env().unwrap();
        assert_eq!(config.token_store_path, "./.token.json");
        env::remove_var("DATABASE_URL");
    }
}
