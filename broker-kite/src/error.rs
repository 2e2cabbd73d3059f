//! Errors surfaced by the Kite Connect REST/WS client - see
//! `SPEC_FULL.md` section 7 "Error handling design".

/// Failure modes of a call against Kite Connect's REST or WS surface.
#[derive(Debug, thiserror::Error)]
pub enum KiteError {
    /// Transport-level failure (connection, timeout, TLS).
    #[error("kite transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Kite responded with a well-formed `{"status":"error", ...}` body.
    #[error("kite api error ({status}): {message}")]
    Api {
        /// Kite's reported HTTP status string, e.g. `"error"`.
        status: String,
        /// Kite's human-readable error message.
        message: String,
    },

    /// A call that requires a session was made before one was established.
    #[error("no active kite session - generate_session was not called")]
    NotAuthenticated,

    /// The response body did not parse as the expected shape.
    #[error("malformed kite response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The token store file could not be read or written.
    #[error("token store io error: {0}")]
    TokenStore(#[from] std::io::Error),

    /// The instrument catalogue CSV dump did not parse.
    #[error("malformed instrument dump: {0}")]
    InstrumentDump(String),
}
