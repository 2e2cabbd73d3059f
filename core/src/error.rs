//! Error types for the runtime engines. Each maps to a policy in the
//! distilled spec's `# 7. ERROR HANDLING DESIGN` section; see the variant
//! docs for where each is raised and how callers are expected to react.

use thiserror::Error;

/// Errors raised while the tracking registry is mutated or queried.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// `Add`/`Update` was given invalid trigger parameters.
    #[error("invalid tracked stock: {0}")]
    InvalidStock(#[from] model::TrackedStockError),
}

/// Errors raised while dispatching an order or reconciling an update.
///
/// None of these are fatal to the order engine's minute loop: a single
/// signal's failure is logged and the loop proceeds to the next signal.
#[derive(Debug, Error)]
pub enum OrderServiceError {
    /// The broker rejected or failed to service `place_order`.
    #[error("broker order placement failed: {0}")]
    BrokerTransient(Box<dyn std::error::Error + Send + Sync>),
    /// A persistence call failed outside the "not found" path the
    /// pending-update cache exists to absorb.
    #[error("order persistence failed: {0}")]
    Repository(Box<dyn std::error::Error + Send + Sync>),
    /// The tracking-stock row a signal's token resolves to could not be
    /// found; the signal is dropped.
    #[error("no tracking stock registered for token {0}")]
    UnknownTrackingStock(u32),
}

/// Errors raised by a scheduler job's `RunFunc`.
///
/// Logged only - `LastRun` still advances so the job does not retry until
/// the next day, per the distilled spec's firing rule.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The job's broker or database call failed.
    #[error("scheduler job '{job}' failed: {source}")]
    JobFailed {
        /// Name of the job that failed.
        job: String,
        /// Underlying error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}
