//! Trackr Core Crate - Intraday Tracking-and-Execution Runtime
//!
//! This crate is the runtime described by the specification's five tightly
//! coupled subsystems: the tick broadcaster, the tracking registry, the
//! signal engine, the order engine/order service, and the day scheduler.
//! Everything outside this crate - the HTTP router, the concrete database,
//! the broker SDK's transport internals - is an external collaborator
//! specified only by the traits in the `model` crate.

// === FINANCIAL APPLICATION SAFETY LINTS ===
// These lint rules are critical for financial applications where precision,
// safety, and reliability are paramount. Violations can lead to financial losses.

#![deny(
    // Error handling safety - force proper error handling
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,

    // Financial precision safety - prevent calculation errors
    clippy::float_arithmetic,
    clippy::arithmetic_side_effects,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,

    // Code quality enforcement
    clippy::cognitive_complexity,
    clippy::too_many_lines,
)]
// Allow unwrap and expect in test code only
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]
// Standard Rust lints for code quality
#![warn(missing_docs, rust_2018_idioms, missing_debug_implementations)]

/// Fan-out of the broker's tick stream to bounded per-subscriber queues.
pub mod broadcaster;
/// Runtime configuration, loaded once at startup from the environment.
pub mod config;
/// Per-crate-boundary error types, see `# 7. ERROR HANDLING DESIGN`.
pub mod error;
/// Symbol/exchange -> instrument token resolver.
pub mod instrument_catalogue;
/// Wall-clock time helpers anchored to IST.
pub mod market_time;
/// Minute-aligned order dispatch and fill reconciliation driver.
pub mod order_engine;
/// Placed-order/order-update race resolution and base-price callback.
pub mod order_service;
/// Authoritative in-memory mapping of tracked instruments.
pub mod registry;
/// Wall-clock job scheduler (`FetchInstruments`, `MarketOpen`, `MarketClose`).
pub mod scheduler;
/// Tick-driven trigger detection with per-minute dedup.
pub mod signal_engine;
/// Minute-scoped dedup buffer between the signal engine and the order engine.
pub mod signal_queue;
/// Constructs and wires every subsystem; the runtime's single entry point.
pub mod supervisor;

pub use config::RuntimeConfig;
pub use supervisor::RuntimeSupervisor;
