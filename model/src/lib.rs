//! Trackr Model Crate - Core Domain Models
//!
//! This crate defines the core domain models for the Trackr intraday
//! tracking-and-execution runtime. All types and traits here enforce strict
//! financial safety standards.

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
)]
// Allow unwrap and expect in test code only
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]
// Standard Rust lints for code quality
#![warn(missing_docs, rust_2018_idioms, missing_debug_implementations)]

/// Broker integration traits and broker-originated event types
pub mod broker;
/// Database abstraction layer
pub mod database;
/// Instrument catalogue entries consumed by the symbol/token resolver
pub mod instrument;
/// Order types and order lifecycle
pub mod order;
/// Trigger signals derived from tick crossings
pub mod signal;
/// Tick and tick-batch types delivered by the broker's market data stream
pub mod tick;
/// Tracked stock: the registry's in-memory entry and its persisted form
pub mod tracked_stock;
/// Authenticated user accounts
pub mod user;

// Re-export the types from the model crate.
pub use broker::{Broker, BrokerOrderUpdate, OrderParams, TokenSubscriber, TransactionType};
pub use database::{
    DatabaseFactory, InstrumentRead, InstrumentWrite, NewTrackingStock, OrderRead, OrderWrite,
    TrackingStockRead, TrackingStockWrite, UserRead, UserWrite,
};
pub use instrument::Instrument;
pub use order::{Order, OrderEventType, OrderStatus, OrderType};
pub use signal::{SignalKind, TradeSignal};
pub use tick::{Tick, TickBatch};
pub use tracked_stock::{BasePriceUpdater, TrackedStock, TrackingStatus, TrackingStockRow};
pub use user::User;
