//! Error types for database operations and conversions
//!
//! This module provides error types for handling database conversion failures
//! that can occur when mapping between database rows and domain models.

use std::error::Error;
use std::fmt;

/// Error type for database row to domain model conversions
#[derive(Debug)]
pub struct ConversionError {
    field: String,
    details: String,
}

impl ConversionError {
    /// Create a new conversion error
    pub fn new(field: impl Into<String>, details: impl Into<String>) -> Self {
        ConversionError {
            field: field.into(),
            details: details.into(),
        }
    }
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Conversion error for field '{}': {}",
            self.field, self.details
        )
    }
}

impl Error for ConversionError {}

/// Helper trait for converting SQLite models to domain models
pub trait IntoDomainModel<T> {
    /// Convert SQLite model to domain model, handling errors
    fn into_domain_model(self) -> Result<T, Box<dyn Error + Send + Sync>>;
}

/// Helper trait for converting collections of SQLite models
pub trait IntoDomainModels<T> {
    /// Convert collection of SQLite models to domain models
    fn into_domain_models(self) -> Result<Vec<T>, Box<dyn Error + Send + Sync>>;
}

impl<S, T> IntoDomainModels<T> for Vec<S>
where
    S: IntoDomainModel<T>,
{
    fn into_domain_models(self) -> Result<Vec<T>, Box<dyn Error + Send + Sync>> {
        self.into_iter()
            .map(|item| item.into_domain_model())
            .collect()
    }
}

/// Narrow a broker-assigned `u32` instrument token down to SQLite's `i32`
/// storage column.
pub fn token_to_i32(token: u32) -> Result<i32, Box<dyn Error + Send + Sync>> {
    i32::try_from(token).map_err(|_| "instrument token does not fit in i32".into())
}

/// Widen an `i32` storage column back to a broker-assigned `u32` token.
pub fn token_from_i32(token: i32) -> Result<u32, ConversionError> {
    u32::try_from(token).map_err(|_| ConversionError::new("token", "negative instrument token"))
}

/// Render a `Decimal` for `TEXT`-column storage, preserving full precision
/// (SQLite has no native decimal type).
pub fn decimal_to_text(value: rust_decimal::Decimal) -> String {
    value.to_string()
}

/// Parse a `Decimal` back out of a `TEXT` storage column.
pub fn decimal_from_text(value: &str) -> Result<rust_decimal::Decimal, ConversionError> {
    value
        .parse()
        .map_err(|_| ConversionError::new("decimal", format!("invalid decimal literal '{value}'")))
}
