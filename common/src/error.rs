//! Error types for currency and monetary operations.

use thiserror::Error;

/// Errors raised by the currency registry and monetary types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CurrencyError {
    /// The code is not part of the supported-currency registry.
    #[error("Unsupported currency: {0}")]
    Unsupported(String),

    /// Not a 3-letter ASCII currency code.
    #[error("Invalid currency code: {0:?}")]
    InvalidCode(String),

    /// Operation mixed two different currencies.
    #[error("Currency mismatch: expected {expected}, got {actual}")]
    Mismatch { expected: String, actual: String },

    /// A rate set is missing a supported currency.
    #[error("Rates for {base} are missing {missing}")]
    IncompleteRates { base: String, missing: String },

    /// A rate is zero or negative.
    #[error("Rate {base}/{quote} must be strictly positive, got {rate}")]
    NonPositiveRate {
        base: String,
        quote: String,
        rate: String,
    },

    /// A converted amount does not fit in a `Decimal`.
    #[error("Converting {amount} {from} to {to} overflows")]
    AmountOutOfRange {
        amount: String,
        from: String,
        to: String,
    },

    /// The registry definition itself is inconsistent.
    #[error("Invalid currency registry: {0}")]
    InvalidRegistry(String),
}

/// Result type alias for currency operations.
pub type Result<T> = std::result::Result<T, CurrencyError>;
