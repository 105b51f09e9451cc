//! FX error types.

use storefront_common::CurrencyError;
use thiserror::Error;

/// Errors that can occur while resolving rates or converting prices.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FxError {
    /// Currency code outside the supported registry.
    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    /// Amount and rate snapshot are in different currencies.
    #[error("Currency mismatch: expected {expected}, got {actual}")]
    CurrencyMismatch { expected: String, actual: String },

    /// The converted amount does not fit in a `Decimal`.
    #[error("Amount out of range: {0}")]
    AmountOutOfRange(String),

    /// The live rate provider could not produce a usable snapshot.
    #[error("Rate provider {provider} unavailable: {reason}")]
    ProviderUnavailable { provider: String, reason: String },

    /// Static configuration is inconsistent; fatal at startup.
    #[error("Configuration defect: {0}")]
    ConfigurationDefect(String),
}

impl FxError {
    pub(crate) fn provider(provider: &str, reason: impl ToString) -> Self {
        FxError::ProviderUnavailable {
            provider: provider.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether a later, independent request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FxError::ProviderUnavailable { .. })
    }

    /// Stable error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            FxError::UnsupportedCurrency(_) => "UNSUPPORTED_CURRENCY",
            FxError::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
            FxError::AmountOutOfRange(_) => "AMOUNT_OUT_OF_RANGE",
            FxError::ProviderUnavailable { .. } => "PROVIDER_UNAVAILABLE",
            FxError::ConfigurationDefect(_) => "CONFIGURATION_DEFECT",
        }
    }
}

impl From<CurrencyError> for FxError {
    fn from(err: CurrencyError) -> Self {
        match err {
            CurrencyError::Unsupported(code) | CurrencyError::InvalidCode(code) => {
                FxError::UnsupportedCurrency(code)
            }
            CurrencyError::Mismatch { expected, actual } => {
                FxError::CurrencyMismatch { expected, actual }
            }
            err @ CurrencyError::AmountOutOfRange { .. } => {
                FxError::AmountOutOfRange(err.to_string())
            }
            other => FxError::ConfigurationDefect(other.to_string()),
        }
    }
}

/// Result type for FX operations.
pub type FxResult<T> = Result<T, FxError>;
