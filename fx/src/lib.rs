//! Storefront FX Engine
//!
//! Converts and formats prices across the storefront's supported currencies.
//!
//! # Features
//!
//! - Live rates from an HTTP provider with a bounded request timeout
//! - Rate table with a configurable TTL; stale rates are served when the provider is down
//! - Static fallback rates so conversions never fail for a supported currency
//! - Round-half-up two-decimal results tagged with their rate provenance
//!
//! # Example
//!
//! ```rust,ignore
//! use storefront_fx::{ConversionService, FxConfig};
//! use rust_decimal_macros::dec;
//!
//! let service = ConversionService::from_config(&FxConfig::from_env())?;
//!
//! let price = service.convert(dec!(50), "EUR", "XOF").await?;
//! println!("{} ({})", price.formatted, price.provenance);
//! ```

pub mod cache;
pub mod config;
pub mod conversion;
pub mod error;
pub mod fallback;
pub mod provider;
pub mod resolver;

pub use cache::{RateTable, TableStats};
pub use config::FxConfig;
pub use conversion::{ConversionResult, ConversionService};
pub use error::{FxError, FxResult};
pub use fallback::{FallbackRateSource, FallbackTable};
pub use provider::{LiveRateSource, RateSource, DEFAULT_PROVIDER_URL};
pub use resolver::{RateResolver, ResolverStats};

#[cfg(any(test, feature = "test-utils"))]
pub use provider::MockRateSource;
