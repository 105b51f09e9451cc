//! Storefront Common Types
//!
//! Shared types for the storefront pricing engine: the supported-currency
//! registry, monetary values, exchange-rate snapshots and time helpers.

pub mod currency;
pub mod monetary;
pub mod error;
pub mod time;

pub use currency::*;
pub use monetary::*;
pub use error::*;
pub use time::*;
