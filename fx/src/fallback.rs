//! Static fallback rates.
//!
//! The reference table is maintained by hand and is only an approximation of
//! market rates. It is used when the live provider cannot be reached and no
//! earlier snapshot exists.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use storefront_common::{now, CurrencyCode, CurrencyRegistry, Provenance, RateSnapshot};

use crate::error::{FxError, FxResult};

/// Approximate `base -> quote -> rate` table.
#[derive(Debug, Clone, Default)]
pub struct FallbackTable {
    rates: HashMap<String, HashMap<String, Decimal>>,
}

impl FallbackTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rates for the reference deployment (XOF, USD, EUR). Updated manually, not live.
    pub fn reference() -> Self {
        Self::new()
            .with_rate("XOF", "USD", dec!(0.0016))
            .with_rate("XOF", "EUR", dec!(0.0015))
            .with_rate("USD", "XOF", dec!(620))
            .with_rate("USD", "EUR", dec!(0.92))
            // CFA franc peg.
            .with_rate("EUR", "XOF", dec!(655.96))
            .with_rate("EUR", "USD", dec!(1.09))
    }

    /// Add or replace one approximate rate.
    pub fn with_rate(mut self, base: &str, quote: &str, rate: Decimal) -> Self {
        self.rates
            .entry(base.to_ascii_uppercase())
            .or_default()
            .insert(quote.to_ascii_uppercase(), rate);
        self
    }

    fn quotes(&self, base: &CurrencyCode) -> Option<&HashMap<String, Decimal>> {
        self.rates.get(base.as_str())
    }
}

/// Source of [`Provenance::Fallback`] snapshots.
pub struct FallbackRateSource {
    snapshots: BTreeMap<CurrencyCode, RateSnapshot>,
}

impl FallbackRateSource {
    /// Fallback source over the reference table.
    pub fn new(registry: Arc<CurrencyRegistry>) -> FxResult<Self> {
        Self::with_table(registry, &FallbackTable::reference())
    }

    /// Fallback source over a custom table.
    ///
    /// Every supported base must have a positive rate to every supported
    /// quote; any gap is a configuration defect.
    pub fn with_table(registry: Arc<CurrencyRegistry>, table: &FallbackTable) -> FxResult<Self> {
        let built_at = now();
        let mut snapshots = BTreeMap::new();

        for base in registry.codes() {
            let quotes = table.quotes(base).ok_or_else(|| {
                FxError::ConfigurationDefect(format!("no fallback rates for base {}", base))
            })?;

            let raw = registry
                .codes()
                .filter_map(|quote| quotes.get(quote.as_str()).map(|rate| (quote.clone(), *rate)));

            let snapshot =
                RateSnapshot::build(&registry, base, raw, built_at, Provenance::Fallback)
                    .map_err(|e| {
                        FxError::ConfigurationDefect(format!("fallback table: {}", e))
                    })?;
            snapshots.insert(base.clone(), snapshot);
        }

        Ok(Self { snapshots })
    }

    /// Fallback snapshot for `base`, stamped with the current time.
    pub fn rates_for(&self, base: &CurrencyCode) -> FxResult<RateSnapshot> {
        self.snapshots
            .get(base)
            .map(|snapshot| snapshot.restamped(now()))
            .ok_or_else(|| FxError::UnsupportedCurrency(base.to_string()))
    }
}
