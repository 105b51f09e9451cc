//! Monetary types for the storefront pricing engine.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::currency::{CurrencyCode, CurrencyRegistry};
use crate::error::{CurrencyError, Result};
use crate::time::Timestamp;

/// Fractional digits of every customer-facing amount.
pub const DISPLAY_SCALE: u32 = 2;

/// Round half-up (midpoint away from zero) to [`DISPLAY_SCALE`] digits,
/// always carrying exactly two fractional digits.
pub fn round_half_up(value: Decimal) -> Decimal {
    let mut rounded =
        value.round_dp_with_strategy(DISPLAY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(DISPLAY_SCALE);
    if rounded.is_zero() {
        rounded.set_sign_positive(true);
    }
    rounded
}

/// Render an amount with thousands separators and two decimals, e.g. `32,798.00`.
pub fn format_amount(value: Decimal) -> String {
    let rounded = round_half_up(value);
    let text = rounded.abs().to_string();
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(text.len() + int_part.len() / 3 + 1);
    if rounded.is_sign_negative() {
        grouped.push('-');
    }
    for (idx, digit) in int_part.chars().enumerate() {
        if idx > 0 && (int_part.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped.push('.');
    grouped.push_str(frac_part);
    grouped
}

/// `"{symbol} {amount}"` as shown to customers.
pub fn format_with_symbol(symbol: &str, value: Decimal) -> String {
    format!("{} {}", symbol, format_amount(value))
}

/// A monetary amount with currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Money {
    /// The amount (exact decimal, may carry more than two digits until rounded).
    pub amount: Decimal,
    /// Currency of the amount.
    pub currency: CurrencyCode,
}

impl Money {
    /// Create a new Money instance.
    pub fn new(amount: Decimal, currency: CurrencyCode) -> Self {
        Self { amount, currency }
    }

    /// Create from a decimal string such as `"19.99"`.
    pub fn from_str(
        amount: &str,
        currency: CurrencyCode,
    ) -> std::result::Result<Self, rust_decimal::Error> {
        Ok(Self {
            amount: amount.trim().parse()?,
            currency,
        })
    }

    /// Create a zero amount in the given currency.
    pub fn zero(currency: CurrencyCode) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency,
        }
    }

    /// Check if amount is zero.
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Check if amount is negative (refunds, credits).
    pub fn is_negative(&self) -> bool {
        self.amount < Decimal::ZERO
    }

    /// Round to a final display value (two digits, half-up).
    pub fn round(&self) -> Self {
        Self {
            amount: round_half_up(self.amount),
            currency: self.currency.clone(),
        }
    }

    /// Convert into `target` using a snapshot based on this amount's currency.
    ///
    /// Same-currency conversion returns the amount untouched. Otherwise the
    /// exact product is rounded half-up to two digits. A product beyond the
    /// range of `Decimal` is `AmountOutOfRange`.
    pub fn convert(&self, target: &CurrencyCode, snapshot: &RateSnapshot) -> Result<Money> {
        if snapshot.base() != &self.currency {
            return Err(CurrencyError::Mismatch {
                expected: snapshot.base().to_string(),
                actual: self.currency.to_string(),
            });
        }

        if target == &self.currency {
            return Ok(self.clone());
        }

        let rate = snapshot
            .rate(target)
            .ok_or_else(|| CurrencyError::Unsupported(target.to_string()))?;

        let amount = self.amount.checked_mul(rate).ok_or_else(|| {
            CurrencyError::AmountOutOfRange {
                amount: self.amount.to_string(),
                from: self.currency.to_string(),
                to: target.to_string(),
            }
        })?;

        Ok(Money {
            amount: round_half_up(amount),
            currency: target.clone(),
        })
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

/// Where a rate snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Provenance {
    /// Fetched from the exchange-rate provider.
    Live,
    /// Static approximation used while the provider is unavailable.
    Fallback,
}

impl Provenance {
    /// Check if the rates came from the live provider.
    pub fn is_live(&self) -> bool {
        matches!(self, Provenance::Live)
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Live => f.write_str("live"),
            Provenance::Fallback => f.write_str("fallback"),
        }
    }
}

/// Exchange rates from one base currency to every supported currency.
///
/// Invariants, checked by [`RateSnapshot::build`]: the base rate is exactly 1,
/// every registry currency has a strictly positive rate, and nothing outside the
/// registry is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateSnapshot {
    base: CurrencyCode,
    rates: BTreeMap<CurrencyCode, Decimal>,
    fetched_at: Timestamp,
    provider_updated_at: Option<Timestamp>,
    provenance: Provenance,
}

impl RateSnapshot {
    /// Build a snapshot from raw `(quote, rate)` pairs.
    ///
    /// Pairs for currencies outside `registry` are dropped. The base rate is
    /// forced to 1.
    pub fn build<I>(
        registry: &CurrencyRegistry,
        base: &CurrencyCode,
        raw_rates: I,
        fetched_at: Timestamp,
        provenance: Provenance,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = (CurrencyCode, Decimal)>,
    {
        if !registry.contains(base) {
            return Err(CurrencyError::Unsupported(base.to_string()));
        }

        let mut rates: BTreeMap<CurrencyCode, Decimal> = raw_rates
            .into_iter()
            .filter(|(quote, _)| registry.contains(quote))
            .collect();
        rates.insert(base.clone(), Decimal::ONE);

        for code in registry.codes() {
            match rates.get(code) {
                None => {
                    return Err(CurrencyError::IncompleteRates {
                        base: base.to_string(),
                        missing: code.to_string(),
                    })
                }
                Some(rate) if *rate <= Decimal::ZERO => {
                    return Err(CurrencyError::NonPositiveRate {
                        base: base.to_string(),
                        quote: code.to_string(),
                        rate: rate.to_string(),
                    })
                }
                Some(_) => {}
            }
        }

        Ok(Self {
            base: base.clone(),
            rates,
            fetched_at,
            provider_updated_at: None,
            provenance,
        })
    }

    /// Attach the provider's own "last updated" stamp.
    pub fn with_provider_updated_at(mut self, updated_at: Timestamp) -> Self {
        self.provider_updated_at = Some(updated_at);
        self
    }

    /// Same rates, re-stamped. Used to hand out a static table as a new snapshot.
    pub fn restamped(&self, fetched_at: Timestamp) -> Self {
        Self {
            fetched_at,
            ..self.clone()
        }
    }

    /// Base currency the rates are quoted against.
    pub fn base(&self) -> &CurrencyCode {
        &self.base
    }

    /// Rate from the base into `quote`, if present.
    pub fn rate(&self, quote: &CurrencyCode) -> Option<Decimal> {
        self.rates.get(quote).copied()
    }

    /// All rates, keyed by quote currency.
    pub fn rates(&self) -> &BTreeMap<CurrencyCode, Decimal> {
        &self.rates
    }

    /// When the rates were obtained locally; drives staleness.
    pub fn fetched_at(&self) -> Timestamp {
        self.fetched_at
    }

    /// The provider's own last-updated stamp, for live rates.
    pub fn provider_updated_at(&self) -> Option<Timestamp> {
        self.provider_updated_at
    }

    /// Live or fallback.
    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    /// Age at `now`. Negative ages (clock skew) count as zero.
    pub fn age(&self, now: Timestamp) -> chrono::Duration {
        let age = now.signed_duration_since(self.fetched_at);
        if age < chrono::Duration::zero() {
            chrono::Duration::zero()
        } else {
            age
        }
    }

    /// Whether the snapshot is at least `ttl` old at `now`.
    pub fn is_stale(&self, now: Timestamp, ttl: chrono::Duration) -> bool {
        self.age(now) >= ttl
    }
}
