//! Price conversion service: the entry point used by checkout and display code.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use storefront_common::{
    format_with_symbol, now, CurrencyCode, CurrencyRegistry, Money, Provenance, RateSnapshot,
    Timestamp,
};
use tracing::{info, instrument};

use crate::cache::RateTable;
use crate::config::FxConfig;
use crate::error::FxResult;
use crate::fallback::FallbackRateSource;
use crate::provider::{LiveRateSource, RateSource};
use crate::resolver::{RateResolver, ResolverStats};

/// A converted price, tagged with where its rate came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionResult {
    /// Converted amount.
    pub money: Money,
    /// Display symbol of the target currency.
    pub symbol: String,
    /// `"{symbol} {amount}"`, e.g. `FCFA 32,798.00`.
    pub formatted: String,
    /// Live or fallback rates.
    pub provenance: Provenance,
    /// Rate applied (1 for same-currency conversions).
    pub rate: Decimal,
    /// When the rates used were obtained.
    pub rates_as_of: Timestamp,
}

impl ConversionResult {
    /// Target currency code.
    pub fn code(&self) -> &CurrencyCode {
        &self.money.currency
    }

    /// Converted amount.
    pub fn amount(&self) -> Decimal {
        self.money.amount
    }

    /// Whether the price comes from a static approximation.
    pub fn is_approximate(&self) -> bool {
        !self.provenance.is_live()
    }
}

/// Converts and formats prices across the supported currencies.
#[derive(Clone)]
pub struct ConversionService {
    registry: Arc<CurrencyRegistry>,
    resolver: RateResolver,
}

impl ConversionService {
    /// Create a service around an existing resolver.
    pub fn new(registry: Arc<CurrencyRegistry>, resolver: RateResolver) -> Self {
        Self { registry, resolver }
    }

    /// Wire registry, rate table, live provider and fallback table from configuration.
    ///
    /// Fails with `ConfigurationDefect` on an invalid configuration or an
    /// incomplete fallback table.
    pub fn from_config(config: &FxConfig) -> FxResult<Self> {
        config.validate()?;
        let registry = Arc::new(config.build_registry()?);
        let live = LiveRateSource::new(
            registry.clone(),
            config.provider_url.clone(),
            config.request_timeout,
        )?;

        let service = Self::with_source(config, registry, Arc::new(live))?;
        info!(
            currencies = service.registry.len(),
            default_currency = %service.registry.default_code(),
            provider_url = %config.provider_url,
            "Conversion service ready"
        );
        Ok(service)
    }

    /// Like [`ConversionService::from_config`] with a caller-supplied live source.
    pub fn with_source(
        config: &FxConfig,
        registry: Arc<CurrencyRegistry>,
        live: Arc<dyn RateSource>,
    ) -> FxResult<Self> {
        let fallback = Arc::new(FallbackRateSource::new(registry.clone())?);
        let table = Arc::new(RateTable::with_ttl(config.cache_ttl()?));
        let resolver = RateResolver::new(registry.clone(), table, live, fallback);
        Ok(Self::new(registry, resolver))
    }

    /// Supported currencies.
    pub fn registry(&self) -> &CurrencyRegistry {
        &self.registry
    }

    /// Convert `amount` from one currency code to another.
    ///
    /// Unknown codes fail with `UnsupportedCurrency` before any rate lookup.
    #[instrument(skip(self), fields(amount = %amount))]
    pub async fn convert(
        &self,
        amount: Decimal,
        from: &str,
        to: &str,
    ) -> FxResult<ConversionResult> {
        let from = self.registry.code(from)?;
        let to = self.registry.code(to)?;
        self.convert_money(&Money::new(amount, from), &to).await
    }

    /// Convert a typed amount into `target`.
    pub async fn convert_money(
        &self,
        money: &Money,
        target: &CurrencyCode,
    ) -> FxResult<ConversionResult> {
        let snapshot = self.resolver.rates_for(&money.currency, now()).await?;
        self.apply(money, target, &snapshot)
    }

    /// Convert `amount` into every supported currency, `from` included.
    #[instrument(skip(self), fields(amount = %amount))]
    pub async fn convert_all(
        &self,
        amount: Decimal,
        from: &str,
    ) -> FxResult<BTreeMap<CurrencyCode, ConversionResult>> {
        let from = self.registry.code(from)?;
        let money = Money::new(amount, from);
        let snapshot = self.resolver.rates_for(&money.currency, now()).await?;

        self.registry
            .codes()
            .map(|target| Ok((target.clone(), self.apply(&money, target, &snapshot)?)))
            .collect()
    }

    /// Resolved rates for `base`, for display.
    pub async fn rates_for(&self, base: &str) -> FxResult<Arc<RateSnapshot>> {
        let base = self.registry.code(base)?;
        self.resolver.rates_for(&base, now()).await
    }

    /// `"{symbol} {amount}"` with thousands separators and two decimals.
    pub fn format(&self, money: &Money) -> String {
        format_with_symbol(self.registry.symbol(&money.currency), money.amount)
    }

    /// Format a raw amount in the currency named by `code`.
    pub fn format_price(&self, amount: Decimal, code: &str) -> FxResult<String> {
        let code = self.registry.code(code)?;
        Ok(self.format(&Money::new(amount, code)))
    }

    /// The currency to quote a request in: the caller's preference when set,
    /// the registry default otherwise.
    pub fn preferred_currency(&self, preferred: Option<&str>) -> FxResult<CurrencyCode> {
        Ok(self.registry.preferred_or_default(preferred)?)
    }

    /// Resolution counters and rate table occupancy.
    pub fn resolver_stats(&self) -> ResolverStats {
        self.resolver.stats(now())
    }

    fn apply(
        &self,
        money: &Money,
        target: &CurrencyCode,
        snapshot: &RateSnapshot,
    ) -> FxResult<ConversionResult> {
        let converted = money.convert(target, snapshot)?;
        let rate = if target == &money.currency {
            Decimal::ONE
        } else {
            snapshot.rate(target).unwrap_or(Decimal::ONE)
        };

        Ok(ConversionResult {
            formatted: self.format(&converted),
            symbol: self.registry.symbol(target).to_string(),
            money: converted,
            provenance: snapshot.provenance(),
            rate,
            rates_as_of: snapshot.fetched_at(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FxError;
    use crate::provider::MockRateSource;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn registry() -> Arc<CurrencyRegistry> {
        Arc::new(CurrencyRegistry::reference())
    }

    /// Service whose live source is down, so every base resolves to fallback rates.
    fn offline_service() -> (ConversionService, Arc<MockRateSource>) {
        let registry = registry();
        let source = Arc::new(MockRateSource::new(registry.clone()));
        source.set_failing(true);
        let service =
            ConversionService::with_source(&FxConfig::default(), registry, source.clone()).unwrap();
        (service, source)
    }

    /// Coherent live rates derived from one USD-based vector, as a provider serves them.
    fn coherent_source(registry: Arc<CurrencyRegistry>) -> Arc<MockRateSource> {
        let per_usd = [("USD", dec!(1)), ("EUR", dec!(0.9132)), ("XOF", dec!(599.01))];
        let source = Arc::new(MockRateSource::new(registry.clone()));

        for (base, base_per_usd) in per_usd {
            let rates = per_usd
                .iter()
                .map(|(quote, quote_per_usd)| {
                    (registry.code(quote).unwrap(), *quote_per_usd / base_per_usd)
                })
                .collect();
            source.set_rates(registry.code(base).unwrap(), rates);
        }
        source
    }

    #[tokio::test]
    async fn test_eur_to_xof_with_fallback() {
        let (service, _) = offline_service();

        let result = service.convert(dec!(50), "EUR", "XOF").await.unwrap();

        assert_eq!(result.amount().to_string(), "32798.00");
        assert_eq!(result.formatted, "FCFA 32,798.00");
        assert_eq!(result.symbol, "FCFA");
        assert_eq!(result.code().as_str(), "XOF");
        assert_eq!(result.provenance, Provenance::Fallback);
        assert!(result.is_approximate());
        assert_eq!(result.rate, dec!(655.96));
    }

    #[tokio::test]
    async fn test_zero_amount() {
        let (service, _) = offline_service();

        let result = service.convert(dec!(0), "EUR", "XOF").await.unwrap();

        assert_eq!(result.amount().to_string(), "0.00");
        assert_eq!(result.formatted, "FCFA 0.00");
    }

    #[tokio::test]
    async fn test_round_half_up_not_bankers() {
        let (service, _) = offline_service();

        let result = service.convert(dec!(19.99), "EUR", "USD").await.unwrap();

        assert_eq!(result.amount().to_string(), "21.79");
        assert_eq!(result.formatted, "$ 21.79");
    }

    #[tokio::test]
    async fn test_unsupported_currency_fails_fast() {
        let (service, source) = offline_service();

        let to_unknown = service.convert(dec!(10), "EUR", "ZZZ").await;
        let from_unknown = service.convert(dec!(10), "ZZZ", "EUR").await;

        assert_eq!(to_unknown.unwrap_err(), FxError::UnsupportedCurrency("ZZZ".to_string()));
        assert_eq!(from_unknown.unwrap_err(), FxError::UnsupportedCurrency("ZZZ".to_string()));
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_identity_conversion_is_exact() {
        let (service, _) = offline_service();

        for code in ["XOF", "USD", "EUR"] {
            let result = service.convert(dec!(19.999), code, code).await.unwrap();
            assert_eq!(result.amount(), dec!(19.999));
            assert_eq!(result.amount().to_string(), "19.999");
            assert_eq!(result.rate, Decimal::ONE);
        }
    }

    #[tokio::test]
    async fn test_negative_amount_keeps_sign() {
        let (service, _) = offline_service();

        let result = service.convert(dec!(-1132.57), "EUR", "USD").await.unwrap();

        assert_eq!(result.amount(), dec!(-1234.50));
        assert_eq!(result.formatted, "$ -1,234.50");
    }

    #[tokio::test]
    async fn test_overflowing_amount_is_an_error() {
        let (service, _) = offline_service();
        let huge: Decimal = "1000000000000000000000000000".parse().unwrap();

        let result = service.convert(huge, "EUR", "XOF").await;
        assert!(matches!(result, Err(FxError::AmountOutOfRange(_))));

        let all = service.convert_all(huge, "EUR").await;
        assert!(matches!(all, Err(FxError::AmountOutOfRange(_))));

        // Small rates still fit.
        let xof = service.convert(huge, "XOF", "EUR").await.unwrap();
        assert_eq!(xof.amount(), dec!(1500000000000000000000000));
    }

    #[tokio::test]
    async fn test_convert_all_includes_source_currency() {
        let (service, source) = offline_service();

        let all = service.convert_all(dec!(100), "EUR").await.unwrap();

        assert_eq!(all.len(), 3);
        let by_code = |raw: &str| &all[&service.registry().code(raw).unwrap()];
        assert_eq!(by_code("EUR").formatted, "€ 100.00");
        assert_eq!(by_code("USD").formatted, "$ 109.00");
        assert_eq!(by_code("XOF").formatted, "FCFA 65,596.00");
        assert!(all.values().all(|r| r.provenance == Provenance::Fallback));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_live_rates_are_tagged_live() {
        let registry = registry();
        let source = coherent_source(registry.clone());
        let service =
            ConversionService::with_source(&FxConfig::default(), registry, source.clone()).unwrap();

        let first = service.convert(dec!(10), "USD", "EUR").await.unwrap();
        let second = service.convert(dec!(20), "USD", "XOF").await.unwrap();

        assert_eq!(first.provenance, Provenance::Live);
        assert_eq!(first.amount(), dec!(9.13));
        assert_eq!(second.amount(), dec!(11980.20));
        assert_eq!(source.calls(), 1);
        assert_eq!(service.resolver_stats().cache_hits, 1);
    }

    #[tokio::test]
    async fn test_format_and_preferences() {
        let (service, _) = offline_service();
        let xof = service.registry().code("XOF").unwrap();

        assert_eq!(
            service.format(&Money::new(dec!(1234567.891), xof)),
            "FCFA 1,234,567.89"
        );
        assert_eq!(service.format_price(dec!(5), "EUR").unwrap(), "€ 5.00");
        assert!(service.format_price(dec!(5), "GBP").is_err());

        assert_eq!(service.preferred_currency(None).unwrap().as_str(), "XOF");
        assert_eq!(service.preferred_currency(Some("eur")).unwrap().as_str(), "EUR");
        assert_eq!(
            service.preferred_currency(Some("JPY")).unwrap_err(),
            FxError::UnsupportedCurrency("JPY".to_string())
        );
    }

    #[tokio::test]
    async fn test_rates_for_display() {
        let (service, _) = offline_service();

        let snapshot = service.rates_for("XOF").await.unwrap();

        assert_eq!(snapshot.base().as_str(), "XOF");
        assert_eq!(snapshot.rates().len(), 3);
        assert!(service.rates_for("ABC").await.is_err());
    }

    fn round_trip(amount: Decimal, from: &str, to: &str) -> (Decimal, Decimal) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let registry = registry();
            let source = coherent_source(registry.clone());
            let service =
                ConversionService::with_source(&FxConfig::default(), registry, source).unwrap();

            let there = service.convert(amount, from, to).await.unwrap();
            let back = service.convert(there.amount(), to, from).await.unwrap();
            (back.amount(), back.rate)
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_round_trip_within_one_cent(
            cents in 1i64..100_000_000,
            from in prop::sample::select(vec!["XOF", "USD", "EUR"]),
            to in prop::sample::select(vec!["XOF", "USD", "EUR"]),
        ) {
            let amount = Decimal::new(cents, 2);
            let (back, return_rate) = round_trip(amount, from, to);
            let drift = (back - amount).abs();

            if return_rate < dec!(3) {
                prop_assert!(drift <= dec!(0.01), "{} {}->{}: drift {}", amount, from, to, drift);
            } else {
                // Half a minor unit lost in the intermediate currency, scaled back.
                let bound = dec!(0.005) * return_rate + dec!(0.01);
                prop_assert!(drift <= bound, "{} {}->{}: drift {}", amount, from, to, drift);
            }
        }
    }
}
