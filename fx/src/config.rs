//! Pricing engine configuration.

use std::time::Duration;
use storefront_common::{constants, CurrencyRegistry, DurationExt};

use crate::error::{FxError, FxResult};
use crate::provider::DEFAULT_PROVIDER_URL;

/// Configuration consumed by the conversion service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FxConfig {
    /// Registry default currency.
    pub default_currency: String,
    /// Closed set of supported currency codes, in display order.
    pub supported_currencies: Vec<String>,
    /// How long fetched rates stay fresh.
    pub cache_timeout: Duration,
    /// Live provider endpoint; the base code is appended as a path segment.
    pub provider_url: String,
    /// Hard timeout of one provider request.
    pub request_timeout: Duration,
}

impl Default for FxConfig {
    fn default() -> Self {
        Self {
            default_currency: "XOF".to_string(),
            supported_currencies: vec!["XOF".to_string(), "USD".to_string(), "EUR".to_string()],
            cache_timeout: constants::rate_cache_ttl().as_std(),
            provider_url: DEFAULT_PROVIDER_URL.to_string(),
            request_timeout: constants::provider_request_timeout().as_std(),
        }
    }
}

impl FxConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparsable values keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(code) = lookup("STOREFRONT_DEFAULT_CURRENCY") {
            config.default_currency = code.trim().to_string();
        }

        if let Some(list) = lookup("STOREFRONT_SUPPORTED_CURRENCIES") {
            config.supported_currencies = list
                .split(',')
                .map(str::trim)
                .filter(|code| !code.is_empty())
                .map(str::to_string)
                .collect();
        }

        if let Some(secs) = lookup("STOREFRONT_CACHE_TIMEOUT_SECS") {
            if let Ok(secs) = secs.trim().parse() {
                config.cache_timeout = Duration::from_secs(secs);
            }
        }

        if let Some(url) = lookup("STOREFRONT_RATE_PROVIDER_URL") {
            config.provider_url = url.trim().to_string();
        }

        if let Some(secs) = lookup("STOREFRONT_RATE_TIMEOUT_SECS") {
            if let Ok(secs) = secs.trim().parse() {
                config.request_timeout = Duration::from_secs(secs);
            }
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> FxResult<()> {
        if self.supported_currencies.is_empty() {
            return Err(defect("supported currency list cannot be empty"));
        }

        if self.cache_timeout.is_zero() {
            return Err(defect("cache timeout cannot be 0"));
        }

        if self.request_timeout.is_zero() {
            return Err(defect("request timeout cannot be 0"));
        }

        if self.provider_url.trim().is_empty() {
            return Err(defect("provider URL cannot be empty"));
        }

        self.build_registry().map(|_| ())
    }

    /// Build the supported-currency registry.
    pub fn build_registry(&self) -> FxResult<CurrencyRegistry> {
        CurrencyRegistry::from_catalog(&self.supported_currencies, &self.default_currency)
            .map_err(|e| defect(e.to_string()))
    }

    /// Cache TTL as a signed duration.
    pub fn cache_ttl(&self) -> FxResult<chrono::Duration> {
        chrono::Duration::from_std(self.cache_timeout)
            .map_err(|_| defect("cache timeout out of range"))
    }
}

fn defect(message: impl Into<String>) -> FxError {
    FxError::ConfigurationDefect(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = FxConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.cache_timeout, Duration::from_secs(3600));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.build_registry().unwrap(), CurrencyRegistry::reference());
    }

    #[test]
    fn test_from_env_overrides() {
        let config = FxConfig::from_lookup(lookup(&[
            ("STOREFRONT_DEFAULT_CURRENCY", "EUR"),
            ("STOREFRONT_SUPPORTED_CURRENCIES", "EUR, XOF,"),
            ("STOREFRONT_CACHE_TIMEOUT_SECS", "600"),
            ("STOREFRONT_RATE_PROVIDER_URL", "http://localhost:9000/latest"),
            ("STOREFRONT_RATE_TIMEOUT_SECS", "not-a-number"),
        ]));

        assert_eq!(config.default_currency, "EUR");
        assert_eq!(config.supported_currencies, vec!["EUR", "XOF"]);
        assert_eq!(config.cache_timeout, Duration::from_secs(600));
        assert_eq!(config.provider_url, "http://localhost:9000/latest");
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let mut config = FxConfig::default();
        config.cache_timeout = Duration::ZERO;
        assert!(matches!(config.validate(), Err(FxError::ConfigurationDefect(_))));

        let mut config = FxConfig::default();
        config.default_currency = "GBP".to_string();
        assert!(matches!(config.validate(), Err(FxError::ConfigurationDefect(_))));

        let mut config = FxConfig::default();
        config.supported_currencies.push("JPY".to_string());
        assert!(config.validate().is_err());

        let mut config = FxConfig::default();
        config.supported_currencies.clear();
        assert!(config.validate().is_err());

        let mut config = FxConfig::default();
        config.provider_url = " ".to_string();
        assert!(config.validate().is_err());
    }
}
