//! Rate source trait and the live HTTP provider.

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use storefront_common::{
    from_unix_seconds, now, CurrencyCode, CurrencyRegistry, Provenance, RateSnapshot, Timestamp,
};
use tracing::{debug, warn};

use crate::error::{FxError, FxResult};

/// Something that can produce a fresh rate snapshot for a base currency.
///
/// Sources never write to the rate table; caching is the resolver's job.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Get the source name.
    fn name(&self) -> &str;

    /// Fetch a snapshot for `base`. Any failure is `ProviderUnavailable`.
    async fn fetch(&self, base: &CurrencyCode) -> FxResult<RateSnapshot>;
}

/// Provider ID used in logs and errors.
const PROVIDER_ID: &str = "EXCHANGE_RATE_API";

/// Default provider endpoint; the base currency is appended as a path segment.
pub const DEFAULT_PROVIDER_URL: &str = "https://api.exchangerate-api.com/v4/latest";

/// Response body of the rate provider.
#[derive(Debug, Deserialize)]
struct ProviderResponse {
    /// Base currency echoed back by the provider.
    #[serde(default)]
    base: Option<String>,
    /// Unix timestamp of the provider's last update.
    time_last_updated: i64,
    /// Rates keyed by currency code (1 base = rate quote).
    rates: HashMap<String, serde_json::Number>,
}

/// Fetches rates over HTTP from an exchangerate-api style endpoint.
pub struct LiveRateSource {
    client: Client,
    base_url: String,
    registry: Arc<CurrencyRegistry>,
}

impl LiveRateSource {
    /// Create a live source with a hard per-request timeout.
    pub fn new(
        registry: Arc<CurrencyRegistry>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> FxResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FxError::ConfigurationDefect(format!("HTTP client: {}", e)))?;

        Ok(Self::with_client(registry, base_url, client))
    }

    /// Create a live source around an existing client.
    pub fn with_client(
        registry: Arc<CurrencyRegistry>,
        base_url: impl Into<String>,
        client: Client,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            registry,
        }
    }

    fn url_for(&self, base: &CurrencyCode) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), base)
    }

    /// Turn a decoded provider body into a live snapshot restricted to the registry.
    fn parse(
        &self,
        base: &CurrencyCode,
        body: ProviderResponse,
        fetched_at: Timestamp,
    ) -> FxResult<RateSnapshot> {
        if let Some(echoed) = body.base.as_deref() {
            if !echoed.eq_ignore_ascii_case(base.as_str()) {
                return Err(FxError::provider(
                    PROVIDER_ID,
                    format!("requested base {} but got {}", base, echoed),
                ));
            }
        }

        let updated_at = from_unix_seconds(body.time_last_updated).ok_or_else(|| {
            FxError::provider(
                PROVIDER_ID,
                format!("invalid time_last_updated {}", body.time_last_updated),
            )
        })?;

        let mut rates = Vec::with_capacity(self.registry.len());
        for (raw_code, raw_rate) in &body.rates {
            // Keys must match a registry code exactly; anything else is dropped.
            let Ok(code) = self.registry.code(raw_code) else {
                continue;
            };
            if code.as_str() != raw_code.as_str() {
                continue;
            }
            let rate = decimal_from_number(raw_rate).ok_or_else(|| {
                FxError::provider(
                    PROVIDER_ID,
                    format!("unparsable rate {} for {}", raw_rate, code),
                )
            })?;
            rates.push((code, rate));
        }

        let snapshot =
            RateSnapshot::build(&self.registry, base, rates, fetched_at, Provenance::Live)
                .map_err(|e| FxError::provider(PROVIDER_ID, e))?;

        Ok(snapshot.with_provider_updated_at(updated_at))
    }
}

#[async_trait]
impl RateSource for LiveRateSource {
    fn name(&self) -> &str {
        PROVIDER_ID
    }

    async fn fetch(&self, base: &CurrencyCode) -> FxResult<RateSnapshot> {
        let url = self.url_for(base);
        debug!(provider = PROVIDER_ID, base = %base, url = %url, "Fetching rates");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    warn!(provider = PROVIDER_ID, base = %base, "Rate request timed out");
                }
                FxError::provider(PROVIDER_ID, e)
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FxError::provider(PROVIDER_ID, format!("HTTP status {}", status)));
        }

        let body: ProviderResponse = response
            .json()
            .await
            .map_err(|e| FxError::provider(PROVIDER_ID, format!("invalid body: {}", e)))?;

        self.parse(base, body, now())
    }
}

/// Exact decimal from a JSON number, keeping its textual digits.
fn decimal_from_number(number: &serde_json::Number) -> Option<Decimal> {
    let text = number.to_string();
    if text.contains(|c| c == 'e' || c == 'E') {
        Decimal::from_scientific(&text).ok()
    } else {
        Decimal::from_str(&text).ok()
    }
}

/// Mock rate source for testing.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockRateSource {
    registry: Arc<CurrencyRegistry>,
    rates: dashmap::DashMap<CurrencyCode, Vec<(CurrencyCode, Decimal)>>,
    failing: std::sync::atomic::AtomicBool,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockRateSource {
    /// Create a new mock source with no rates.
    pub fn new(registry: Arc<CurrencyRegistry>) -> Self {
        Self {
            registry,
            rates: dashmap::DashMap::new(),
            failing: std::sync::atomic::AtomicBool::new(false),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Set the rates served for `base`.
    pub fn set_rates(&self, base: CurrencyCode, rates: Vec<(CurrencyCode, Decimal)>) {
        self.rates.insert(base, rates);
    }

    /// Make every fetch fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }

    /// Number of fetches attempted so far.
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl RateSource for MockRateSource {
    fn name(&self) -> &str {
        "MOCK"
    }

    async fn fetch(&self, base: &CurrencyCode) -> FxResult<RateSnapshot> {
        use std::sync::atomic::Ordering;

        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(FxError::provider("MOCK", "simulated outage"));
        }

        let rates = self
            .rates
            .get(base)
            .map(|r| r.clone())
            .ok_or_else(|| FxError::provider("MOCK", format!("no rates for {}", base)))?;

        RateSnapshot::build(&self.registry, base, rates, now(), Provenance::Live)
            .map_err(|e| FxError::provider("MOCK", e))
    }
}
