//! Rate resolution: cache, then live provider, then last known or fallback rates.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use storefront_common::{CurrencyCode, CurrencyRegistry, RateSnapshot, Timestamp};
use tracing::{debug, info, instrument, warn};

use crate::cache::{RateTable, TableStats};
use crate::error::{FxError, FxResult};
use crate::fallback::FallbackRateSource;
use crate::provider::RateSource;

/// Resolution counters.
#[derive(Debug, Default)]
struct Counters {
    cache_hits: AtomicU64,
    live_refreshes: AtomicU64,
    provider_failures: AtomicU64,
    stale_served: AtomicU64,
    fallback_served: AtomicU64,
}

/// Resolves the best available rate snapshot for a base currency.
///
/// Resolution never fails for a supported base: a fresh table entry wins,
/// then a live fetch, then the last known snapshot however old, then the
/// static fallback table. Cloning is cheap; clones share the same table.
#[derive(Clone)]
pub struct RateResolver {
    registry: Arc<CurrencyRegistry>,
    table: Arc<RateTable>,
    live: Arc<dyn RateSource>,
    fallback: Arc<FallbackRateSource>,
    counters: Arc<Counters>,
}

impl RateResolver {
    /// Create a resolver over an existing table.
    pub fn new(
        registry: Arc<CurrencyRegistry>,
        table: Arc<RateTable>,
        live: Arc<dyn RateSource>,
        fallback: Arc<FallbackRateSource>,
    ) -> Self {
        Self {
            registry,
            table,
            live,
            fallback,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Best available snapshot for `base` at `now`.
    ///
    /// The only error is `UnsupportedCurrency`, returned before any I/O.
    /// Must run inside a Tokio runtime: the live fetch is spawned so that it
    /// still populates the table if the caller goes away.
    #[instrument(skip(self, now), fields(base = %base))]
    pub async fn rates_for(
        &self,
        base: &CurrencyCode,
        now: Timestamp,
    ) -> FxResult<Arc<RateSnapshot>> {
        if !self.registry.contains(base) {
            return Err(FxError::UnsupportedCurrency(base.to_string()));
        }

        if let Some(fresh) = self.table.get_fresh(base, now) {
            debug!("Cache hit");
            self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(fresh);
        }

        let error = match self.refresh(base).await {
            Ok(snapshot) => return Ok(snapshot),
            Err(error) => error,
        };

        self.counters.provider_failures.fetch_add(1, Ordering::Relaxed);
        warn!(provider = self.live.name(), error = %error, "Live rates unavailable");

        if let Some(stale) = self.table.get(base) {
            warn!(
                fetched_at = %stale.fetched_at(),
                provenance = %stale.provenance(),
                "Serving last known rates"
            );
            self.counters.stale_served.fetch_add(1, Ordering::Relaxed);
            return Ok(stale);
        }

        let fallback = Arc::new(self.fallback.rates_for(base)?);
        warn!("Serving fallback rates");
        self.counters.fallback_served.fetch_add(1, Ordering::Relaxed);

        // A concurrent refresh may have landed in the meantime; keep it.
        Ok(self.table.get_or_insert(fallback))
    }

    /// Fetch live rates for `base` and store them.
    async fn refresh(&self, base: &CurrencyCode) -> FxResult<Arc<RateSnapshot>> {
        let live = Arc::clone(&self.live);
        let table = Arc::clone(&self.table);
        let counters = Arc::clone(&self.counters);
        let base = base.clone();

        let task = tokio::spawn(async move {
            let snapshot = live.fetch(&base).await?;
            if snapshot.base() != &base {
                return Err(FxError::provider(
                    live.name(),
                    format!("asked for {} rates, got {}", base, snapshot.base()),
                ));
            }

            let snapshot = Arc::new(snapshot);
            table.put(Arc::clone(&snapshot));
            counters.live_refreshes.fetch_add(1, Ordering::Relaxed);
            info!(base = %base, provider = live.name(), "Refreshed live rates");
            Ok(snapshot)
        });

        match task.await {
            Ok(result) => result,
            Err(join_error) => Err(FxError::provider(self.live.name(), join_error)),
        }
    }

    /// The underlying rate table.
    pub fn table(&self) -> &RateTable {
        &self.table
    }

    /// Counters and table occupancy at `now`.
    pub fn stats(&self, now: Timestamp) -> ResolverStats {
        ResolverStats {
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            live_refreshes: self.counters.live_refreshes.load(Ordering::Relaxed),
            provider_failures: self.counters.provider_failures.load(Ordering::Relaxed),
            stale_served: self.counters.stale_served.load(Ordering::Relaxed),
            fallback_served: self.counters.fallback_served.load(Ordering::Relaxed),
            table: self.table.stats(now),
        }
    }
}

/// Resolver statistics.
#[derive(Debug, Clone, Serialize)]
pub struct ResolverStats {
    pub cache_hits: u64,
    pub live_refreshes: u64,
    pub provider_failures: u64,
    pub stale_served: u64,
    pub fallback_served: u64,
    pub table: TableStats,
}
