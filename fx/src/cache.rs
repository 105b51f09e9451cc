//! Rate table: latest snapshot per base currency, checked for staleness lazily.

use chrono::Duration;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use storefront_common::{constants, CurrencyCode, RateSnapshot, Timestamp};
use tracing::debug;

/// Thread-safe table of rate snapshots keyed by base currency.
///
/// Entries are replaced whole and never expire on their own: a stale snapshot
/// stays readable until a newer one supersedes it.
pub struct RateTable {
    entries: DashMap<CurrencyCode, Arc<RateSnapshot>>,
    ttl: Duration,
}

impl RateTable {
    /// Create an empty table with the default one-hour TTL.
    pub fn new() -> Self {
        Self::with_ttl(constants::rate_cache_ttl())
    }

    /// Create an empty table with a custom TTL.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Staleness window applied to every entry.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Latest snapshot for `base`, fresh or stale.
    pub fn get(&self, base: &CurrencyCode) -> Option<Arc<RateSnapshot>> {
        self.entries.get(base).map(|entry| Arc::clone(entry.value()))
    }

    /// Replace the snapshot for its base currency, returning the one it supersedes.
    pub fn put(&self, snapshot: Arc<RateSnapshot>) -> Option<Arc<RateSnapshot>> {
        debug!(
            base = %snapshot.base(),
            provenance = %snapshot.provenance(),
            "Storing rate snapshot"
        );
        self.entries.insert(snapshot.base().clone(), snapshot)
    }

    /// Store `snapshot` only if its base has no entry yet; returns whichever
    /// snapshot ends up in the table.
    pub fn get_or_insert(&self, snapshot: Arc<RateSnapshot>) -> Arc<RateSnapshot> {
        let entry = self
            .entries
            .entry(snapshot.base().clone())
            .or_insert(snapshot);
        Arc::clone(entry.value())
    }

    /// Whether `base` needs a refresh at `now`. Missing entries are stale.
    pub fn is_stale(&self, base: &CurrencyCode, now: Timestamp) -> bool {
        self.entries
            .get(base)
            .map_or(true, |entry| entry.is_stale(now, self.ttl))
    }

    /// Snapshot for `base` only if it is still fresh at `now`.
    pub fn get_fresh(&self, base: &CurrencyCode, now: Timestamp) -> Option<Arc<RateSnapshot>> {
        let entry = self.entries.get(base)?;
        if entry.is_stale(now, self.ttl) {
            debug!(base = %base, "Rate table entry stale");
            None
        } else {
            Some(Arc::clone(entry.value()))
        }
    }

    /// Number of base currencies with a snapshot.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table holds no snapshots.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every snapshot.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Entry counts at `now`.
    pub fn stats(&self, now: Timestamp) -> TableStats {
        let total = self.entries.len();
        let fresh = self
            .entries
            .iter()
            .filter(|entry| !entry.is_stale(now, self.ttl))
            .count();

        TableStats {
            total_entries: total,
            fresh_entries: fresh,
            stale_entries: total.saturating_sub(fresh),
        }
    }
}

impl Default for RateTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Rate table statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TableStats {
    pub total_entries: usize,
    pub fresh_entries: usize,
    pub stale_entries: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use storefront_common::{now, CurrencyRegistry, Provenance};

    fn snapshot(base: &str, fetched_at: Timestamp, provenance: Provenance) -> Arc<RateSnapshot> {
        let registry = CurrencyRegistry::reference();
        let base = registry.code(base).unwrap();
        let rates = registry
            .codes()
            .map(|code| (code.clone(), dec!(2)))
            .collect::<Vec<_>>();
        Arc::new(RateSnapshot::build(&registry, &base, rates, fetched_at, provenance).unwrap())
    }

    fn code(raw: &str) -> CurrencyCode {
        CurrencyRegistry::reference().code(raw).unwrap()
    }

    #[test]
    fn test_table_put_and_get() {
        let table = RateTable::new();
        let snap = snapshot("EUR", now(), Provenance::Live);

        assert!(table.put(snap.clone()).is_none());

        let cached = table.get(&code("EUR")).unwrap();
        assert!(Arc::ptr_eq(&cached, &snap));
        assert_eq!(cached.rate(&code("EUR")), Some(dec!(1)));
    }

    #[test]
    fn test_table_miss() {
        let table = RateTable::new();

        assert!(table.get(&code("USD")).is_none());
        assert!(table.is_stale(&code("USD"), now()));
    }

    #[test]
    fn test_table_put_replaces_whole_snapshot() {
        let table = RateTable::new();
        let first = snapshot("EUR", now(), Provenance::Fallback);
        let second = snapshot("EUR", now(), Provenance::Live);

        table.put(first.clone());
        let previous = table.put(second.clone()).unwrap();

        assert!(Arc::ptr_eq(&previous, &first));
        assert_eq!(table.get(&code("EUR")).unwrap().provenance(), Provenance::Live);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_table_get_or_insert_keeps_existing() {
        let table = RateTable::new();
        let live = snapshot("USD", now(), Provenance::Live);
        let fallback = snapshot("USD", now(), Provenance::Fallback);

        table.put(live.clone());
        let kept = table.get_or_insert(fallback);

        assert!(Arc::ptr_eq(&kept, &live));

        let inserted = table.get_or_insert(snapshot("XOF", now(), Provenance::Fallback));
        assert_eq!(inserted.provenance(), Provenance::Fallback);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_table_staleness_keeps_entry() {
        let table = RateTable::with_ttl(Duration::minutes(30));
        let fetched = now();
        table.put(snapshot("XOF", fetched, Provenance::Live));

        let later = fetched + Duration::minutes(31);
        assert!(!table.is_stale(&code("XOF"), fetched));
        assert!(table.is_stale(&code("XOF"), later));
        assert!(table.get_fresh(&code("XOF"), later).is_none());

        // Stale entries stay readable.
        assert!(table.get(&code("XOF")).is_some());
        assert_eq!(
            table.stats(later),
            TableStats {
                total_entries: 1,
                fresh_entries: 0,
                stale_entries: 1,
            }
        );
    }

    #[test]
    fn test_table_clear() {
        let table = RateTable::new();
        table.put(snapshot("EUR", now(), Provenance::Live));
        table.put(snapshot("USD", now(), Provenance::Live));

        assert_eq!(table.len(), 2);

        table.clear();

        assert!(table.is_empty());
    }

    #[test]
    fn test_table_concurrent_puts_for_different_bases() {
        let table = Arc::new(RateTable::new());
        let handles: Vec<_> = ["EUR", "USD", "XOF"]
            .into_iter()
            .map(|base| {
                let table = Arc::clone(&table);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        table.put(snapshot(base, now(), Provenance::Live));
                        assert_eq!(table.get(&code(base)).unwrap().base(), &code(base));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(table.len(), 3);
    }
}
