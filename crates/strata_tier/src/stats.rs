// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Per-handle statistics counters.
//!
//! Every handle maintains one [`HandleStats`] instance. Counters exist both
//! globally for the handle and per region; a region's counter set is created
//! lazily on first reference. Recording and reads are lock-free atomics; the
//! only lock is a short one around lazy region creation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

/// One set of counters, used for the handle total and for each region.
#[derive(Debug, Default)]
struct CounterSet {
    hits: AtomicU64,
    misses: AtomicU64,
    items: AtomicU64,
    get_calls: AtomicU64,
    put_calls: AtomicU64,
    add_calls: AtomicU64,
    remove_calls: AtomicU64,
    clear_calls: AtomicU64,
    clear_region_calls: AtomicU64,
}

impl CounterSet {
    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            items: self.items.load(Ordering::Relaxed),
            get_calls: self.get_calls.load(Ordering::Relaxed),
            put_calls: self.put_calls.load(Ordering::Relaxed),
            add_calls: self.add_calls.load(Ordering::Relaxed),
            remove_calls: self.remove_calls.load(Ordering::Relaxed),
            clear_calls: self.clear_calls.load(Ordering::Relaxed),
            clear_region_calls: self.clear_region_calls.load(Ordering::Relaxed),
        }
    }

    fn dec_items(&self, n: u64) {
        let _ = self
            .items
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_sub(n))
            });
    }
}

/// A point-in-time copy of one counter set.
///
/// Values are read with relaxed ordering and may be approximate while
/// operations are in flight.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct StatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub items: u64,
    pub get_calls: u64,
    pub put_calls: u64,
    pub add_calls: u64,
    pub remove_calls: u64,
    pub clear_calls: u64,
    pub clear_region_calls: u64,
}

/// Statistics counters for one handle.
///
/// Recording methods take the region of the affected entry; region-less
/// entries count only toward the handle totals. When statistics are
/// disabled, every method is a no-op and snapshots read zero.
///
/// # Examples
///
/// ```
/// use strata_tier::HandleStats;
///
/// let stats = HandleStats::new(true);
/// stats.get_call(Some("users"));
/// stats.hit(Some("users"));
///
/// assert_eq!(stats.snapshot().hits, 1);
/// assert_eq!(stats.region_snapshot("users").unwrap().hits, 1);
/// assert!(stats.region_snapshot("orders").is_none());
/// ```
#[derive(Debug)]
pub struct HandleStats {
    enabled: bool,
    totals: CounterSet,
    regions: RwLock<HashMap<String, Arc<CounterSet>>>,
}

impl Default for HandleStats {
    fn default() -> Self {
        Self::new(true)
    }
}

impl HandleStats {
    /// Creates a new counter collection. When `enabled` is false, recording
    /// is a no-op.
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            totals: CounterSet::default(),
            regions: RwLock::new(HashMap::new()),
        }
    }

    /// Returns `true` when this handle records statistics.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// A snapshot of the handle totals.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        self.totals.snapshot()
    }

    /// A snapshot of one region's counters, if that region has been
    /// referenced.
    #[must_use]
    pub fn region_snapshot(&self, region: &str) -> Option<StatsSnapshot> {
        self.regions.read().get(region).map(|c| c.snapshot())
    }

    /// Records a read that found a live entry.
    pub fn hit(&self, region: Option<&str>) {
        self.bump(region, |c| c.hits.fetch_add(1, Ordering::Relaxed));
    }

    /// Records a read that found nothing (or only an expired entry).
    pub fn miss(&self, region: Option<&str>) {
        self.bump(region, |c| c.misses.fetch_add(1, Ordering::Relaxed));
    }

    /// Records a `get` invocation.
    pub fn get_call(&self, region: Option<&str>) {
        self.bump(region, |c| c.get_calls.fetch_add(1, Ordering::Relaxed));
    }

    /// Records a `put` invocation.
    pub fn put_call(&self, region: Option<&str>) {
        self.bump(region, |c| c.put_calls.fetch_add(1, Ordering::Relaxed));
    }

    /// Records an `add` invocation.
    pub fn add_call(&self, region: Option<&str>) {
        self.bump(region, |c| c.add_calls.fetch_add(1, Ordering::Relaxed));
    }

    /// Records a `remove` invocation.
    pub fn remove_call(&self, region: Option<&str>) {
        self.bump(region, |c| c.remove_calls.fetch_add(1, Ordering::Relaxed));
    }

    /// Records a `clear` invocation and resets all item counts.
    pub fn clear_call(&self) {
        if !self.enabled {
            return;
        }
        self.totals.clear_calls.fetch_add(1, Ordering::Relaxed);
        self.totals.items.store(0, Ordering::Relaxed);
        for counters in self.regions.read().values() {
            counters.items.store(0, Ordering::Relaxed);
        }
    }

    /// Records a `clear_region` invocation that removed `removed` entries.
    pub fn clear_region_call(&self, region: &str, removed: u64) {
        if !self.enabled {
            return;
        }
        self.totals.clear_region_calls.fetch_add(1, Ordering::Relaxed);
        self.totals.dec_items(removed);
        let counters = self.region(region);
        counters.clear_region_calls.fetch_add(1, Ordering::Relaxed);
        counters.items.store(0, Ordering::Relaxed);
    }

    /// Records a stored entry.
    pub fn item_added(&self, region: Option<&str>) {
        self.bump(region, |c| c.items.fetch_add(1, Ordering::Relaxed));
    }

    /// Records a removed or evicted entry.
    pub fn item_removed(&self, region: Option<&str>) {
        if !self.enabled {
            return;
        }
        self.totals.dec_items(1);
        if let Some(region) = region {
            self.region(region).dec_items(1);
        }
    }

    fn bump(&self, region: Option<&str>, f: impl Fn(&CounterSet) -> u64) {
        if !self.enabled {
            return;
        }
        f(&self.totals);
        if let Some(region) = region {
            f(&self.region(region));
        }
    }

    /// The region's counter set, created lazily on first reference.
    fn region(&self, region: &str) -> Arc<CounterSet> {
        if let Some(counters) = self.regions.read().get(region) {
            return Arc::clone(counters);
        }
        let mut regions = self.regions.write();
        Arc::clone(
            regions
                .entry(region.to_string())
                .or_insert_with(|| Arc::new(CounterSet::default())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_and_region_counters_track_independently() {
        let stats = HandleStats::new(true);

        stats.get_call(None);
        stats.miss(None);
        stats.get_call(Some("r1"));
        stats.hit(Some("r1"));

        let totals = stats.snapshot();
        assert_eq!(totals.get_calls, 2);
        assert_eq!(totals.hits, 1);
        assert_eq!(totals.misses, 1);

        let r1 = stats.region_snapshot("r1").unwrap();
        assert_eq!(r1.get_calls, 1);
        assert_eq!(r1.hits, 1);
        assert_eq!(r1.misses, 0);
    }

    #[test]
    fn region_counters_are_created_lazily() {
        let stats = HandleStats::new(true);
        assert!(stats.region_snapshot("r1").is_none());

        stats.hit(Some("r1"));
        assert!(stats.region_snapshot("r1").is_some());
    }

    #[test]
    fn items_never_go_below_zero() {
        let stats = HandleStats::new(true);
        stats.item_removed(None);
        assert_eq!(stats.snapshot().items, 0);
    }

    #[test]
    fn clear_resets_item_counts_everywhere() {
        let stats = HandleStats::new(true);
        stats.item_added(None);
        stats.item_added(Some("r1"));
        stats.clear_call();

        assert_eq!(stats.snapshot().items, 0);
        assert_eq!(stats.region_snapshot("r1").unwrap().items, 0);
        assert_eq!(stats.snapshot().clear_calls, 1);
    }

    #[test]
    fn clear_region_subtracts_from_totals() {
        let stats = HandleStats::new(true);
        stats.item_added(None);
        stats.item_added(Some("r1"));
        stats.item_added(Some("r1"));

        stats.clear_region_call("r1", 2);

        assert_eq!(stats.snapshot().items, 1);
        assert_eq!(stats.region_snapshot("r1").unwrap().items, 0);
    }

    #[test]
    fn disabled_stats_record_nothing() {
        let stats = HandleStats::new(false);
        stats.hit(Some("r1"));
        stats.item_added(None);
        stats.clear_call();

        assert_eq!(stats.snapshot(), StatsSnapshot::default());
        assert!(stats.region_snapshot("r1").is_none());
    }
}
