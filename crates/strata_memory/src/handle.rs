// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! In-process memory handle implementation.
//!
//! This module provides a cache handle backed by a `RwLock`-guarded map.
//! Expired entries are evicted lazily: reads check the deadline and purge
//! on the spot, so an idle entry may linger in memory (and in `count()`)
//! until the next operation touches it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;

use strata_tier::{
    CacheHandle, CacheItem, Error, ExpirationMode, HandleStats, Result, UpdateFn, UpdateOutcome,
};

use crate::builder::MemoryHandleBuilder;

/// An in-process cache handle backed by a `RwLock<HashMap>`.
///
/// This handle implements the full contract: insert-only `add`, upserting
/// `put`, absolute and sliding expiration with per-handle defaults, region
/// bulk deletes, version-based compare-and-swap updates, and per-handle
/// statistics.
///
/// The handle is cheap to clone; clones share the same storage. Sharing one
/// instance between two managers makes it a stand-in for a distributed tier
/// in tests and single-process deployments.
///
/// # Examples
///
/// ```
/// use strata_memory::MemoryHandle;
/// use strata_tier::{CacheHandle, CacheItem};
/// # futures::executor::block_on(async {
///
/// let handle = MemoryHandle::<i32>::new();
///
/// handle.put(CacheItem::new("key", 42)?).await?;
/// let item = handle.get("key", None).await?;
/// assert_eq!(*item.unwrap().value(), 42);
/// # Ok::<(), strata_tier::Error>(())
/// # });
/// ```
#[derive(Debug)]
pub struct MemoryHandle<V> {
    inner: Arc<MemoryInner<V>>,
}

impl<V> Clone for MemoryHandle<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[derive(Debug)]
struct MemoryInner<V> {
    name: String,
    default_expiration: Option<(ExpirationMode, Duration)>,
    stats: Arc<HandleStats>,
    entries: RwLock<HashMap<EntryId, Stored<V>>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct EntryId {
    key: String,
    region: Option<String>,
}

impl EntryId {
    fn new(key: &str, region: Option<&str>) -> Self {
        Self {
            key: key.to_string(),
            region: region.map(str::to_string),
        }
    }

    fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }
}

/// Effective expiration of a stored entry, resolved at insert time.
#[derive(Clone, Copy, Debug)]
enum Expiry {
    Never,
    At(SystemTime),
    Sliding(Duration),
}

#[derive(Debug)]
struct Stored<V> {
    item: CacheItem<V>,
    expiry: Expiry,
    /// Milliseconds since the epoch of the last successful read or write.
    last_access: AtomicU64,
}

fn epoch_millis(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

impl<V> Stored<V> {
    fn new(item: CacheItem<V>, expiry: Expiry, now: SystemTime) -> Self {
        Self {
            item,
            expiry,
            last_access: AtomicU64::new(epoch_millis(now)),
        }
    }

    fn is_expired(&self, now: SystemTime) -> bool {
        match self.expiry {
            Expiry::Never => false,
            Expiry::At(deadline) => now >= deadline,
            Expiry::Sliding(timeout) => {
                epoch_millis(now)
                    >= self
                        .last_access
                        .load(Ordering::Relaxed)
                        .saturating_add(timeout.as_millis() as u64)
            }
        }
    }

    fn touch(&self, now: SystemTime) {
        self.last_access.store(epoch_millis(now), Ordering::Relaxed);
    }
}

/// Resolves the effective expiration for an item entering this handle.
///
/// An item mode other than `Default` wins; `None` explicitly disables
/// expiration even when the handle has a default.
fn resolve_expiry(
    mode: ExpirationMode,
    timeout: Duration,
    default: Option<(ExpirationMode, Duration)>,
    now: SystemTime,
) -> Result<Expiry> {
    let (mode, timeout) = match mode {
        ExpirationMode::Default => match default {
            Some((mode, timeout)) => (mode, timeout),
            None => return Ok(Expiry::Never),
        },
        other => (other, timeout),
    };
    match mode {
        ExpirationMode::None | ExpirationMode::Default => Ok(Expiry::Never),
        ExpirationMode::Absolute | ExpirationMode::Sliding if timeout.is_zero() => {
            Err(Error::configuration(
                "configured expiration requires a timeout greater than zero",
            ))
        }
        ExpirationMode::Absolute => Ok(Expiry::At(now + timeout)),
        ExpirationMode::Sliding => Ok(Expiry::Sliding(timeout)),
    }
}

impl<V> Default for MemoryHandle<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> MemoryHandle<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a new handle named `memory` with statistics enabled and no
    /// default expiration.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a new builder for configuring a memory handle.
    ///
    /// # Examples
    ///
    /// ```
    /// use strata_memory::MemoryHandle;
    /// use strata_tier::ExpirationMode;
    /// use std::time::Duration;
    ///
    /// let handle = MemoryHandle::<String>::builder()
    ///     .name("l1")
    ///     .default_expiration(ExpirationMode::Sliding, Duration::from_secs(60))
    ///     .build();
    /// ```
    #[must_use]
    pub fn builder() -> MemoryHandleBuilder<V> {
        MemoryHandleBuilder::new()
    }

    pub(crate) fn from_builder(builder: &MemoryHandleBuilder<V>) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                name: builder.name.clone().unwrap_or_else(|| "memory".to_string()),
                default_expiration: builder.default_expiration,
                stats: Arc::new(HandleStats::new(builder.stats_enabled)),
                entries: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Removes an entry known to be expired, re-checking under the write
    /// lock so a concurrent overwrite is not lost.
    fn evict_expired(&self, id: &EntryId, now: SystemTime) {
        let mut entries = self.inner.entries.write();
        let still_expired = entries.get(id).is_some_and(|stored| stored.is_expired(now));
        if still_expired {
            entries.remove(id);
            self.inner.stats.item_removed(id.region());
        }
    }

    /// Reads the live item for an update attempt, without touching
    /// hit/miss statistics.
    fn read_for_update(&self, id: &EntryId, now: SystemTime) -> Option<CacheItem<V>> {
        let expired = {
            let entries = self.inner.entries.read();
            match entries.get(id) {
                None => return None,
                Some(stored) if stored.is_expired(now) => true,
                Some(stored) => return Some(stored.item.clone()),
            }
        };
        if expired {
            self.evict_expired(id, now);
        }
        None
    }
}

enum ReadState<V> {
    Hit(CacheItem<V>),
    Expired,
    Missing,
}

enum CommitState<V> {
    Missing,
    Expired,
    Conflict,
    Commit(CacheItem<V>, Expiry),
}

enum ExpireAction<V> {
    Skip,
    Evict,
    Replace(Stored<V>),
}

impl<V> CacheHandle<V> for MemoryHandle<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.inner.name
    }

    async fn add(&self, item: CacheItem<V>) -> Result<bool> {
        let id = EntryId::new(item.key(), item.region());
        self.inner.stats.add_call(id.region());

        let now = SystemTime::now();
        let expiry = resolve_expiry(
            item.expiration_mode(),
            item.timeout(),
            self.inner.default_expiration,
            now,
        )?;

        let mut entries = self.inner.entries.write();
        let occupied = entries.get(&id).is_some_and(|existing| !existing.is_expired(now));
        if occupied {
            return Ok(false);
        }
        if entries.remove(&id).is_some() {
            self.inner.stats.item_removed(id.region());
        }
        let stored = Stored::new(item.with_version(1).with_last_accessed(now), expiry, now);
        self.inner.stats.item_added(id.region());
        entries.insert(id, stored);
        Ok(true)
    }

    async fn put(&self, item: CacheItem<V>) -> Result<()> {
        let id = EntryId::new(item.key(), item.region());
        self.inner.stats.put_call(id.region());

        let now = SystemTime::now();
        let expiry = resolve_expiry(
            item.expiration_mode(),
            item.timeout(),
            self.inner.default_expiration,
            now,
        )?;

        let mut entries = self.inner.entries.write();
        let version = match entries.get(&id) {
            Some(existing) if !existing.is_expired(now) => existing.item.version() + 1,
            _ => 1,
        };
        let stored = Stored::new(
            item.with_version(version).with_last_accessed(now),
            expiry,
            now,
        );
        if entries.insert(id.clone(), stored).is_none() {
            self.inner.stats.item_added(id.region());
        }
        Ok(())
    }

    async fn get(&self, key: &str, region: Option<&str>) -> Result<Option<CacheItem<V>>> {
        let id = EntryId::new(key, region);
        self.inner.stats.get_call(region);

        let now = SystemTime::now();
        let state = {
            let entries = self.inner.entries.read();
            match entries.get(&id) {
                None => ReadState::Missing,
                Some(stored) if stored.is_expired(now) => ReadState::Expired,
                Some(stored) => {
                    stored.touch(now);
                    ReadState::Hit(stored.item.clone().with_last_accessed(now))
                }
            }
        };

        match state {
            ReadState::Hit(item) => {
                self.inner.stats.hit(region);
                Ok(Some(item))
            }
            ReadState::Expired => {
                self.evict_expired(&id, now);
                self.inner.stats.miss(region);
                Ok(None)
            }
            ReadState::Missing => {
                self.inner.stats.miss(region);
                Ok(None)
            }
        }
    }

    async fn remove(&self, key: &str, region: Option<&str>) -> Result<bool> {
        let id = EntryId::new(key, region);
        self.inner.stats.remove_call(region);

        let now = SystemTime::now();
        let mut entries = self.inner.entries.write();
        match entries.remove(&id) {
            None => Ok(false),
            Some(stored) => {
                self.inner.stats.item_removed(region);
                Ok(!stored.is_expired(now))
            }
        }
    }

    async fn clear(&self) -> Result<()> {
        self.inner.entries.write().clear();
        self.inner.stats.clear_call();
        Ok(())
    }

    async fn clear_region(&self, region: &str) -> Result<()> {
        let mut entries = self.inner.entries.write();
        let before = entries.len();
        entries.retain(|id, _| id.region() != Some(region));
        let removed = (before - entries.len()) as u64;
        self.inner.stats.clear_region_call(region, removed);
        Ok(())
    }

    async fn expire(
        &self,
        key: &str,
        region: Option<&str>,
        mode: ExpirationMode,
        timeout: Duration,
    ) -> Result<()> {
        let id = EntryId::new(key, region);
        let now = SystemTime::now();

        let mut entries = self.inner.entries.write();
        let action = match entries.get(&id) {
            None => ExpireAction::Skip,
            Some(stored) if stored.is_expired(now) => ExpireAction::Evict,
            Some(stored) => {
                let item = stored.item.clone().with_expiration(mode, timeout)?;
                let expiry = resolve_expiry(mode, timeout, self.inner.default_expiration, now)?;
                ExpireAction::Replace(Stored::new(item, expiry, now))
            }
        };
        match action {
            ExpireAction::Skip => {}
            ExpireAction::Evict => {
                entries.remove(&id);
                self.inner.stats.item_removed(region);
            }
            ExpireAction::Replace(stored) => {
                entries.insert(id, stored);
            }
        }
        Ok(())
    }

    async fn update(
        &self,
        key: &str,
        region: Option<&str>,
        update: &UpdateFn<V>,
        max_retries: usize,
    ) -> Result<UpdateOutcome<V>> {
        let id = EntryId::new(key, region);

        for _ in 0..=max_retries {
            let now = SystemTime::now();
            let Some(observed) = self.read_for_update(&id, now) else {
                return Ok(UpdateOutcome::Missing);
            };

            let Some(value) = update(observed.value()) else {
                return Ok(UpdateOutcome::Canceled);
            };

            let mut entries = self.inner.entries.write();
            let state = match entries.get(&id) {
                None => CommitState::Missing,
                Some(stored) if stored.is_expired(now) => CommitState::Expired,
                Some(stored) if stored.item.version() == observed.version() => {
                    CommitState::Commit(stored.item.clone(), stored.expiry)
                }
                Some(_) => CommitState::Conflict,
            };
            match state {
                CommitState::Missing => return Ok(UpdateOutcome::Missing),
                CommitState::Expired => {
                    entries.remove(&id);
                    self.inner.stats.item_removed(region);
                    return Ok(UpdateOutcome::Missing);
                }
                CommitState::Commit(current, expiry) => {
                    let next = current
                        .with_value(value)
                        .with_version(observed.version() + 1)
                        .with_last_accessed(now);
                    entries.insert(id, Stored::new(next.clone(), expiry, now));
                    return Ok(UpdateOutcome::Updated(next));
                }
                CommitState::Conflict => {}
            }
        }

        Ok(UpdateOutcome::ExhaustedRetries)
    }

    fn count(&self) -> u64 {
        self.inner.entries.read().len() as u64
    }

    fn stats(&self) -> Arc<HandleStats> {
        Arc::clone(&self.inner.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_resolution_prefers_the_item() {
        let now = SystemTime::now();
        let default = Some((ExpirationMode::Sliding, Duration::from_secs(10)));

        // An explicit mode wins over the handle default.
        let resolved =
            resolve_expiry(ExpirationMode::Absolute, Duration::from_secs(5), default, now).unwrap();
        assert!(matches!(resolved, Expiry::At(_)));

        // Explicit None disables expiration despite the default.
        let resolved = resolve_expiry(ExpirationMode::None, Duration::ZERO, default, now).unwrap();
        assert!(matches!(resolved, Expiry::Never));

        // Default defers to the handle.
        let resolved = resolve_expiry(ExpirationMode::Default, Duration::ZERO, default, now).unwrap();
        assert!(matches!(resolved, Expiry::Sliding(_)));

        // No default means no expiration.
        let resolved = resolve_expiry(ExpirationMode::Default, Duration::ZERO, None, now).unwrap();
        assert!(matches!(resolved, Expiry::Never));
    }

    #[test]
    fn zero_timeout_default_is_a_configuration_error() {
        let now = SystemTime::now();
        let default = Some((ExpirationMode::Absolute, Duration::ZERO));
        let err = resolve_expiry(ExpirationMode::Default, Duration::ZERO, default, now)
            .expect_err("zero timeout default should fail");
        assert!(err.is_configuration());
    }

    #[test]
    fn sliding_deadline_moves_with_access() {
        let now = SystemTime::now();
        let stored = Stored::new(
            CacheItem::new("k", 1).unwrap(),
            Expiry::Sliding(Duration::from_millis(50)),
            now,
        );

        assert!(!stored.is_expired(now));
        assert!(stored.is_expired(now + Duration::from_millis(60)));

        stored.touch(now + Duration::from_millis(40));
        assert!(!stored.is_expired(now + Duration::from_millis(60)));
    }
}
