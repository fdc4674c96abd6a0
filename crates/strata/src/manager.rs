// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The tiered cache manager.
//!
//! A [`CacheManager`] routes every operation across an ordered list of
//! handles, fastest tier first. Reads stop at the first hit and promote it
//! into earlier tiers; writes go through every tier in declared order;
//! optimistic updates run a compare-and-swap against the most authoritative
//! tier and propagate per the configured [`UpdateMode`]. When a backplane is
//! attached, mutations are published after all handles have been updated,
//! and invalidations from peer nodes are applied to every non-source tier.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use strata_tier::{
    Backplane, BackplaneEvent, CacheHandle, CacheItem, DynamicBackplane, DynamicHandle, Error,
    ExpirationMode, HandleStats, Result, UpdateFn, UpdateOutcome,
};

use crate::config::UpdateMode;
use crate::telemetry::{CacheActivity, CacheOperation, CacheTelemetry};

/// One handle in the tier stack, with its backplane role.
pub(crate) struct Slot<V> {
    pub(crate) handle: DynamicHandle<V>,
    pub(crate) backplane_source: bool,
}

pub(crate) struct ManagerInner<V> {
    pub(crate) name: String,
    pub(crate) update_mode: UpdateMode,
    pub(crate) slots: Vec<Slot<V>>,
    pub(crate) backplane: Option<DynamicBackplane>,
    pub(crate) telemetry: CacheTelemetry,
    /// Serializes update propagation across handles; see `update`.
    update_lock: tokio::sync::Mutex<()>,
    listener: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl<V> Drop for ManagerInner<V> {
    fn drop(&mut self) {
        if let Some(task) = self.listener.lock().take() {
            task.abort();
        }
    }
}

/// A multi-tier cache: an ordered stack of handles behind one uniform API.
///
/// Managers are cheap to clone; clones share the same tier stack and
/// backplane subscription. Dropping the last clone stops the backplane
/// listener and releases the handles.
///
/// # Examples
///
/// ```
/// use strata::CacheManager;
/// use strata_memory::MemoryHandle;
/// use strata_tier::CacheItem;
/// # futures::executor::block_on(async {
///
/// let manager = CacheManager::builder("sessions")
///     .handle(MemoryHandle::<i32>::builder().name("l1").build())
///     .handle(MemoryHandle::<i32>::builder().name("l2").build())
///     .build()?;
///
/// manager.put(CacheItem::new("key", 42)?).await?;
/// assert_eq!(manager.get("key").await?, Some(42));
/// # Ok::<(), strata::Error>(())
/// # });
/// ```
pub struct CacheManager<V> {
    pub(crate) inner: Arc<ManagerInner<V>>,
}

impl<V> Clone for CacheManager<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> std::fmt::Debug for CacheManager<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("name", &self.inner.name)
            .field("handles", &self.inner.slots.len())
            .field("update_mode", &self.inner.update_mode)
            .finish_non_exhaustive()
    }
}

fn check_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::invalid_argument("key must not be empty"));
    }
    Ok(())
}

fn check_region(region: &str) -> Result<()> {
    if region.is_empty() {
        return Err(Error::invalid_argument("region must not be empty"));
    }
    Ok(())
}

impl<V> CacheManager<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a new manager builder.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> crate::builder::CacheManagerBuilder<V> {
        crate::builder::CacheManagerBuilder::new(name)
    }

    pub(crate) fn start(inner: ManagerInner<V>) -> CacheManager<V> {
        let inner = Arc::new(inner);
        if let Some(backplane) = &inner.backplane {
            let events = backplane.subscribe();
            let task = spawn_listener(&inner, events);
            *inner.listener.lock() = Some(task);
        }
        CacheManager { inner }
    }

    pub(crate) fn new_inner(
        name: String,
        update_mode: UpdateMode,
        slots: Vec<Slot<V>>,
        backplane: Option<DynamicBackplane>,
        telemetry: CacheTelemetry,
    ) -> ManagerInner<V> {
        ManagerInner {
            name,
            update_mode,
            slots,
            backplane,
            telemetry,
            update_lock: tokio::sync::Mutex::new(()),
            listener: parking_lot::Mutex::new(None),
        }
    }

    /// The manager's name, used in telemetry attributes.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The configured update mode.
    #[must_use]
    pub fn update_mode(&self) -> UpdateMode {
        self.inner.update_mode
    }

    /// The number of handles in the tier stack.
    #[must_use]
    pub fn handle_count(&self) -> usize {
        self.inner.slots.len()
    }

    /// Statistics of every handle, in tier order.
    #[must_use]
    pub fn handle_stats(&self) -> Vec<(String, Arc<HandleStats>)> {
        self.inner
            .slots
            .iter()
            .map(|slot| (slot.handle.name().to_string(), slot.handle.stats()))
            .collect()
    }

    /// Writes the item into every handle, insert-only.
    ///
    /// Returns the was-new status of the first (primary) handle; a handle
    /// that already holds the key treats the call as a no-op.
    ///
    /// # Errors
    ///
    /// Propagates the first handle failure unchanged.
    pub async fn add(&self, item: CacheItem<V>) -> Result<bool> {
        let started = Instant::now();
        let result = self.add_impl(item).await;
        let activity = match &result {
            Ok(true) => CacheActivity::Added,
            Ok(false) => CacheActivity::AlreadyExists,
            Err(_) => CacheActivity::Error,
        };
        self.finish(CacheOperation::Add, activity, started);
        result
    }

    async fn add_impl(&self, item: CacheItem<V>) -> Result<bool> {
        let mut primary = None;
        let mut any = false;
        for slot in &self.inner.slots {
            let added = slot.handle.add(item.clone()).await?;
            if primary.is_none() {
                primary = Some(added);
            }
            any |= added;
        }
        if any {
            self.inner
                .publish(BackplaneEvent::Changed {
                    key: item.key().to_string(),
                    region: item.region().map(str::to_string),
                })
                .await;
        }
        self.record_entries();
        Ok(primary.unwrap_or(false))
    }

    /// Writes the item into every handle, inserting or overwriting.
    ///
    /// # Errors
    ///
    /// Propagates the first handle failure unchanged.
    pub async fn put(&self, item: CacheItem<V>) -> Result<()> {
        let started = Instant::now();
        let result = self.put_impl(item).await;
        let activity = if result.is_ok() { CacheActivity::Stored } else { CacheActivity::Error };
        self.finish(CacheOperation::Put, activity, started);
        result
    }

    async fn put_impl(&self, item: CacheItem<V>) -> Result<()> {
        for slot in &self.inner.slots {
            slot.handle.put(item.clone()).await?;
        }
        self.inner
            .publish(BackplaneEvent::Changed {
                key: item.key().to_string(),
                region: item.region().map(str::to_string),
            })
            .await;
        self.record_entries();
        Ok(())
    }

    /// Reads a value by key.
    ///
    /// # Errors
    ///
    /// Propagates handle failures unchanged. A missing key is `Ok(None)`,
    /// not an error.
    pub async fn get(&self, key: &str) -> Result<Option<V>> {
        Ok(self.get_item(key).await?.map(CacheItem::into_value))
    }

    /// Reads a value by key within a region.
    ///
    /// # Errors
    ///
    /// Propagates handle failures unchanged.
    pub async fn get_in(&self, key: &str, region: &str) -> Result<Option<V>> {
        Ok(self.get_item_in(key, region).await?.map(CacheItem::into_value))
    }

    /// Reads the full item by key.
    ///
    /// # Errors
    ///
    /// Propagates handle failures unchanged.
    pub async fn get_item(&self, key: &str) -> Result<Option<CacheItem<V>>> {
        self.get_item_recorded(key, None).await
    }

    /// Reads the full item by key within a region.
    ///
    /// # Errors
    ///
    /// Propagates handle failures unchanged.
    pub async fn get_item_in(&self, key: &str, region: &str) -> Result<Option<CacheItem<V>>> {
        check_region(region)?;
        self.get_item_recorded(key, Some(region)).await
    }

    async fn get_item_recorded(
        &self,
        key: &str,
        region: Option<&str>,
    ) -> Result<Option<CacheItem<V>>> {
        let started = Instant::now();
        let result = self.get_item_impl(key, region).await;
        let activity = match &result {
            Ok(Some(_)) => CacheActivity::Hit,
            Ok(None) => CacheActivity::Miss,
            Err(_) => CacheActivity::Error,
        };
        self.finish(CacheOperation::Get, activity, started);
        result
    }

    /// Iterates tiers in declared order; the first hit wins and, unless the
    /// update mode is `None`, is promoted into the tiers it bypassed.
    async fn get_item_impl(&self, key: &str, region: Option<&str>) -> Result<Option<CacheItem<V>>> {
        check_key(key)?;
        for (index, slot) in self.inner.slots.iter().enumerate() {
            let Some(item) = slot.handle.get(key, region).await? else {
                continue;
            };
            if index > 0 && self.inner.update_mode != UpdateMode::None {
                for earlier in &self.inner.slots[..index] {
                    earlier.handle.add(item.clone()).await?;
                }
            }
            return Ok(Some(item));
        }
        Ok(None)
    }

    /// Returns `true` if the key exists in any tier.
    ///
    /// # Errors
    ///
    /// Propagates handle failures unchanged.
    pub async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get_item(key).await?.is_some())
    }

    /// Returns `true` if the key exists in any tier of the region.
    ///
    /// # Errors
    ///
    /// Propagates handle failures unchanged.
    pub async fn contains_in(&self, key: &str, region: &str) -> Result<bool> {
        Ok(self.get_item_in(key, region).await?.is_some())
    }

    /// Reads a value, or computes and stores it on a miss.
    ///
    /// The computed value is written through every tier with `put`
    /// semantics. Concurrent callers may compute independently; the last
    /// write wins.
    ///
    /// # Errors
    ///
    /// Propagates handle failures unchanged.
    pub async fn get_or_insert<F, Fut>(&self, key: &str, f: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        if let Some(value) = self.get(key).await? {
            return Ok(value);
        }
        let value = f().await;
        self.put(CacheItem::new(key, value.clone())?).await?;
        Ok(value)
    }

    /// Removes the key from every handle.
    ///
    /// Returns `true` if at least one handle held the key.
    ///
    /// # Errors
    ///
    /// Propagates the first handle failure unchanged.
    pub async fn remove(&self, key: &str) -> Result<bool> {
        self.remove_recorded(key, None).await
    }

    /// Removes the key from every handle within a region.
    ///
    /// # Errors
    ///
    /// Propagates the first handle failure unchanged.
    pub async fn remove_in(&self, key: &str, region: &str) -> Result<bool> {
        check_region(region)?;
        self.remove_recorded(key, Some(region)).await
    }

    async fn remove_recorded(&self, key: &str, region: Option<&str>) -> Result<bool> {
        let started = Instant::now();
        let result = self.remove_impl(key, region).await;
        let activity = match &result {
            Ok(true) => CacheActivity::Removed,
            Ok(false) => CacheActivity::NotFound,
            Err(_) => CacheActivity::Error,
        };
        self.finish(CacheOperation::Remove, activity, started);
        result
    }

    async fn remove_impl(&self, key: &str, region: Option<&str>) -> Result<bool> {
        check_key(key)?;
        let mut any = false;
        for slot in &self.inner.slots {
            any |= slot.handle.remove(key, region).await?;
        }
        if any {
            self.inner
                .publish(BackplaneEvent::Removed {
                    key: key.to_string(),
                    region: region.map(str::to_string),
                })
                .await;
        }
        self.record_entries();
        Ok(any)
    }

    /// Performs an optimistic read-modify-write on the key.
    ///
    /// The compare-and-swap runs against the most authoritative tier holding
    /// the key (the last one in declared order); on success the new value is
    /// propagated to the other tiers per the update mode. `update` may be
    /// invoked several times when concurrent writers conflict; returning
    /// `None` cancels without writing.
    ///
    /// A per-manager lock keeps the multi-tier propagation atomic from this
    /// manager's viewpoint; the per-handle version check is what protects
    /// against concurrent writers elsewhere.
    ///
    /// # Errors
    ///
    /// Propagates handle failures unchanged.
    pub async fn update<F>(&self, key: &str, update: F, max_retries: usize) -> Result<UpdateOutcome<V>>
    where
        F: Fn(&V) -> Option<V> + Send + Sync + 'static,
    {
        self.update_recorded(key, None, &update, max_retries).await
    }

    /// Performs an optimistic read-modify-write on the key within a region.
    ///
    /// # Errors
    ///
    /// Propagates handle failures unchanged.
    pub async fn update_in<F>(
        &self,
        key: &str,
        region: &str,
        update: F,
        max_retries: usize,
    ) -> Result<UpdateOutcome<V>>
    where
        F: Fn(&V) -> Option<V> + Send + Sync + 'static,
    {
        check_region(region)?;
        self.update_recorded(key, Some(region), &update, max_retries).await
    }

    async fn update_recorded(
        &self,
        key: &str,
        region: Option<&str>,
        update: &UpdateFn<V>,
        max_retries: usize,
    ) -> Result<UpdateOutcome<V>> {
        let started = Instant::now();
        let result = self.update_impl(key, region, update, max_retries).await;
        let activity = match &result {
            Ok(UpdateOutcome::Updated(_)) => CacheActivity::Updated,
            Ok(UpdateOutcome::Missing) => CacheActivity::UpdateMissing,
            Ok(UpdateOutcome::Canceled) => CacheActivity::UpdateCanceled,
            Ok(UpdateOutcome::ExhaustedRetries) => CacheActivity::UpdateConflicted,
            Err(_) => CacheActivity::Error,
        };
        self.finish(CacheOperation::Update, activity, started);
        result
    }

    async fn update_impl(
        &self,
        key: &str,
        region: Option<&str>,
        update: &UpdateFn<V>,
        max_retries: usize,
    ) -> Result<UpdateOutcome<V>> {
        check_key(key)?;
        let _guard = self.inner.update_lock.lock().await;

        let slots = &self.inner.slots;
        let mut source = None;
        for (index, slot) in slots.iter().enumerate().rev() {
            if slot.handle.get(key, region).await?.is_some() {
                source = Some(index);
                break;
            }
        }
        let Some(index) = source else {
            return Ok(UpdateOutcome::Missing);
        };

        let outcome = slots[index].handle.update(key, region, update, max_retries).await?;

        if let UpdateOutcome::Updated(item) = &outcome {
            match self.inner.update_mode {
                UpdateMode::None => {}
                UpdateMode::Up => {
                    for slot in &slots[..index] {
                        slot.handle.put(item.clone()).await?;
                    }
                }
                UpdateMode::Full => {
                    for (other, slot) in slots.iter().enumerate() {
                        if other != index {
                            slot.handle.put(item.clone()).await?;
                        }
                    }
                }
            }
            self.inner
                .publish(BackplaneEvent::Changed {
                    key: key.to_string(),
                    region: region.map(str::to_string),
                })
                .await;
            self.record_entries();
        }
        Ok(outcome)
    }

    /// Changes the expiration policy of the key in every handle holding it.
    ///
    /// The deadline is re-anchored at the time of the call; handles without
    /// the key skip the change. [`ExpirationMode::None`] removes expiration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for [`ExpirationMode::Default`]
    /// (there is no item-independent default to restore) or a zero timeout
    /// on a timed mode; propagates handle failures unchanged.
    pub async fn expire(&self, key: &str, mode: ExpirationMode, timeout: Duration) -> Result<()> {
        self.expire_recorded(key, None, mode, timeout).await
    }

    /// Changes the expiration policy of a key within a region.
    ///
    /// # Errors
    ///
    /// Same conditions as [`expire`](Self::expire).
    pub async fn expire_in(
        &self,
        key: &str,
        region: &str,
        mode: ExpirationMode,
        timeout: Duration,
    ) -> Result<()> {
        check_region(region)?;
        self.expire_recorded(key, Some(region), mode, timeout).await
    }

    async fn expire_recorded(
        &self,
        key: &str,
        region: Option<&str>,
        mode: ExpirationMode,
        timeout: Duration,
    ) -> Result<()> {
        let started = Instant::now();
        let result = self.expire_impl(key, region, mode, timeout).await;
        let activity = if result.is_ok() { CacheActivity::Ok } else { CacheActivity::Error };
        self.finish(CacheOperation::Expire, activity, started);
        result
    }

    async fn expire_impl(
        &self,
        key: &str,
        region: Option<&str>,
        mode: ExpirationMode,
        timeout: Duration,
    ) -> Result<()> {
        check_key(key)?;
        if mode == ExpirationMode::Default {
            return Err(Error::invalid_argument(
                "expire requires an explicit mode; Default only applies to stored items",
            ));
        }
        if matches!(mode, ExpirationMode::Absolute | ExpirationMode::Sliding) && timeout.is_zero() {
            return Err(Error::invalid_argument(
                "absolute and sliding expiration require a timeout greater than zero",
            ));
        }
        for slot in &self.inner.slots {
            slot.handle.expire(key, region, mode, timeout).await?;
        }
        self.inner
            .publish(BackplaneEvent::Changed {
                key: key.to_string(),
                region: region.map(str::to_string),
            })
            .await;
        Ok(())
    }

    /// Removes every entry from every handle.
    ///
    /// # Errors
    ///
    /// Propagates the first handle failure unchanged.
    pub async fn clear(&self) -> Result<()> {
        let started = Instant::now();
        let result = self.clear_impl().await;
        let activity = if result.is_ok() { CacheActivity::Ok } else { CacheActivity::Error };
        self.finish(CacheOperation::Clear, activity, started);
        result
    }

    async fn clear_impl(&self) -> Result<()> {
        for slot in &self.inner.slots {
            slot.handle.clear().await?;
        }
        self.inner.publish(BackplaneEvent::Cleared).await;
        self.record_entries();
        Ok(())
    }

    /// Removes every entry of one region from every handle.
    ///
    /// # Errors
    ///
    /// Propagates the first handle failure unchanged.
    pub async fn clear_region(&self, region: &str) -> Result<()> {
        let started = Instant::now();
        let result = self.clear_region_impl(region).await;
        let activity = if result.is_ok() { CacheActivity::Ok } else { CacheActivity::Error };
        self.finish(CacheOperation::ClearRegion, activity, started);
        result
    }

    async fn clear_region_impl(&self, region: &str) -> Result<()> {
        check_region(region)?;
        for slot in &self.inner.slots {
            slot.handle.clear_region(region).await?;
        }
        self.inner
            .publish(BackplaneEvent::ClearedRegion {
                region: region.to_string(),
            })
            .await;
        self.record_entries();
        Ok(())
    }

    fn finish(&self, operation: CacheOperation, activity: CacheActivity, started: Instant) {
        self.inner
            .telemetry
            .record(&self.inner.name, operation, activity, started.elapsed());
    }

    fn record_entries(&self) {
        for slot in &self.inner.slots {
            self.inner
                .telemetry
                .record_entries(&self.inner.name, slot.handle.name(), slot.handle.count());
        }
    }
}

impl<V> ManagerInner<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Publishes after all handles have been updated. Best-effort: a failed
    /// publish leaves peers to converge through expiration instead.
    async fn publish(&self, event: BackplaneEvent) {
        let Some(backplane) = &self.backplane else {
            return;
        };
        if let Err(error) = backplane.publish(event).await {
            tracing::warn!(
                cache.name = self.name.as_str(),
                error = %error,
                "backplane publish failed"
            );
        }
    }

    /// Applies an invalidation originated by a peer node to every tier that
    /// is not a backplane source; the shared tier already saw the change.
    async fn apply_remote_event(&self, event: BackplaneEvent) {
        for slot in self.slots.iter().filter(|slot| !slot.backplane_source) {
            let result = match &event {
                BackplaneEvent::Changed { key, region } | BackplaneEvent::Removed { key, region } => {
                    slot.handle.remove(key, region.as_deref()).await.map(|_| ())
                }
                BackplaneEvent::Cleared => slot.handle.clear().await,
                BackplaneEvent::ClearedRegion { region } => slot.handle.clear_region(region).await,
            };
            if let Err(error) = result {
                tracing::warn!(
                    cache.name = self.name.as_str(),
                    cache.handle = slot.handle.name(),
                    error = %error,
                    "failed to apply backplane invalidation"
                );
            }
        }
    }
}

/// Drains backplane events on a dedicated task. The task holds only a weak
/// reference so it cannot keep a dropped manager alive.
fn spawn_listener<V>(
    inner: &Arc<ManagerInner<V>>,
    mut events: mpsc::UnboundedReceiver<BackplaneEvent>,
) -> JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
{
    let weak = Arc::downgrade(inner);
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let Some(inner) = weak.upgrade() else {
                break;
            };
            inner.apply_remote_event(event).await;
        }
    })
}
