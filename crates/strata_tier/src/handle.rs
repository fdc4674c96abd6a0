// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The core trait for cache storage backends.
//!
//! [`CacheHandle`] defines the interface every backing store must satisfy.
//! The trait is designed for composition: implement the storage operations,
//! then let the `strata` manager layer tier coherency, telemetry, and
//! backplane coordination on top.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::{CacheItem, ExpirationMode, HandleStats, Result};

/// The update function applied inside a compare-and-swap loop.
///
/// The function receives the current value and returns the replacement, or
/// `None` to cancel the update without writing.
pub type UpdateFn<V> = dyn Fn(&V) -> Option<V> + Send + Sync;

/// The result of a compare-and-swap update against a handle or manager.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateOutcome<V> {
    /// The update succeeded; carries the item that was written, with its
    /// new version.
    Updated(CacheItem<V>),
    /// The key does not exist; nothing was written or created.
    Missing,
    /// The update function returned `None`; nothing was written.
    Canceled,
    /// Every retry hit a version conflict before the write could land.
    ExhaustedRetries,
}

impl<V> UpdateOutcome<V> {
    /// Returns `true` if the update wrote a new value.
    #[must_use]
    pub fn is_updated(&self) -> bool {
        matches!(self, Self::Updated(_))
    }

    /// Returns the written item, if the update succeeded.
    #[must_use]
    pub fn into_item(self) -> Option<CacheItem<V>> {
        match self {
            Self::Updated(item) => Some(item),
            _ => None,
        }
    }
}

/// Trait for cache handle implementations.
///
/// A handle is one backing store in a tier stack: an in-process map, a
/// distributed key-value client, or anything else that can store
/// [`CacheItem`]s addressed by `(key, region)`.
///
/// # Contract
///
/// - `add` inserts only if the key is absent; `put` upserts.
/// - `get` enforces expiration and refreshes sliding deadlines on a hit.
/// - `update` runs a compare-and-swap loop local to this handle, using the
///   item version to detect conflicts. The handle owns version assignment.
/// - Expiration defaulting happens on every `add`/`put`: an item mode other
///   than [`ExpirationMode::Default`] wins; otherwise the handle's
///   configured default applies; otherwise the entry never expires.
/// - Each handle maintains its own [`HandleStats`].
///
/// Every async method returns a `Send` future so handles can be driven from
/// multi-threaded runtimes and erased behind [`DynamicHandle`].
///
/// [`DynamicHandle`]: crate::DynamicHandle
///
/// # Examples
///
/// A minimal single-map handle (without expiration or statistics) looks
/// like this:
///
/// ```
/// use std::collections::HashMap;
/// use std::sync::Arc;
/// use std::time::Duration;
/// use parking_lot::Mutex;
/// use strata_tier::{
///     CacheHandle, CacheItem, ExpirationMode, HandleStats, Result, UpdateFn, UpdateOutcome,
/// };
///
/// struct MapHandle<V> {
///     stats: Arc<HandleStats>,
///     map: Mutex<HashMap<(String, Option<String>), CacheItem<V>>>,
/// }
///
/// impl<V: Clone + Send + Sync + 'static> CacheHandle<V> for MapHandle<V> {
///     fn name(&self) -> &str {
///         "map"
///     }
///
///     async fn add(&self, item: CacheItem<V>) -> Result<bool> {
///         let mut map = self.map.lock();
///         let id = (item.key().to_string(), item.region().map(str::to_string));
///         if map.contains_key(&id) {
///             return Ok(false);
///         }
///         map.insert(id, item.with_version(1));
///         Ok(true)
///     }
///
///     async fn put(&self, item: CacheItem<V>) -> Result<()> {
///         let id = (item.key().to_string(), item.region().map(str::to_string));
///         self.map.lock().insert(id, item.with_version(1));
///         Ok(())
///     }
///
///     async fn get(&self, key: &str, region: Option<&str>) -> Result<Option<CacheItem<V>>> {
///         let id = (key.to_string(), region.map(str::to_string));
///         Ok(self.map.lock().get(&id).cloned())
///     }
///
///     async fn remove(&self, key: &str, region: Option<&str>) -> Result<bool> {
///         let id = (key.to_string(), region.map(str::to_string));
///         Ok(self.map.lock().remove(&id).is_some())
///     }
///
///     async fn clear(&self) -> Result<()> {
///         self.map.lock().clear();
///         Ok(())
///     }
///
///     async fn clear_region(&self, region: &str) -> Result<()> {
///         self.map.lock().retain(|(_, r), _| r.as_deref() != Some(region));
///         Ok(())
///     }
///
///     async fn expire(
///         &self,
///         _key: &str,
///         _region: Option<&str>,
///         _mode: ExpirationMode,
///         _timeout: Duration,
///     ) -> Result<()> {
///         Ok(())
///     }
///
///     async fn update(
///         &self,
///         key: &str,
///         region: Option<&str>,
///         update: &UpdateFn<V>,
///         _max_retries: usize,
///     ) -> Result<UpdateOutcome<V>> {
///         let id = (key.to_string(), region.map(str::to_string));
///         let mut map = self.map.lock();
///         let Some(current) = map.get(&id) else {
///             return Ok(UpdateOutcome::Missing);
///         };
///         let Some(value) = update(current.value()) else {
///             return Ok(UpdateOutcome::Canceled);
///         };
///         let version = current.version() + 1;
///         let next = current.clone().with_value(value).with_version(version);
///         map.insert(id, next.clone());
///         Ok(UpdateOutcome::Updated(next))
///     }
///
///     fn count(&self) -> u64 {
///         self.map.lock().len() as u64
///     }
///
///     fn stats(&self) -> Arc<HandleStats> {
///         Arc::clone(&self.stats)
///     }
/// }
/// ```
pub trait CacheHandle<V>: Send + Sync {
    /// The handle's name, unique within a manager. Used in statistics and
    /// telemetry attributes.
    fn name(&self) -> &str;

    /// Inserts the item only if `(key, region)` is absent.
    ///
    /// Returns `false` without overwriting when the key already exists.
    fn add(&self, item: CacheItem<V>) -> impl Future<Output = Result<bool>> + Send;

    /// Inserts or overwrites the item.
    fn put(&self, item: CacheItem<V>) -> impl Future<Output = Result<()>> + Send;

    /// Reads the item, enforcing expiration.
    ///
    /// A hit on a sliding entry refreshes its deadline as part of the read.
    fn get(
        &self,
        key: &str,
        region: Option<&str>,
    ) -> impl Future<Output = Result<Option<CacheItem<V>>>> + Send;

    /// Deletes the entry. Returns `false` if it was absent.
    fn remove(&self, key: &str, region: Option<&str>)
        -> impl Future<Output = Result<bool>> + Send;

    /// Deletes every entry in every region.
    fn clear(&self) -> impl Future<Output = Result<()>> + Send;

    /// Deletes every entry in the given region, leaving other regions and
    /// the region-less namespace untouched.
    fn clear_region(&self, region: &str) -> impl Future<Output = Result<()>> + Send;

    /// Changes the expiration policy of an existing entry, re-anchoring the
    /// deadline at the time of the call. A no-op when the entry is absent.
    fn expire(
        &self,
        key: &str,
        region: Option<&str>,
        mode: ExpirationMode,
        timeout: Duration,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Runs a compare-and-swap loop local to this handle.
    ///
    /// Reads the current item, applies `update`, and writes the result back
    /// only if the stored version still matches the one read; otherwise
    /// retries, up to `max_retries` additional attempts.
    fn update(
        &self,
        key: &str,
        region: Option<&str>,
        update: &UpdateFn<V>,
        max_retries: usize,
    ) -> impl Future<Output = Result<UpdateOutcome<V>>> + Send;

    /// The current number of stored entries. May include entries that are
    /// expired but not yet evicted.
    fn count(&self) -> u64;

    /// The handle's statistics counters.
    fn stats(&self) -> Arc<HandleStats>;
}
