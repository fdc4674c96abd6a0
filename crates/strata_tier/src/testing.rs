// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Mock handle implementation for testing.
//!
//! This module provides [`MockHandle`], a configurable in-memory handle that
//! records all operations and supports failure injection for testing error
//! paths. The mock stores items verbatim and does not enforce expiration;
//! use a real handle when expiration behavior is under test.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::{
    CacheHandle, CacheItem, Error, ExpirationMode, HandleStats, Result, UpdateFn, UpdateOutcome,
};

/// Recorded handle operation with full context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleOp {
    /// A get was performed with the given key and region.
    Get(String, Option<String>),
    /// An add was performed for the given key and region.
    Add(String, Option<String>),
    /// A put was performed for the given key and region.
    Put(String, Option<String>),
    /// A remove was performed with the given key and region.
    Remove(String, Option<String>),
    /// A clear was performed.
    Clear,
    /// A region clear was performed.
    ClearRegion(String),
    /// An expiration change was performed.
    Expire(String, Option<String>),
    /// A compare-and-swap update was performed.
    Update(String, Option<String>),
}

type FailPredicate = Box<dyn Fn(&HandleOp) -> bool + Send + Sync>;
type Entries<V> = HashMap<(String, Option<String>), CacheItem<V>>;

/// A configurable mock handle for testing.
///
/// Stores items in a plain map, records every operation for later
/// verification, and can be configured to fail operations on demand.
///
/// # Examples
///
/// ```
/// use strata_tier::testing::{HandleOp, MockHandle};
/// use strata_tier::{CacheHandle, CacheItem};
/// # futures::executor::block_on(async {
///
/// let handle = MockHandle::<i32>::new("mock");
///
/// handle.add(CacheItem::new("key", 42)?).await?;
/// let item = handle.get("key", None).await?;
/// assert_eq!(*item.unwrap().value(), 42);
///
/// assert_eq!(handle.operations(), vec![
///     HandleOp::Add("key".to_string(), None),
///     HandleOp::Get("key".to_string(), None),
/// ]);
/// # Ok::<(), strata_tier::Error>(())
/// # });
/// ```
///
/// # Failure Injection
///
/// ```
/// use strata_tier::testing::{HandleOp, MockHandle};
/// use strata_tier::CacheHandle;
/// # futures::executor::block_on(async {
///
/// let handle = MockHandle::<i32>::new("mock");
///
/// handle.fail_when(|op| matches!(op, HandleOp::Get(k, _) if k == "forbidden"));
/// assert!(handle.get("forbidden", None).await.is_err());
/// assert!(handle.get("allowed", None).await.is_ok());
/// # });
/// ```
pub struct MockHandle<V> {
    name: String,
    stats: Arc<HandleStats>,
    data: Arc<Mutex<Entries<V>>>,
    operations: Arc<Mutex<Vec<HandleOp>>>,
    fail_when: Arc<Mutex<Option<FailPredicate>>>,
}

impl<V> std::fmt::Debug for MockHandle<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockHandle")
            .field("name", &self.name)
            .field("fail_when", &self.fail_when.lock().is_some())
            .finish_non_exhaustive()
    }
}

impl<V> Clone for MockHandle<V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            stats: Arc::clone(&self.stats),
            data: Arc::clone(&self.data),
            operations: Arc::clone(&self.operations),
            fail_when: Arc::clone(&self.fail_when),
        }
    }
}

impl<V> MockHandle<V> {
    /// Creates a new empty mock handle.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stats: Arc::new(HandleStats::new(true)),
            data: Arc::new(Mutex::new(HashMap::new())),
            operations: Arc::new(Mutex::new(Vec::new())),
            fail_when: Arc::new(Mutex::new(None)),
        }
    }

    /// Sets a predicate that determines when operations should fail.
    ///
    /// The predicate receives the operation and returns `true` if it should
    /// fail with a store error.
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&HandleOp) -> bool + Send + Sync + 'static,
    {
        *self.fail_when.lock() = Some(Box::new(predicate));
    }

    /// Clears the failure predicate, allowing all operations to succeed.
    pub fn clear_failures(&self) {
        *self.fail_when.lock() = None;
    }

    /// Returns a clone of all recorded operations.
    #[must_use]
    pub fn operations(&self) -> Vec<HandleOp> {
        self.operations.lock().clone()
    }

    /// Clears all recorded operations.
    pub fn clear_operations(&self) {
        self.operations.lock().clear();
    }

    /// Returns `true` if the handle contains the given key.
    #[must_use]
    pub fn contains_key(&self, key: &str, region: Option<&str>) -> bool {
        self.data
            .lock()
            .contains_key(&(key.to_string(), region.map(str::to_string)))
    }

    fn check(&self, op: HandleOp) -> Result<()> {
        let fail = self
            .fail_when
            .lock()
            .as_ref()
            .is_some_and(|predicate| predicate(&op));
        self.operations.lock().push(op);
        if fail {
            return Err(Error::store(std::io::Error::other("mock: operation failed")));
        }
        Ok(())
    }
}

fn entry_id(key: &str, region: Option<&str>) -> (String, Option<String>) {
    (key.to_string(), region.map(str::to_string))
}

impl<V> CacheHandle<V> for MockHandle<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn add(&self, item: CacheItem<V>) -> Result<bool> {
        self.check(HandleOp::Add(item.key().to_string(), item.region().map(str::to_string)))?;
        let id = entry_id(item.key(), item.region());
        let region = item.region().map(str::to_string);
        let mut data = self.data.lock();
        self.stats.add_call(region.as_deref());
        if data.contains_key(&id) {
            return Ok(false);
        }
        data.insert(id, item.with_version(1));
        self.stats.item_added(region.as_deref());
        Ok(true)
    }

    async fn put(&self, item: CacheItem<V>) -> Result<()> {
        self.check(HandleOp::Put(item.key().to_string(), item.region().map(str::to_string)))?;
        let id = entry_id(item.key(), item.region());
        let region = item.region().map(str::to_string);
        let mut data = self.data.lock();
        self.stats.put_call(region.as_deref());
        let version = data.get(&id).map_or(1, |prev| prev.version() + 1);
        if data.insert(id, item.with_version(version)).is_none() {
            self.stats.item_added(region.as_deref());
        }
        Ok(())
    }

    async fn get(&self, key: &str, region: Option<&str>) -> Result<Option<CacheItem<V>>> {
        self.check(HandleOp::Get(key.to_string(), region.map(str::to_string)))?;
        self.stats.get_call(region);
        let found = self.data.lock().get(&entry_id(key, region)).cloned();
        if found.is_some() {
            self.stats.hit(region);
        } else {
            self.stats.miss(region);
        }
        Ok(found)
    }

    async fn remove(&self, key: &str, region: Option<&str>) -> Result<bool> {
        self.check(HandleOp::Remove(key.to_string(), region.map(str::to_string)))?;
        self.stats.remove_call(region);
        let removed = self.data.lock().remove(&entry_id(key, region)).is_some();
        if removed {
            self.stats.item_removed(region);
        }
        Ok(removed)
    }

    async fn clear(&self) -> Result<()> {
        self.check(HandleOp::Clear)?;
        self.data.lock().clear();
        self.stats.clear_call();
        Ok(())
    }

    async fn clear_region(&self, region: &str) -> Result<()> {
        self.check(HandleOp::ClearRegion(region.to_string()))?;
        let mut data = self.data.lock();
        let before = data.len();
        data.retain(|(_, r), _| r.as_deref() != Some(region));
        let removed = (before - data.len()) as u64;
        self.stats.clear_region_call(region, removed);
        Ok(())
    }

    async fn expire(
        &self,
        key: &str,
        region: Option<&str>,
        mode: ExpirationMode,
        timeout: Duration,
    ) -> Result<()> {
        self.check(HandleOp::Expire(key.to_string(), region.map(str::to_string)))?;
        let mut data = self.data.lock();
        if let Some(item) = data.remove(&entry_id(key, region)) {
            data.insert(entry_id(key, region), item.with_expiration(mode, timeout)?);
        }
        Ok(())
    }

    async fn update(
        &self,
        key: &str,
        region: Option<&str>,
        update: &UpdateFn<V>,
        _max_retries: usize,
    ) -> Result<UpdateOutcome<V>> {
        self.check(HandleOp::Update(key.to_string(), region.map(str::to_string)))?;
        let mut data = self.data.lock();
        let Some(current) = data.get(&entry_id(key, region)) else {
            return Ok(UpdateOutcome::Missing);
        };
        let Some(value) = update(current.value()) else {
            return Ok(UpdateOutcome::Canceled);
        };
        let version = current.version() + 1;
        let next = current.clone().with_value(value).with_version(version);
        data.insert(entry_id(key, region), next.clone());
        Ok(UpdateOutcome::Updated(next))
    }

    fn count(&self) -> u64 {
        self.data.lock().len() as u64
    }

    fn stats(&self) -> Arc<HandleStats> {
        Arc::clone(&self.stats)
    }
}
