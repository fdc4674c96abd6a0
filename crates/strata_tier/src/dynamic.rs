// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Dynamic handle wrapper for type erasure.
//!
//! The manager composes a runtime-ordered list of heterogeneous handles, so
//! the [`CacheHandle`] contract needs an object-safe form. `ErasedHandle`
//! boxes every future behind [`BoxFuture`]; [`DynamicHandle`] wraps the
//! erased trait object in an `Arc` so tiers stay cheap to clone and share.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;

use crate::{CacheHandle, CacheItem, ExpirationMode, HandleStats, Result, UpdateFn, UpdateOutcome};

/// Object-safe mirror of [`CacheHandle`].
trait ErasedHandle<V>: Send + Sync {
    fn name(&self) -> &str;
    fn add<'a>(&'a self, item: CacheItem<V>) -> BoxFuture<'a, Result<bool>>
    where
        V: 'a;
    fn put<'a>(&'a self, item: CacheItem<V>) -> BoxFuture<'a, Result<()>>
    where
        V: 'a;
    fn get<'a>(
        &'a self,
        key: &'a str,
        region: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Option<CacheItem<V>>>>
    where
        V: 'a;
    fn remove<'a>(&'a self, key: &'a str, region: Option<&'a str>) -> BoxFuture<'a, Result<bool>>
    where
        V: 'a;
    fn clear<'a>(&'a self) -> BoxFuture<'a, Result<()>>
    where
        V: 'a;
    fn clear_region<'a>(&'a self, region: &'a str) -> BoxFuture<'a, Result<()>>
    where
        V: 'a;
    fn expire<'a>(
        &'a self,
        key: &'a str,
        region: Option<&'a str>,
        mode: ExpirationMode,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<()>>
    where
        V: 'a;
    fn update<'a>(
        &'a self,
        key: &'a str,
        region: Option<&'a str>,
        update: &'a UpdateFn<V>,
        max_retries: usize,
    ) -> BoxFuture<'a, Result<UpdateOutcome<V>>>;
    fn count(&self) -> u64;
    fn stats(&self) -> Arc<HandleStats>;
}

impl<V, H> ErasedHandle<V> for H
where
    H: CacheHandle<V>,
{
    fn name(&self) -> &str {
        CacheHandle::name(self)
    }

    fn add<'a>(&'a self, item: CacheItem<V>) -> BoxFuture<'a, Result<bool>>
    where
        V: 'a,
    {
        Box::pin(CacheHandle::add(self, item))
    }

    fn put<'a>(&'a self, item: CacheItem<V>) -> BoxFuture<'a, Result<()>>
    where
        V: 'a,
    {
        Box::pin(CacheHandle::put(self, item))
    }

    fn get<'a>(
        &'a self,
        key: &'a str,
        region: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Option<CacheItem<V>>>>
    where
        V: 'a,
    {
        Box::pin(CacheHandle::get(self, key, region))
    }

    fn remove<'a>(&'a self, key: &'a str, region: Option<&'a str>) -> BoxFuture<'a, Result<bool>>
    where
        V: 'a,
    {
        Box::pin(CacheHandle::remove(self, key, region))
    }

    fn clear<'a>(&'a self) -> BoxFuture<'a, Result<()>>
    where
        V: 'a,
    {
        Box::pin(CacheHandle::clear(self))
    }

    fn clear_region<'a>(&'a self, region: &'a str) -> BoxFuture<'a, Result<()>>
    where
        V: 'a,
    {
        Box::pin(CacheHandle::clear_region(self, region))
    }

    fn expire<'a>(
        &'a self,
        key: &'a str,
        region: Option<&'a str>,
        mode: ExpirationMode,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<()>>
    where
        V: 'a,
    {
        Box::pin(CacheHandle::expire(self, key, region, mode, timeout))
    }

    fn update<'a>(
        &'a self,
        key: &'a str,
        region: Option<&'a str>,
        update: &'a UpdateFn<V>,
        max_retries: usize,
    ) -> BoxFuture<'a, Result<UpdateOutcome<V>>> {
        Box::pin(CacheHandle::update(self, key, region, update, max_retries))
    }

    fn count(&self) -> u64 {
        CacheHandle::count(self)
    }

    fn stats(&self) -> Arc<HandleStats> {
        CacheHandle::stats(self)
    }
}

/// Extension trait for converting any [`CacheHandle`] into a
/// [`DynamicHandle`].
///
/// This trait is automatically implemented for all types that implement
/// `CacheHandle`.
pub trait DynamicHandleExt<V>: Sized {
    /// Converts this handle into a [`DynamicHandle`].
    fn into_dynamic(self) -> DynamicHandle<V>;
}

impl<V, H> DynamicHandleExt<V> for H
where
    H: CacheHandle<V> + 'static,
{
    fn into_dynamic(self) -> DynamicHandle<V> {
        DynamicHandle::new(self)
    }
}

/// A clonable, type-erased cache handle.
///
/// `DynamicHandle` wraps a trait object in an `Arc` so a heterogeneous tier
/// stack can be held in a single ordered list while staying cheap to clone.
/// It implements [`CacheHandle`] itself, delegating every operation.
pub struct DynamicHandle<V>(Arc<dyn ErasedHandle<V>>);

impl<V> DynamicHandle<V> {
    /// Creates a new dynamic handle from any [`CacheHandle`] implementation.
    pub fn new<H>(handle: H) -> Self
    where
        H: CacheHandle<V> + 'static,
    {
        Self(Arc::new(handle))
    }
}

impl<V> Debug for DynamicHandle<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicHandle").field("name", &self.0.name()).finish()
    }
}

impl<V> Clone for DynamicHandle<V> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<V> CacheHandle<V> for DynamicHandle<V>
where
    V: Send + Sync,
{
    fn name(&self) -> &str {
        self.0.name()
    }

    async fn add(&self, item: CacheItem<V>) -> Result<bool> {
        self.0.add(item).await
    }

    async fn put(&self, item: CacheItem<V>) -> Result<()> {
        self.0.put(item).await
    }

    async fn get(&self, key: &str, region: Option<&str>) -> Result<Option<CacheItem<V>>> {
        self.0.get(key, region).await
    }

    async fn remove(&self, key: &str, region: Option<&str>) -> Result<bool> {
        self.0.remove(key, region).await
    }

    async fn clear(&self) -> Result<()> {
        self.0.clear().await
    }

    async fn clear_region(&self, region: &str) -> Result<()> {
        self.0.clear_region(region).await
    }

    async fn expire(
        &self,
        key: &str,
        region: Option<&str>,
        mode: ExpirationMode,
        timeout: Duration,
    ) -> Result<()> {
        self.0.expire(key, region, mode, timeout).await
    }

    async fn update(
        &self,
        key: &str,
        region: Option<&str>,
        update: &UpdateFn<V>,
        max_retries: usize,
    ) -> Result<UpdateOutcome<V>> {
        self.0.update(key, region, update, max_retries).await
    }

    fn count(&self) -> u64 {
        self.0.count()
    }

    fn stats(&self) -> Arc<HandleStats> {
        self.0.stats()
    }
}
