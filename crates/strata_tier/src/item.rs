// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The cache item value object and expiration policy types.

use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Expiration policy for a cache item.
///
/// `Default` defers to the handle's configured policy; `None` explicitly
/// disables expiration even when the handle has a default. `Absolute` and
/// `Sliding` require a timeout greater than zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpirationMode {
    /// Defer to the handle's configured default policy.
    #[default]
    Default,
    /// No expiration, regardless of handle defaults.
    None,
    /// Expire at a fixed wall-clock deadline computed from insertion.
    Absolute,
    /// Expire after a period of inactivity; each successful read extends
    /// the deadline by the timeout.
    Sliding,
}

/// A cached value with its identity, expiration policy, and version.
///
/// `CacheItem` is an immutable value object: the key, optional region, and
/// creation timestamp never change once the item has been observed. Mutating
/// operations such as [`with_value`](Self::with_value) and
/// [`with_expiration`](Self::with_expiration) return a new item sharing the
/// immutable fields.
///
/// `(key, region)` is the item's global identity across every handle of a
/// manager; an item without a region lives in its own namespace distinct
/// from any named region.
///
/// The `version` field supports optimistic concurrency: it is assigned and
/// incremented by handles (not by the manager) and compared during
/// compare-and-swap updates.
///
/// # Examples
///
/// ```
/// use strata_tier::{CacheItem, ExpirationMode};
/// use std::time::Duration;
///
/// let item = CacheItem::new("sessions:42", 7_u64)?;
/// assert_eq!(item.key(), "sessions:42");
/// assert!(item.region().is_none());
///
/// let item = CacheItem::in_region("user", "tenant-a", "alice".to_string())?
///     .with_expiration(ExpirationMode::Sliding, Duration::from_secs(30))?;
/// assert_eq!(item.region(), Some("tenant-a"));
/// # Ok::<(), strata_tier::Error>(())
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheItem<V> {
    key: String,
    region: Option<String>,
    value: V,
    expiration: ExpirationMode,
    timeout: Duration,
    created: SystemTime,
    last_accessed: SystemTime,
    version: u64,
}

impl<V> CacheItem<V> {
    /// Creates a new item without a region, deferring expiration to the
    /// storing handle's defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the key is empty.
    pub fn new(key: impl Into<String>, value: V) -> Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(Error::invalid_argument("key must not be empty"));
        }
        let now = SystemTime::now();
        Ok(Self {
            key,
            region: None,
            value,
            expiration: ExpirationMode::Default,
            timeout: Duration::ZERO,
            created: now,
            last_accessed: now,
            version: 0,
        })
    }

    /// Creates a new item inside a named region.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the key or region is empty.
    pub fn in_region(key: impl Into<String>, region: impl Into<String>, value: V) -> Result<Self> {
        let region = region.into();
        if region.is_empty() {
            return Err(Error::invalid_argument("region must not be empty"));
        }
        let mut item = Self::new(key, value)?;
        item.region = Some(region);
        Ok(item)
    }

    /// Returns a new item with the given expiration policy, keeping the
    /// identity, value, and version of this one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the mode is `Absolute` or
    /// `Sliding` and the timeout is zero.
    pub fn with_expiration(self, mode: ExpirationMode, timeout: Duration) -> Result<Self> {
        if matches!(mode, ExpirationMode::Absolute | ExpirationMode::Sliding)
            && timeout.is_zero()
        {
            return Err(Error::invalid_argument(
                "absolute and sliding expiration require a timeout greater than zero",
            ));
        }
        Ok(Self {
            expiration: mode,
            timeout,
            ..self
        })
    }

    /// Returns a new item carrying `value`, keeping the identity, expiration,
    /// and version of this one.
    #[must_use]
    pub fn with_value(self, value: V) -> Self {
        Self { value, ..self }
    }

    /// Returns a new item carrying `version`.
    ///
    /// Versions are owned by handles: a handle assigns the initial version on
    /// insert and bumps it on every successful write, so that concurrent
    /// updates can detect conflicts. Callers other than handle
    /// implementations have no reason to use this.
    #[must_use]
    pub fn with_version(self, version: u64) -> Self {
        Self { version, ..self }
    }

    /// Returns a new item with the given last-accessed timestamp.
    ///
    /// Handles call this when producing read snapshots so the returned item
    /// reflects the touch that the read itself performed.
    #[must_use]
    pub fn with_last_accessed(self, last_accessed: SystemTime) -> Self {
        Self {
            last_accessed,
            ..self
        }
    }

    /// The item's key. Never empty.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The item's region, if any. Never empty when present.
    #[must_use]
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// A reference to the cached value.
    #[must_use]
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Consumes the item and returns the inner value.
    #[must_use]
    pub fn into_value(self) -> V {
        self.value
    }

    /// The item's expiration mode.
    #[must_use]
    pub fn expiration_mode(&self) -> ExpirationMode {
        self.expiration
    }

    /// The expiration timeout. Zero unless the mode requires one.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// When the item was created.
    #[must_use]
    pub fn created(&self) -> SystemTime {
        self.created
    }

    /// When the item was last read or written, as of this snapshot.
    #[must_use]
    pub fn last_accessed(&self) -> SystemTime {
        self.last_accessed
    }

    /// The handle-assigned version used for optimistic concurrency.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }
}
