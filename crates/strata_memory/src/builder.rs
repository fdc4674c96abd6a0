// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builder for configuring memory handles.

use std::marker::PhantomData;
use std::time::Duration;

use strata_tier::ExpirationMode;

use crate::handle::MemoryHandle;

/// Builder for configuring a [`MemoryHandle`].
///
/// # Examples
///
/// ```
/// use strata_memory::MemoryHandle;
/// use strata_tier::ExpirationMode;
/// use std::time::Duration;
///
/// let handle = MemoryHandle::<i32>::builder()
///     .name("l1")
///     .default_expiration(ExpirationMode::Absolute, Duration::from_secs(300))
///     .stats_enabled(false)
///     .build();
/// ```
#[derive(Debug)]
pub struct MemoryHandleBuilder<V> {
    pub(crate) name: Option<String>,
    pub(crate) default_expiration: Option<(ExpirationMode, Duration)>,
    pub(crate) stats_enabled: bool,
    _phantom: PhantomData<V>,
}

impl<V> Default for MemoryHandleBuilder<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> MemoryHandleBuilder<V> {
    /// Creates a new builder with default settings: no default expiration,
    /// statistics enabled, name `memory`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: None,
            default_expiration: None,
            stats_enabled: true,
            _phantom: PhantomData,
        }
    }

    /// Sets the handle's name, used in statistics and telemetry attributes.
    /// Names must be unique within a manager.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the default expiration applied to items that carry
    /// [`ExpirationMode::Default`].
    ///
    /// Items with an explicit mode keep it; an explicit
    /// [`ExpirationMode::None`] disables expiration despite this default.
    /// A timed mode with a zero timeout is reported as a configuration
    /// error on the first `add` or `put` that tries to resolve it.
    #[must_use]
    pub fn default_expiration(mut self, mode: ExpirationMode, timeout: Duration) -> Self {
        self.default_expiration = Some((mode, timeout));
        self
    }

    /// Enables or disables statistics recording. Enabled by default.
    #[must_use]
    pub fn stats_enabled(mut self, enabled: bool) -> Self {
        self.stats_enabled = enabled;
        self
    }

    /// Builds the configured [`MemoryHandle`].
    #[must_use]
    pub fn build(self) -> MemoryHandle<V>
    where
        V: Clone + Send + Sync + 'static,
    {
        MemoryHandle::from_builder(&self)
    }
}
