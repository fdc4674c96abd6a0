// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builder for constructing cache managers.
//!
//! The builder is the programmatic construction path: handles are appended
//! in tier order (fastest first) as already-constructed values, so the
//! dependency wiring is checked at compile time. For declarative,
//! registry-driven construction see [`CacheFactory`](crate::CacheFactory).

use strata_tier::{Backplane, CacheHandle, DynamicBackplane, DynamicHandle, Error, Result};

use crate::config::UpdateMode;
use crate::manager::{CacheManager, Slot};
use crate::telemetry::CacheTelemetry;

/// Builder for a [`CacheManager`].
///
/// # Examples
///
/// ```
/// use strata::{CacheManager, UpdateMode};
/// use strata_memory::MemoryHandle;
///
/// let manager = CacheManager::builder("sessions")
///     .handle(MemoryHandle::<String>::builder().name("l1").build())
///     .handle(MemoryHandle::<String>::builder().name("l2").build())
///     .update_mode(UpdateMode::Up)
///     .build()?;
///
/// assert_eq!(manager.handle_count(), 2);
/// # Ok::<(), strata::Error>(())
/// ```
pub struct CacheManagerBuilder<V> {
    name: String,
    slots: Vec<Slot<V>>,
    update_mode: UpdateMode,
    backplane: Option<DynamicBackplane>,
    telemetry: Option<CacheTelemetry>,
}

impl<V> std::fmt::Debug for CacheManagerBuilder<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManagerBuilder")
            .field("name", &self.name)
            .field("handles", &self.slots.len())
            .field("update_mode", &self.update_mode)
            .field("backplane", &self.backplane.is_some())
            .finish_non_exhaustive()
    }
}

impl<V> CacheManagerBuilder<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slots: Vec::new(),
            update_mode: UpdateMode::default(),
            backplane: None,
            telemetry: None,
        }
    }

    /// Appends a handle to the tier stack. Order matters: the first handle
    /// is the fastest tier, the last is the most authoritative.
    #[must_use]
    pub fn handle<H>(mut self, handle: H) -> Self
    where
        H: CacheHandle<V> + 'static,
    {
        self.slots.push(Slot {
            handle: DynamicHandle::new(handle),
            backplane_source: false,
        });
        self
    }

    /// Appends a handle marked as the backplane source: the shared tier
    /// whose changes are broadcast. Backplane invalidations skip source
    /// handles, so the shared tier keeps the data the peers re-read.
    #[must_use]
    pub fn source_handle<H>(mut self, handle: H) -> Self
    where
        H: CacheHandle<V> + 'static,
    {
        self.slots.push(Slot {
            handle: DynamicHandle::new(handle),
            backplane_source: true,
        });
        self
    }

    /// Selects how successful writes propagate across tiers. Defaults to
    /// [`UpdateMode::Up`].
    #[must_use]
    pub fn update_mode(mut self, mode: UpdateMode) -> Self {
        self.update_mode = mode;
        self
    }

    /// Attaches a backplane. Requires at least one handle added via
    /// [`source_handle`](Self::source_handle).
    ///
    /// Building a manager with a backplane spawns its event listener and
    /// therefore requires a running tokio runtime.
    #[must_use]
    pub fn backplane<B>(mut self, backplane: B) -> Self
    where
        B: Backplane,
    {
        self.backplane = Some(DynamicBackplane::new(backplane));
        self
    }

    /// Attaches a telemetry collector. Managers without one record nothing.
    #[must_use]
    pub fn telemetry(mut self, telemetry: CacheTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Builds the manager, validating the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when no handles were added, when
    /// two handles share a name, or when a backplane is attached without a
    /// source handle.
    pub fn build(self) -> Result<CacheManager<V>> {
        if self.slots.is_empty() {
            return Err(Error::configuration(
                "a cache manager requires at least one handle",
            ));
        }

        for (index, slot) in self.slots.iter().enumerate() {
            let name = slot.handle.name();
            if self.slots[..index].iter().any(|other| other.handle.name() == name) {
                return Err(Error::configuration(format!(
                    "duplicate handle name `{name}`; handle names must be unique within a manager"
                )));
            }
        }

        if self.backplane.is_some() && !self.slots.iter().any(|slot| slot.backplane_source) {
            return Err(Error::configuration(
                "a backplane requires at least one handle marked as backplane source",
            ));
        }

        let inner = CacheManager::new_inner(
            self.name,
            self.update_mode,
            self.slots,
            self.backplane,
            self.telemetry.unwrap_or_else(CacheTelemetry::disabled),
        );
        Ok(CacheManager::start(inner))
    }
}
