// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Registry-driven construction of managers from declarative configuration.
//!
//! A [`CacheFactory`] maps handle and backplane kind identifiers to
//! constructor functions. Feeding it a [`CacheConfig`] builds the
//! components in a fixed order (telemetry, backplane, then handles in tier
//! order) and wires them through the regular builder, so all builder
//! validation applies. An unknown kind is a fatal configuration error
//! naming the offending entry.

use std::collections::HashMap;

use strata_tier::{DynamicBackplane, DynamicHandle, Error, Result};

use crate::config::{BackplaneConfig, CacheConfig, HandleConfig};
use crate::manager::CacheManager;
use crate::telemetry::CacheTelemetry;

type HandleCtor<V> = Box<dyn Fn(&HandleConfig) -> Result<DynamicHandle<V>> + Send + Sync>;
type BackplaneCtor = Box<dyn Fn(&BackplaneConfig) -> Result<DynamicBackplane> + Send + Sync>;

/// Constructs cache managers from [`CacheConfig`] descriptions.
///
/// Register a constructor per handle kind (and backplane kind, if used),
/// then call [`build`](Self::build) for each configuration. Byte-oriented
/// handle constructors close over the serializer they need; the
/// configuration's `serializer` field names that choice declaratively.
///
/// # Examples
///
/// ```
/// use strata::{CacheConfig, CacheFactory, HandleConfig, UpdateMode};
/// use strata_memory::MemoryHandle;
/// use strata_tier::DynamicHandle;
///
/// let factory = CacheFactory::<i32>::new().register_handle("memory", |config| {
///     Ok(DynamicHandle::new(
///         MemoryHandle::builder().name(config.name.clone()).build(),
///     ))
/// });
///
/// let config = CacheConfig {
///     name: "sessions".to_string(),
///     update_mode: UpdateMode::Up,
///     handles: vec![HandleConfig {
///         kind: "memory".to_string(),
///         name: "l1".to_string(),
///         backplane_source: false,
///         expiration: None,
///         stats: true,
///     }],
///     backplane: None,
///     serializer: None,
/// };
///
/// let manager = factory.build(&config)?;
/// assert_eq!(manager.handle_count(), 1);
/// # Ok::<(), strata::Error>(())
/// ```
pub struct CacheFactory<V> {
    handles: HashMap<String, HandleCtor<V>>,
    backplanes: HashMap<String, BackplaneCtor>,
    telemetry: Option<CacheTelemetry>,
}

impl<V> Default for CacheFactory<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> std::fmt::Debug for CacheFactory<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheFactory")
            .field("handle_kinds", &self.handles.keys().collect::<Vec<_>>())
            .field("backplane_kinds", &self.backplanes.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl<V> CacheFactory<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates an empty factory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handles: HashMap::new(),
            backplanes: HashMap::new(),
            telemetry: None,
        }
    }

    /// Registers a constructor for a handle kind.
    #[must_use]
    pub fn register_handle<F>(mut self, kind: impl Into<String>, ctor: F) -> Self
    where
        F: Fn(&HandleConfig) -> Result<DynamicHandle<V>> + Send + Sync + 'static,
    {
        self.handles.insert(kind.into(), Box::new(ctor));
        self
    }

    /// Registers a constructor for a backplane kind.
    #[must_use]
    pub fn register_backplane<F>(mut self, kind: impl Into<String>, ctor: F) -> Self
    where
        F: Fn(&BackplaneConfig) -> Result<DynamicBackplane> + Send + Sync + 'static,
    {
        self.backplanes.insert(kind.into(), Box::new(ctor));
        self
    }

    /// Attaches a telemetry collector handed to every built manager.
    #[must_use]
    pub fn telemetry(mut self, telemetry: CacheTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Builds a manager from a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when a handle or backplane kind has
    /// no registered constructor (the error names the offending entry), when
    /// a constructor fails, or when the resulting manager fails builder
    /// validation.
    pub fn build(&self, config: &CacheConfig) -> Result<CacheManager<V>> {
        let mut builder =
            CacheManager::builder(config.name.clone()).update_mode(config.update_mode);

        if let Some(telemetry) = &self.telemetry {
            builder = builder.telemetry(telemetry.clone());
        }

        if let Some(backplane_config) = &config.backplane {
            let ctor = self.backplanes.get(&backplane_config.kind).ok_or_else(|| {
                Error::configuration(format!(
                    "no backplane constructor registered for kind `{}` (channel `{}`)",
                    backplane_config.kind, backplane_config.channel
                ))
            })?;
            builder = builder.backplane(ctor(backplane_config)?);
        }

        for handle_config in &config.handles {
            let ctor = self.handles.get(&handle_config.kind).ok_or_else(|| {
                Error::configuration(format!(
                    "no handle constructor registered for kind `{}` (handle `{}`)",
                    handle_config.kind, handle_config.name
                ))
            })?;
            let handle = ctor(handle_config)?;
            builder = if handle_config.backplane_source {
                builder.source_handle(handle)
            } else {
                builder.handle(handle)
            };
        }

        builder.build()
    }
}
