// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Tiered caching with uniform semantics across heterogeneous stores.
//!
//! This crate composes independent cache stores ("handles") — ordered from
//! fastest/most local to slowest/most shared — into a single logical cache:
//! - Reads stop at the first hit and promote it into earlier tiers
//! - Writes go through every tier in declared order
//! - `update` performs optimistic compare-and-swap with configurable
//!   propagation ([`UpdateMode`])
//! - An optional [`Backplane`] keeps in-process tiers on multiple nodes
//!   coherent with a shared distributed tier
//! - Built-in OpenTelemetry metrics and `tracing` logs via
//!   [`CacheTelemetry`]
//!
//! # Examples
//!
//! ## Two-Tier Cache
//!
//! ```
//! use strata::CacheManager;
//! use strata_memory::MemoryHandle;
//! use strata_tier::CacheItem;
//! # futures::executor::block_on(async {
//!
//! let manager = CacheManager::builder("sessions")
//!     .handle(MemoryHandle::<String>::builder().name("l1").build())
//!     .handle(MemoryHandle::<String>::builder().name("l2").build())
//!     .build()?;
//!
//! manager.put(CacheItem::new("user:1", "alice".to_string())?).await?;
//! assert_eq!(manager.get("user:1").await?.as_deref(), Some("alice"));
//! # Ok::<(), strata::Error>(())
//! # });
//! ```
//!
//! ## Optimistic Updates
//!
//! ```
//! use strata::CacheManager;
//! use strata_memory::MemoryHandle;
//! use strata_tier::CacheItem;
//! # futures::executor::block_on(async {
//!
//! let manager = CacheManager::builder("counters")
//!     .handle(MemoryHandle::<u64>::new())
//!     .build()?;
//!
//! manager.add(CacheItem::new("hits", 0)?).await?;
//! let outcome = manager.update("hits", |hits| Some(hits + 1), 50).await?;
//! assert!(outcome.is_updated());
//! # Ok::<(), strata::Error>(())
//! # });
//! ```

pub mod builder;
mod config;
mod factory;
mod manager;
pub mod telemetry;

#[doc(inline)]
pub use builder::CacheManagerBuilder;
#[doc(inline)]
pub use config::{BackplaneConfig, CacheConfig, ExpirationConfig, HandleConfig, UpdateMode};
#[doc(inline)]
pub use factory::CacheFactory;
#[doc(inline)]
pub use manager::CacheManager;
#[doc(inline)]
pub use telemetry::CacheTelemetry;

#[doc(inline)]
pub use strata_tier::{
    Backplane, BackplaneEvent, BackplaneMessage, CacheHandle, CacheItem, DynamicBackplane,
    DynamicHandle, DynamicHandleExt, Error, ExpirationMode, HandleStats, Result, StatsSnapshot,
    UpdateOutcome,
};
