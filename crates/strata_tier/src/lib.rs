// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Core contracts for the strata tiered cache.
//!
//! This crate defines the building blocks every tier of a strata cache
//! shares: [`CacheItem`] for values with identity, expiration, and version
//! metadata; the [`CacheHandle`] trait that all storage backends implement;
//! the [`Backplane`] contract for cross-node invalidation; per-handle
//! [`HandleStats`]; and the [`Serializer`] abstraction for byte-oriented
//! stores.
//!
//! # Overview
//!
//! The contracts separate storage concerns from caching behavior. Implement
//! [`CacheHandle`] for your storage backend, then use the `strata` crate to
//! compose handles into an ordered tier stack with read-through promotion,
//! write propagation, optimistic updates, and backplane coherency.
//!
//! # Implementing a Cache Handle
//!
//! See the [`CacheHandle`] documentation for a complete single-map example.
//! Handles own three responsibilities the manager never takes over:
//! expiration enforcement, version assignment for compare-and-swap updates,
//! and statistics recording.
//!
//! # Dynamic Dispatch
//!
//! A manager holds its tiers as a runtime-ordered list, so handles are
//! erased behind [`DynamicHandle`] (and backplanes behind
//! [`DynamicBackplane`]). Use [`DynamicHandleExt::into_dynamic`] to erase a
//! concrete handle.

mod backplane;
mod dynamic;
mod error;
mod handle;
mod item;
pub mod serialize;
mod stats;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

#[doc(inline)]
pub use backplane::{Backplane, BackplaneEvent, BackplaneMessage, DynamicBackplane};
#[doc(inline)]
pub use dynamic::{DynamicHandle, DynamicHandleExt};
#[doc(inline)]
pub use error::{Error, Result};
#[doc(inline)]
pub use handle::{CacheHandle, UpdateFn, UpdateOutcome};
#[doc(inline)]
pub use item::{CacheItem, ExpirationMode};
#[doc(inline)]
pub use serialize::{JsonSerializer, Serializer};
#[doc(inline)]
pub use stats::{HandleStats, StatsSnapshot};
