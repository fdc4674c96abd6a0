// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! In-process memory handle for the strata tiered cache.
//!
//! [`MemoryHandle`] is the reference implementation of the
//! [`CacheHandle`](strata_tier::CacheHandle) contract: a concurrent
//! in-process store with absolute and sliding expiration, per-handle
//! expiration defaults, region bulk deletes, version-based
//! compare-and-swap updates, and statistics.
//!
//! Handles are cheap to clone and clones share storage, so a single
//! instance can back multiple managers as a stand-in for a shared
//! distributed tier.

mod builder;
mod handle;

#[doc(inline)]
pub use builder::MemoryHandleBuilder;
#[doc(inline)]
pub use handle::MemoryHandle;
