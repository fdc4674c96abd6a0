// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! In-process backplane for the strata tiered cache.
//!
//! The [`Backplane`](strata_tier::Backplane) contract coordinates local-tier
//! invalidation across cache managers that share a distributed tier. This
//! crate provides [`ChannelBackplane`], an implementation over an
//! in-process broadcast hub: the right transport for multiple managers in
//! one process, and the reference for networked implementations (the wire
//! format it ships is the serialized [`BackplaneMessage`]).
//!
//! [`BackplaneMessage`]: strata_tier::BackplaneMessage

mod channel;

#[doc(inline)]
pub use channel::ChannelBackplane;
