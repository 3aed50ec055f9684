// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! An in-process cache client for `cachegate` facades.
//!
//! [`MemoryClient`] implements the full [`CacheClient`](cachegate_client::CacheClient) interface
//! inside the current process: prefixed and versioned keys, expiry, glob key patterns, counters and
//! named locks. It is the client a facade creates when its settings do not name another one, and a
//! convenient stand-in for a cluster client in tests and local development.
//!
//! # Options
//!
//! Besides the common cache settings, the client reads two backend options:
//!
//! - [`MAX_ENTRIES`]: the most entries kept before the store is culled. Unbounded when absent.
//! - [`CULL_FREQUENCY`]: the fraction (`1 / n`) of entries removed when culling. Defaults to 3.

mod client;
mod counter;
mod lock;

pub use client::{CULL_FREQUENCY, MAX_ENTRIES, MemoryClient};
pub use counter::Counter;
