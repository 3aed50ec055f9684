// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! The capability interface implemented by cache clients that sit behind a `cachegate` facade.
//!
//! A client owns every cache semantic: key construction, versioning, expiry, pattern matching and
//! routing across cluster nodes. The facade in front of it only decides when the client is created
//! and what happens when a call fails.
//!
//! This crate defines:
//!
//! - [`CacheClient`], the operations every client implements
//! - [`Error`] and [`ErrorKind`], with connectivity failures distinguished from everything else
//! - [`CacheSettings`] and [`FacadeHandle`], what a client learns about the cache that owns it
//! - Optional capabilities such as [`RawConnectionProvider`]
//!
//! # Implementing a client
//!
//! Return [`ErrorKind::Connectivity`] errors for anything that indicates the cluster cannot be
//! reached; facades configured to absorb failures treat only those as absorbable.
//!
//! ```
//! use cachegate_client::{Error, Result};
//!
//! fn call_node(reachable: bool) -> Result<bool> {
//!     if reachable {
//!         Ok(true)
//!     } else {
//!         Err(Error::connectivity("connection refused by 10.0.0.7:7000"))
//!     }
//! }
//!
//! assert!(call_node(false).unwrap_err().is_connectivity());
//! ```
//!
//! # Testing
//!
//! The `test-util` feature enables the [`testing`] module with a recording, failure-injecting
//! mock client and a log capture helper.

mod client;
mod error;
mod expiry;
mod keys;
mod lock;
mod pattern;
mod raw;
mod settings;

#[cfg(any(feature = "test-util", test))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
pub mod testing;

#[doc(inline)]
pub use client::CacheClient;
#[doc(inline)]
pub use error::{Error, ErrorKind, Result};
#[doc(inline)]
pub use expiry::{Expiry, Ttl, Version};
#[doc(inline)]
pub use keys::KeyIter;
#[doc(inline)]
pub use lock::{CacheLock, Lock, LockGuard, LockOptions};
#[doc(inline)]
pub use pattern::KeyPattern;
#[doc(inline)]
pub use raw::{RawConnection, RawConnectionProvider};
#[doc(inline)]
pub use settings::{BackendOptions, CacheSettings, DEFAULT_CLIENT, DEFAULT_TIMEOUT, FacadeHandle, ServerSpec};
