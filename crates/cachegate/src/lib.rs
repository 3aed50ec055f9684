// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A cache facade that creates its client lazily and can absorb cluster connectivity failures.
//!
//! Applications talk to a [`CacheFacade`]. The facade forwards every operation to a
//! [`CacheClient`] that performs the real work against a cache cluster, and adds two things:
//!
//! - **Lazy, single construction.** The client is created on the first operation, from a factory
//!   selected by name when the facade is built. Concurrent first operations create one client.
//! - **Failure absorption.** With `IGNORE_EXCEPTIONS` enabled, a connectivity failure is replaced
//!   by the operation's fallback value (and optionally logged) so a cache outage does not become an
//!   application outage. Every other failure always reaches the caller.
//!
//! # Configuration
//!
//! ```
//! use cachegate::{Caches, CachesConfig, ClientRegistry, GlobalDefaults};
//!
//! let config = CachesConfig::from_json(
//!     r#"{
//!         "default": {
//!             "LOCATION": "10.0.0.1:7000,10.0.0.2:7000",
//!             "TIMEOUT": 600,
//!             "OPTIONS": { "CLIENT_CLASS": "memory", "IGNORE_EXCEPTIONS": true }
//!         }
//!     }"#,
//! )?;
//!
//! let defaults = GlobalDefaults {
//!     log_ignored_exceptions: true,
//!     ..GlobalDefaults::default()
//! };
//!
//! let caches = Caches::<String>::new(config, &ClientRegistry::default(), &defaults)?;
//! let cache = caches.default_cache()?;
//! assert!(cache.policy().ignores_failures());
//! # Ok::<(), cachegate::Error>(())
//! ```
//!
//! # Custom clients
//!
//! Implement [`CacheClient`] and register a factory under the name used in `CLIENT_CLASS`. A client
//! that can hand out its underlying connection also implements [`RawConnectionProvider`] and
//! returns itself from [`CacheClient::raw_connection_provider`].
//!
//! # Logging
//!
//! Events are emitted with `tracing`:
//!
//! - `cache.failure_ignored` (`ERROR`) for every absorbed failure when logging is enabled
//! - `cache.client_created` (`DEBUG`) when a facade creates its client
//! - `cache.client_failed` (`WARN`) when creating a client fails

mod caches;
mod config;
mod facade;
mod factory;
mod policy;

#[doc(inline)]
pub use cachegate_client::{
    BackendOptions, CacheClient, CacheLock, CacheSettings, DEFAULT_CLIENT, DEFAULT_TIMEOUT, Error, ErrorKind, Expiry,
    FacadeHandle, KeyIter, Lock, LockGuard, LockOptions, RawConnection, RawConnectionProvider, Result, ServerSpec, Ttl,
    Version,
};
#[cfg(feature = "memory")]
#[cfg_attr(docsrs, doc(cfg(feature = "memory")))]
#[doc(inline)]
pub use cachegate_memory::{Counter, MemoryClient};
#[cfg(feature = "test-util")]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
#[doc(inline)]
pub use cachegate_client::testing;
pub use caches::Caches;
pub use config::{CachesConfig, DEFAULT_ALIAS, DEFAULT_LOGGER, GlobalDefaults};
pub use facade::CacheFacade;
pub use factory::{ClientFactory, ClientRegistry};
pub use policy::{AbsorptionPolicy, Operation};
