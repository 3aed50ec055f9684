// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The capability interface every cache client implements.

use std::collections::HashMap;
use std::time::Duration;

use crate::{Error, Expiry, KeyIter, Lock, LockOptions, RawConnectionProvider, Result, Ttl, Version};

/// Operations a cache client performs against its store.
///
/// A client owns every cache semantic: key construction and versioning, expiry, pattern matching,
/// routing keys across nodes. Implementations signal unreachable nodes and transport failures with
/// [`ErrorKind::Connectivity`](crate::ErrorKind::Connectivity) errors and argument problems with
/// [`ErrorKind::InvalidUsage`](crate::ErrorKind::InvalidUsage).
///
/// A `version` of `None` means the version configured for the owning cache.
///
/// The trait is object safe; facades hold clients as `Box<dyn CacheClient<V>>`.
pub trait CacheClient<V>: Send + Sync {
    /// Stores `value` only if `key` does not hold a live value. Returns `true` if it was stored.
    fn add(&self, key: &str, value: V, expiry: Expiry, version: Option<Version>) -> Result<bool>;

    /// Stores `value` under `key`, replacing any previous value. Returns `true` on success.
    fn set(&self, key: &str, value: V, expiry: Expiry, version: Option<Version>) -> Result<bool>;

    /// Stores every entry of `entries`.
    fn set_many(&self, entries: HashMap<String, V>, expiry: Expiry, version: Option<Version>) -> Result<()>;

    /// Fetches the value stored under `key`.
    fn get(&self, key: &str, version: Option<Version>) -> Result<Option<V>>;

    /// Fetches the values stored under `keys`. Missing keys are absent from the result.
    fn get_many(&self, keys: &[&str], version: Option<Version>) -> Result<HashMap<String, V>>;

    /// Removes `key`. Returns `true` if it held a value.
    fn delete(&self, key: &str, version: Option<Version>) -> Result<bool>;

    /// Removes every key matching the glob `pattern`. Returns how many were removed.
    fn delete_pattern(&self, pattern: &str, version: Option<Version>) -> Result<u64>;

    /// Removes `keys`. Returns how many held a value.
    fn delete_many(&self, keys: &[&str], version: Option<Version>) -> Result<u64>;

    /// Removes everything from the store.
    fn clear(&self) -> Result<()>;

    /// Lists the keys matching the glob `pattern`.
    fn keys(&self, pattern: &str, version: Option<Version>) -> Result<Vec<String>>;

    /// Lazily lists the keys matching the glob `pattern`.
    fn iter_keys(&self, pattern: &str, version: Option<Version>) -> Result<KeyIter>;

    /// Returns `true` if `key` holds a live value.
    fn has_key(&self, key: &str, version: Option<Version>) -> Result<bool>;

    /// Returns a handle to the lock named `key`. The lock is not acquired yet.
    fn lock(&self, key: &str, options: LockOptions) -> Result<Lock>;

    /// Adds `delta` to the integer stored under `key` and returns the new value.
    fn incr(&self, key: &str, delta: i64, version: Option<Version>) -> Result<i64>;

    /// Subtracts `delta` from the integer stored under `key` and returns the new value.
    fn decr(&self, key: &str, delta: i64, version: Option<Version>) -> Result<i64> {
        let delta = delta
            .checked_neg()
            .ok_or_else(|| Error::invalid_usage(format!("cannot decrement by {delta}")))?;
        self.incr(key, delta, version)
    }

    /// Moves the value of `key` from `version` to `version + delta` and returns the new version.
    fn incr_version(&self, key: &str, delta: i32, version: Option<Version>) -> Result<Version>;

    /// Reports how long `key` has left to live.
    fn ttl(&self, key: &str, version: Option<Version>) -> Result<Ttl>;

    /// Removes the expiry of `key`. Returns `true` if the key exists.
    fn persist(&self, key: &str, version: Option<Version>) -> Result<bool>;

    /// Makes `key` expire after `timeout`. Returns `true` if the key exists.
    fn expire(&self, key: &str, timeout: Duration, version: Option<Version>) -> Result<bool>;

    /// Returns the raw-connection capability, if this client has one.
    fn raw_connection_provider(&self) -> Option<&dyn RawConnectionProvider> {
        None
    }
}
