// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Test doubles for cache clients.
//!
//! [`MockClient`] is a configurable in-memory client that records every operation, supports
//! failure injection of any [`ErrorKind`], counts how many times it was constructed, and can
//! optionally expose a raw connection. [`LogCapture`] collects formatted log output.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;

use crate::{
    CacheClient, CacheLock, Error, ErrorKind, Expiry, FacadeHandle, KeyIter, KeyPattern, Lock, LockOptions,
    RawConnection, RawConnectionProvider, Result, Ttl, Version,
};

/// Recorded client operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientOp {
    /// `add` was called with the given key.
    Add(String),
    /// `set` was called with the given key.
    Set(String),
    /// `set_many` was called with the given keys, sorted.
    SetMany(Vec<String>),
    /// `get` was called with the given key.
    Get(String),
    /// `get_many` was called with the given keys.
    GetMany(Vec<String>),
    /// `delete` was called with the given key.
    Delete(String),
    /// `delete_pattern` was called with the given pattern.
    DeletePattern(String),
    /// `delete_many` was called with the given keys.
    DeleteMany(Vec<String>),
    /// `clear` was called.
    Clear,
    /// `keys` was called with the given pattern.
    Keys(String),
    /// `iter_keys` was called with the given pattern.
    IterKeys(String),
    /// `has_key` was called with the given key.
    HasKey(String),
    /// `lock` was called with the given name.
    Lock(String),
    /// `incr` (or `decr`, as a negative delta) was called.
    Incr {
        /// The counter key.
        key: String,
        /// The requested delta.
        delta: i64,
    },
    /// `incr_version` was called with the given key.
    IncrVersion(String),
    /// `ttl` was called with the given key.
    Ttl(String),
    /// `persist` was called with the given key.
    Persist(String),
    /// `expire` was called with the given key.
    Expire(String),
    /// A raw connection was requested.
    RawConnection {
        /// Whether a write connection was requested.
        write: bool,
    },
}

type FailPredicate = Box<dyn Fn(&ClientOp) -> bool + Send + Sync>;

/// A configurable mock client for testing.
///
/// Values live in a plain map keyed by the caller's key; versions and expiry are recorded but not
/// interpreted. Counters used by `incr` are tracked separately from values. Clones share all state.
///
/// # Examples
///
/// ```
/// use cachegate_client::testing::{ClientOp, MockClient};
/// use cachegate_client::{CacheClient, ErrorKind, Expiry};
///
/// let client = MockClient::<i32>::new();
/// client.set("answer", 42, Expiry::Default, None)?;
/// assert_eq!(client.get("answer", None)?, Some(42));
///
/// client.fail_when(ErrorKind::Connectivity, |op| matches!(op, ClientOp::Get(_)));
/// assert!(client.get("answer", None).is_err());
/// # Ok::<(), cachegate_client::Error>(())
/// ```
pub struct MockClient<V> {
    data: Arc<Mutex<HashMap<String, V>>>,
    counters: Arc<Mutex<HashMap<String, i64>>>,
    locks: Arc<Mutex<HashSet<String>>>,
    operations: Arc<Mutex<Vec<ClientOp>>>,
    failure: Arc<Mutex<Option<(ErrorKind, FailPredicate)>>>,
    raw: Arc<Mutex<Option<RawConnection>>>,
    constructions: Arc<AtomicUsize>,
    handles: Arc<Mutex<Vec<FacadeHandle>>>,
}

impl<V> std::fmt::Debug for MockClient<V>
where
    V: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockClient")
            .field("data", &self.data)
            .field("operations", &self.operations)
            .field("failure", &self.failure.lock().as_ref().map(|(kind, _)| *kind))
            .field("raw", &self.raw.lock().is_some())
            .field("constructions", &self.constructions)
            .finish_non_exhaustive()
    }
}

impl<V> Clone for MockClient<V> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            counters: Arc::clone(&self.counters),
            locks: Arc::clone(&self.locks),
            operations: Arc::clone(&self.operations),
            failure: Arc::clone(&self.failure),
            raw: Arc::clone(&self.raw),
            constructions: Arc::clone(&self.constructions),
            handles: Arc::clone(&self.handles),
        }
    }
}

impl<V> Default for MockClient<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> MockClient<V> {
    /// Creates an empty mock client without a raw connection.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Arc::new(Mutex::new(HashMap::new())),
            counters: Arc::new(Mutex::new(HashMap::new())),
            locks: Arc::new(Mutex::new(HashSet::new())),
            operations: Arc::new(Mutex::new(Vec::new())),
            failure: Arc::new(Mutex::new(None)),
            raw: Arc::new(Mutex::new(None)),
            constructions: Arc::new(AtomicUsize::new(0)),
            handles: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Makes the client expose `connection` through the raw-connection capability.
    #[must_use]
    pub fn with_raw_connection<R>(self, connection: R) -> Self
    where
        R: std::any::Any + Send + Sync,
    {
        *self.raw.lock() = Some(Arc::new(connection));
        self
    }

    /// Simulates constructing a client for the facade behind `handle`.
    ///
    /// Counts the construction, remembers the handle and returns a clone sharing this mock's state.
    /// Use it as the body of a client factory.
    #[must_use]
    pub fn construct(&self, handle: &FacadeHandle) -> Self {
        self.constructions.fetch_add(1, Ordering::SeqCst);
        self.handles.lock().push(handle.clone());
        self.clone()
    }

    /// Returns how many times [`construct`](Self::construct) was called.
    #[must_use]
    pub fn constructions(&self) -> usize {
        self.constructions.load(Ordering::SeqCst)
    }

    /// Returns the facade handle passed to the most recent construction.
    #[must_use]
    pub fn last_handle(&self) -> Option<FacadeHandle> {
        self.handles.lock().last().cloned()
    }

    /// Makes operations matching `predicate` fail with an error of `kind`.
    ///
    /// Replaces any previously configured failure.
    pub fn fail_when<F>(&self, kind: ErrorKind, predicate: F)
    where
        F: Fn(&ClientOp) -> bool + Send + Sync + 'static,
    {
        *self.failure.lock() = Some((kind, Box::new(predicate)));
    }

    /// Lets all operations succeed again.
    pub fn clear_failures(&self) {
        *self.failure.lock() = None;
    }

    /// Returns all recorded operations.
    #[must_use]
    pub fn operations(&self) -> Vec<ClientOp> {
        self.operations.lock().clone()
    }

    /// Clears all recorded operations.
    pub fn clear_operations(&self) {
        self.operations.lock().clear();
    }

    /// Records `op` and fails it if the failure predicate matches.
    fn check(&self, op: ClientOp) -> Result<()> {
        let failure = self
            .failure
            .lock()
            .as_ref()
            .and_then(|(kind, predicate)| predicate(&op).then_some(*kind));
        let message = format!("mock: {op:?} failed");
        self.operations.lock().push(op);
        match failure {
            Some(kind) => Err(Error::caused_by(kind, message)),
            None => Ok(()),
        }
    }
}

impl<V> MockClient<V>
where
    V: Clone,
{
    /// Stores `value` under `key` without recording an operation.
    pub fn seed(&self, key: impl Into<String>, value: V) {
        self.data.lock().insert(key.into(), value);
    }

    /// Creates the counter `key` used by `incr` and `decr` without recording an operation.
    pub fn seed_counter(&self, key: impl Into<String>, value: i64) {
        self.counters.lock().insert(key.into(), value);
    }

    /// Returns the value stored under `key` without recording an operation.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<V> {
        self.data.lock().get(key).cloned()
    }
}

fn owned(keys: &[&str]) -> Vec<String> {
    keys.iter().map(ToString::to_string).collect()
}

impl<V> CacheClient<V> for MockClient<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn add(&self, key: &str, value: V, _expiry: Expiry, _version: Option<Version>) -> Result<bool> {
        self.check(ClientOp::Add(key.to_string()))?;
        let mut data = self.data.lock();
        if data.contains_key(key) {
            return Ok(false);
        }
        data.insert(key.to_string(), value);
        Ok(true)
    }

    fn set(&self, key: &str, value: V, _expiry: Expiry, _version: Option<Version>) -> Result<bool> {
        self.check(ClientOp::Set(key.to_string()))?;
        self.data.lock().insert(key.to_string(), value);
        Ok(true)
    }

    fn set_many(&self, entries: HashMap<String, V>, _expiry: Expiry, _version: Option<Version>) -> Result<()> {
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        self.check(ClientOp::SetMany(keys))?;
        self.data.lock().extend(entries);
        Ok(())
    }

    fn get(&self, key: &str, _version: Option<Version>) -> Result<Option<V>> {
        self.check(ClientOp::Get(key.to_string()))?;
        Ok(self.data.lock().get(key).cloned())
    }

    fn get_many(&self, keys: &[&str], _version: Option<Version>) -> Result<HashMap<String, V>> {
        self.check(ClientOp::GetMany(owned(keys)))?;
        let data = self.data.lock();
        Ok(keys
            .iter()
            .filter_map(|key| data.get(*key).map(|value| ((*key).to_string(), value.clone())))
            .collect())
    }

    fn delete(&self, key: &str, _version: Option<Version>) -> Result<bool> {
        self.check(ClientOp::Delete(key.to_string()))?;
        Ok(self.data.lock().remove(key).is_some())
    }

    fn delete_pattern(&self, pattern: &str, _version: Option<Version>) -> Result<u64> {
        self.check(ClientOp::DeletePattern(pattern.to_string()))?;
        let pattern = KeyPattern::new(pattern)?;
        let mut data = self.data.lock();
        let before = data.len();
        data.retain(|key, _| !pattern.matches(key));
        Ok((before - data.len()) as u64)
    }

    fn delete_many(&self, keys: &[&str], _version: Option<Version>) -> Result<u64> {
        self.check(ClientOp::DeleteMany(owned(keys)))?;
        let mut data = self.data.lock();
        Ok(keys.iter().filter(|key| data.remove(**key).is_some()).count() as u64)
    }

    fn clear(&self) -> Result<()> {
        self.check(ClientOp::Clear)?;
        self.data.lock().clear();
        self.counters.lock().clear();
        Ok(())
    }

    fn keys(&self, pattern: &str, _version: Option<Version>) -> Result<Vec<String>> {
        self.check(ClientOp::Keys(pattern.to_string()))?;
        let pattern = KeyPattern::new(pattern)?;
        let mut keys: Vec<String> = self
            .data
            .lock()
            .keys()
            .filter(|key| pattern.matches(key))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn iter_keys(&self, pattern: &str, _version: Option<Version>) -> Result<KeyIter> {
        self.check(ClientOp::IterKeys(pattern.to_string()))?;
        let pattern = KeyPattern::new(pattern)?;
        let mut keys: Vec<String> = self
            .data
            .lock()
            .keys()
            .filter(|key| pattern.matches(key))
            .cloned()
            .collect();
        keys.sort();
        Ok(KeyIter::from_keys(keys))
    }

    fn has_key(&self, key: &str, _version: Option<Version>) -> Result<bool> {
        self.check(ClientOp::HasKey(key.to_string()))?;
        Ok(self.data.lock().contains_key(key))
    }

    fn lock(&self, key: &str, _options: LockOptions) -> Result<Lock> {
        self.check(ClientOp::Lock(key.to_string()))?;
        Ok(Lock::new(MockLock {
            name: key.to_string(),
            locks: Arc::clone(&self.locks),
            held: AtomicBool::new(false),
        }))
    }

    fn incr(&self, key: &str, delta: i64, _version: Option<Version>) -> Result<i64> {
        self.check(ClientOp::Incr {
            key: key.to_string(),
            delta,
        })?;
        let mut counters = self.counters.lock();
        let current = counters
            .get_mut(key)
            .ok_or_else(|| Error::invalid_usage(format!("key '{key}' not found")))?;
        *current = current
            .checked_add(delta)
            .ok_or_else(|| Error::invalid_usage("increment overflows"))?;
        Ok(*current)
    }

    fn incr_version(&self, key: &str, delta: i32, version: Option<Version>) -> Result<Version> {
        self.check(ClientOp::IncrVersion(key.to_string()))?;
        if !self.data.lock().contains_key(key) {
            return Err(Error::invalid_usage(format!("key '{key}' not found")));
        }
        version
            .unwrap_or(1)
            .checked_add_signed(delta)
            .ok_or_else(|| Error::invalid_usage("version out of range"))
    }

    fn ttl(&self, key: &str, _version: Option<Version>) -> Result<Ttl> {
        self.check(ClientOp::Ttl(key.to_string()))?;
        Ok(if self.data.lock().contains_key(key) {
            Ttl::Persistent
        } else {
            Ttl::Missing
        })
    }

    fn persist(&self, key: &str, _version: Option<Version>) -> Result<bool> {
        self.check(ClientOp::Persist(key.to_string()))?;
        Ok(self.data.lock().contains_key(key))
    }

    fn expire(&self, key: &str, _timeout: Duration, _version: Option<Version>) -> Result<bool> {
        self.check(ClientOp::Expire(key.to_string()))?;
        Ok(self.data.lock().contains_key(key))
    }

    fn raw_connection_provider(&self) -> Option<&dyn RawConnectionProvider> {
        self.raw.lock().is_some().then_some(self as &dyn RawConnectionProvider)
    }
}

impl<V> RawConnectionProvider for MockClient<V>
where
    V: Send + Sync,
{
    fn raw_connection(&self, write: bool) -> Result<RawConnection> {
        self.check(ClientOp::RawConnection { write })?;
        self.raw
            .lock()
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| Error::unsupported("raw_connection"))
    }
}

#[derive(Debug)]
struct MockLock {
    name: String,
    locks: Arc<Mutex<HashSet<String>>>,
    held: AtomicBool,
}

impl CacheLock for MockLock {
    fn acquire(&self, _blocking: bool) -> Result<bool> {
        let acquired = self.locks.lock().insert(self.name.clone());
        if acquired {
            self.held.store(true, Ordering::SeqCst);
        }
        Ok(acquired)
    }

    fn release(&self) -> Result<()> {
        if !self.held.swap(false, Ordering::SeqCst) {
            return Err(Error::invalid_usage(format!("lock '{}' is not held", self.name)));
        }
        self.locks.lock().remove(&self.name);
        Ok(())
    }

    fn locked(&self) -> Result<bool> {
        Ok(self.locks.lock().contains(&self.name))
    }
}

/// Log capture buffer for testing.
///
/// Uses `tracing_subscriber::fmt::MakeWriter` to capture formatted log output
/// into a buffer that can be inspected in tests.
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// Creates an empty capture buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the captured log output as a string.
    #[must_use]
    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock()).to_string()
    }

    /// Returns how many captured lines contain `needle`.
    #[must_use]
    pub fn count(&self, needle: &str) -> usize {
        self.output().lines().filter(|line| line.contains(needle)).count()
    }

    /// Asserts that the captured log output contains the given string.
    ///
    /// # Panics
    ///
    /// Panics if the captured log output does not contain the expected string.
    pub fn assert_contains(&self, expected: &str) {
        let output = self.output();
        assert!(
            output.contains(expected),
            "log output does not contain '{expected}', got:\n{output}"
        );
    }

    /// Creates a `tracing_subscriber` that writes to this capture buffer.
    /// Use with `set_default()` for thread-local capture.
    #[must_use]
    pub fn subscriber(&self) -> impl tracing::Subscriber {
        tracing_subscriber::registry().with(tracing_subscriber::fmt::layer().with_writer(self.clone()).with_ansi(false))
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogCaptureWriter {
            buffer: Arc::clone(&self.buffer),
        }
    }
}

/// Writer that appends to a [`LogCapture`] buffer.
#[derive(Debug)]
pub struct LogCaptureWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl Write for LogCaptureWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
