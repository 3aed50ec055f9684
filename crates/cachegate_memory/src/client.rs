// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The in-process cache client.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use cachegate_client::{
    BackendOptions, CacheClient, Error, Expiry, FacadeHandle, KeyIter, KeyPattern, Lock, LockOptions, Result, Ttl,
    Version,
};
use parking_lot::Mutex;
use tick::Clock;

use crate::Counter;
use crate::lock::{LockTable, MemoryLock};

/// Option limiting how many entries the client keeps. Unbounded when absent.
pub const MAX_ENTRIES: &str = "MAX_ENTRIES";

/// Option controlling how much of the store is culled when it is full: `1 / CULL_FREQUENCY` of the
/// entries, least recently used first. `0` empties the store.
pub const CULL_FREQUENCY: &str = "CULL_FREQUENCY";

const DEFAULT_CULL_FREQUENCY: u64 = 3;

/// An in-process cache client.
///
/// Keys are stored as `<KEY_PREFIX>:<version>:<key>`, so bumping the version of a cache hides all
/// keys written under the previous version. Expiry is driven by a [`Clock`], which lets tests
/// control the passage of time.
///
/// Values must implement [`Counter`] so that `incr` and `decr` can operate on them.
///
/// # Examples
///
/// ```
/// use cachegate_client::{CacheClient, CacheSettings, Expiry, FacadeHandle};
/// use cachegate_memory::MemoryClient;
///
/// let handle = FacadeHandle::new("default", CacheSettings::default());
/// let client = MemoryClient::<i64>::new(&handle)?;
///
/// client.set("visits", 1, Expiry::Default, None)?;
/// assert_eq!(client.incr("visits", 2, None)?, 3);
/// # Ok::<(), cachegate_client::Error>(())
/// ```
#[derive(Debug)]
pub struct MemoryClient<V> {
    store: Mutex<Store<V>>,
    locks: Arc<Mutex<LockTable>>,
    clock: Clock,
    key_prefix: String,
    version: Version,
    default_timeout: Option<Duration>,
    max_entries: Option<usize>,
    cull_frequency: usize,
    handle: FacadeHandle,
}

#[derive(Debug)]
struct Store<V> {
    entries: HashMap<String, Entry<V>>,
    last_use: u64,
}

#[derive(Debug)]
struct Entry<V> {
    value: V,
    expires_at: Option<SystemTime>,
    last_use: u64,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: SystemTime) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

/// When a written value stops being live.
#[derive(Debug, Clone, Copy)]
enum Deadline {
    Never,
    At(SystemTime),
    Immediately,
}

impl<V> Store<V> {
    fn touch(&mut self) -> u64 {
        self.last_use += 1;
        self.last_use
    }

    /// Returns the entry under `key` if it is live, dropping it if it expired.
    fn live(&mut self, key: &str, now: SystemTime) -> Option<&mut Entry<V>> {
        if self.entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            self.entries.remove(key);
        }
        let stamp = self.touch();
        let entry = self.entries.get_mut(key)?;
        entry.last_use = stamp;
        Some(entry)
    }

    fn purge_expired(&mut self, now: SystemTime) {
        self.entries.retain(|_, entry| !entry.is_expired(now));
    }

    fn write(&mut self, key: String, value: V, expires_at: Option<SystemTime>) {
        let last_use = self.touch();
        self.entries.insert(
            key,
            Entry {
                value,
                expires_at,
                last_use,
            },
        );
    }
}

fn option_u64(options: &BackendOptions, name: &str) -> Result<Option<u64>> {
    options
        .extra(name)
        .map(|value| {
            value
                .as_u64()
                .ok_or_else(|| Error::configuration(format!("option '{name}' must be a non-negative integer, got {value}")))
        })
        .transpose()
}

fn to_usize(name: &str, value: u64) -> Result<usize> {
    usize::try_from(value).map_err(|e| Error::configuration(format!("option '{name}' is too large: {e}")))
}

impl<V> MemoryClient<V> {
    /// Creates a client for the cache behind `handle`, using the system clock.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `MAX_ENTRIES` or `CULL_FREQUENCY` is not a non-negative
    /// integer.
    pub fn new(handle: &FacadeHandle) -> Result<Self> {
        let (clock, _driver) = tick::runtime::InactiveClock::default().activate();
        Self::with_clock(handle, clock)
    }

    /// Creates a client for the cache behind `handle` that reads time from `clock`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `MAX_ENTRIES` or `CULL_FREQUENCY` is not a non-negative
    /// integer.
    pub fn with_clock(handle: &FacadeHandle, clock: Clock) -> Result<Self> {
        let settings = handle.settings();
        let max_entries = option_u64(&settings.options, MAX_ENTRIES)?
            .map(|value| to_usize(MAX_ENTRIES, value))
            .transpose()?;
        let cull_frequency = to_usize(
            CULL_FREQUENCY,
            option_u64(&settings.options, CULL_FREQUENCY)?.unwrap_or(DEFAULT_CULL_FREQUENCY),
        )?;

        Ok(Self {
            store: Mutex::new(Store {
                entries: HashMap::new(),
                last_use: 0,
            }),
            locks: Arc::new(Mutex::new(LockTable::default())),
            clock,
            key_prefix: settings.key_prefix.clone(),
            version: settings.version,
            default_timeout: settings.timeout,
            max_entries,
            cull_frequency,
            handle: handle.clone(),
        })
    }

    /// Returns the handle of the cache this client serves.
    #[must_use]
    pub fn handle(&self) -> &FacadeHandle {
        &self.handle
    }

    /// Returns how many entries are stored, including ones that expired but were not yet dropped.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.lock().entries.len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn namespace(&self, version: Option<Version>) -> String {
        format!("{}:{}:", self.key_prefix, version.unwrap_or(self.version))
    }

    fn make_key(&self, key: &str, version: Option<Version>) -> String {
        let mut full = self.namespace(version);
        full.push_str(key);
        full
    }

    fn deadline(&self, expiry: Expiry, now: SystemTime) -> Deadline {
        let timeout = match expiry {
            Expiry::Default => self.default_timeout,
            Expiry::Never => None,
            Expiry::After(timeout) => Some(timeout),
        };
        match timeout {
            None => Deadline::Never,
            Some(timeout) if timeout.is_zero() => Deadline::Immediately,
            Some(timeout) => now.checked_add(timeout).map_or(Deadline::Never, Deadline::At),
        }
    }

    /// Makes room for one more entry if the store is full.
    fn cull(&self, store: &mut Store<V>, now: SystemTime) {
        let Some(max_entries) = self.max_entries else {
            return;
        };
        if store.entries.len() < max_entries {
            return;
        }

        store.purge_expired(now);
        if store.entries.len() < max_entries {
            return;
        }

        if self.cull_frequency == 0 {
            store.entries.clear();
            return;
        }

        let mut by_use: Vec<(u64, String)> = store
            .entries
            .iter()
            .map(|(key, entry)| (entry.last_use, key.clone()))
            .collect();
        by_use.sort_unstable();
        let count = (by_use.len() / self.cull_frequency).max(1);
        for (_, key) in by_use.into_iter().take(count) {
            store.entries.remove(&key);
        }
    }

    fn store_value(&self, store: &mut Store<V>, key: String, value: V, deadline: Deadline, now: SystemTime) {
        match deadline {
            Deadline::Immediately => {
                store.entries.remove(&key);
            }
            Deadline::Never | Deadline::At(_) => {
                if !store.entries.contains_key(&key) {
                    self.cull(store, now);
                }
                let expires_at = match deadline {
                    Deadline::At(at) => Some(at),
                    Deadline::Never | Deadline::Immediately => None,
                };
                store.write(key, value, expires_at);
            }
        }
    }

    /// Caller-facing keys in `version` that match `pattern`, sorted.
    fn matching_keys(&self, pattern: &str, version: Option<Version>) -> Result<Vec<String>> {
        let pattern = KeyPattern::new(pattern)?;
        let namespace = self.namespace(version);
        let now = self.clock.system_time();
        let mut store = self.store.lock();
        store.purge_expired(now);
        let mut keys: Vec<String> = store
            .entries
            .keys()
            .filter_map(|full| full.strip_prefix(namespace.as_str()))
            .filter(|key| pattern.matches(key))
            .map(ToString::to_string)
            .collect();
        keys.sort();
        Ok(keys)
    }
}

impl<V> CacheClient<V> for MemoryClient<V>
where
    V: Counter + Clone + Send + Sync + 'static,
{
    fn add(&self, key: &str, value: V, expiry: Expiry, version: Option<Version>) -> Result<bool> {
        let full = self.make_key(key, version);
        let now = self.clock.system_time();
        let mut store = self.store.lock();
        if store.live(&full, now).is_some() {
            return Ok(false);
        }
        let deadline = self.deadline(expiry, now);
        self.store_value(&mut store, full, value, deadline, now);
        Ok(true)
    }

    fn set(&self, key: &str, value: V, expiry: Expiry, version: Option<Version>) -> Result<bool> {
        let full = self.make_key(key, version);
        let now = self.clock.system_time();
        let deadline = self.deadline(expiry, now);
        self.store_value(&mut self.store.lock(), full, value, deadline, now);
        Ok(true)
    }

    fn set_many(&self, entries: HashMap<String, V>, expiry: Expiry, version: Option<Version>) -> Result<()> {
        let now = self.clock.system_time();
        let deadline = self.deadline(expiry, now);
        let mut store = self.store.lock();
        for (key, value) in entries {
            self.store_value(&mut store, self.make_key(&key, version), value, deadline, now);
        }
        Ok(())
    }

    fn get(&self, key: &str, version: Option<Version>) -> Result<Option<V>> {
        let full = self.make_key(key, version);
        let now = self.clock.system_time();
        Ok(self.store.lock().live(&full, now).map(|entry| entry.value.clone()))
    }

    fn get_many(&self, keys: &[&str], version: Option<Version>) -> Result<HashMap<String, V>> {
        let now = self.clock.system_time();
        let mut store = self.store.lock();
        Ok(keys
            .iter()
            .filter_map(|key| {
                store
                    .live(&self.make_key(key, version), now)
                    .map(|entry| ((*key).to_string(), entry.value.clone()))
            })
            .collect())
    }

    fn delete(&self, key: &str, version: Option<Version>) -> Result<bool> {
        let full = self.make_key(key, version);
        let now = self.clock.system_time();
        let mut store = self.store.lock();
        let was_live = store.live(&full, now).is_some();
        store.entries.remove(&full);
        Ok(was_live)
    }

    fn delete_pattern(&self, pattern: &str, version: Option<Version>) -> Result<u64> {
        let keys = self.matching_keys(pattern, version)?;
        let mut store = self.store.lock();
        let removed = keys
            .iter()
            .filter(|key| store.entries.remove(&self.make_key(key, version)).is_some())
            .count();
        Ok(removed as u64)
    }

    fn delete_many(&self, keys: &[&str], version: Option<Version>) -> Result<u64> {
        let mut removed = 0;
        for key in keys {
            if self.delete(key, version)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn clear(&self) -> Result<()> {
        self.store.lock().entries.clear();
        Ok(())
    }

    fn keys(&self, pattern: &str, version: Option<Version>) -> Result<Vec<String>> {
        self.matching_keys(pattern, version)
    }

    fn iter_keys(&self, pattern: &str, version: Option<Version>) -> Result<KeyIter> {
        self.matching_keys(pattern, version).map(KeyIter::from_keys)
    }

    fn has_key(&self, key: &str, version: Option<Version>) -> Result<bool> {
        let full = self.make_key(key, version);
        let now = self.clock.system_time();
        Ok(self.store.lock().live(&full, now).is_some())
    }

    fn lock(&self, key: &str, options: LockOptions) -> Result<Lock> {
        Ok(Lock::new(MemoryLock::new(
            format!("{}:lock:{key}", self.key_prefix),
            Arc::clone(&self.locks),
            self.clock.clone(),
            options,
        )))
    }

    fn incr(&self, key: &str, delta: i64, version: Option<Version>) -> Result<i64> {
        let full = self.make_key(key, version);
        let now = self.clock.system_time();
        let mut store = self.store.lock();
        let entry = store
            .live(&full, now)
            .ok_or_else(|| Error::invalid_usage(format!("key '{key}' not found")))?;

        let current = entry
            .value
            .to_counter()
            .ok_or_else(|| Error::invalid_usage(format!("value of key '{key}' is not an integer")))?;
        let updated = current
            .checked_add(delta)
            .ok_or_else(|| Error::invalid_usage(format!("incrementing key '{key}' by {delta} overflows")))?;
        entry.value = V::from_counter(updated)
            .ok_or_else(|| Error::invalid_usage(format!("value {updated} does not fit the type stored under key '{key}'")))?;
        Ok(updated)
    }

    fn incr_version(&self, key: &str, delta: i32, version: Option<Version>) -> Result<Version> {
        let current = version.unwrap_or(self.version);
        let updated = current
            .checked_add_signed(delta)
            .ok_or_else(|| Error::invalid_usage(format!("version {current} cannot be moved by {delta}")))?;

        let old_key = self.make_key(key, Some(current));
        let new_key = self.make_key(key, Some(updated));
        let now = self.clock.system_time();
        let mut store = self.store.lock();
        let (value, expires_at) = store
            .live(&old_key, now)
            .map(|entry| (entry.value.clone(), entry.expires_at))
            .ok_or_else(|| Error::invalid_usage(format!("key '{key}' not found")))?;

        store.write(new_key, value, expires_at);
        if updated != current {
            store.entries.remove(&old_key);
        }
        Ok(updated)
    }

    fn ttl(&self, key: &str, version: Option<Version>) -> Result<Ttl> {
        let full = self.make_key(key, version);
        let now = self.clock.system_time();
        Ok(match self.store.lock().live(&full, now) {
            None => Ttl::Missing,
            Some(Entry { expires_at: None, .. }) => Ttl::Persistent,
            Some(Entry {
                expires_at: Some(expires_at),
                ..
            }) => Ttl::Expires(expires_at.duration_since(now).unwrap_or_default()),
        })
    }

    fn persist(&self, key: &str, version: Option<Version>) -> Result<bool> {
        let full = self.make_key(key, version);
        let now = self.clock.system_time();
        let mut store = self.store.lock();
        let Some(entry) = store.live(&full, now) else {
            return Ok(false);
        };
        entry.expires_at = None;
        Ok(true)
    }

    fn expire(&self, key: &str, timeout: Duration, version: Option<Version>) -> Result<bool> {
        let full = self.make_key(key, version);
        let now = self.clock.system_time();
        let deadline = self.deadline(Expiry::After(timeout), now);
        let mut store = self.store.lock();
        let Some(entry) = store.live(&full, now) else {
            return Ok(false);
        };

        match deadline {
            Deadline::Immediately => {
                store.entries.remove(&full);
            }
            Deadline::At(at) => entry.expires_at = Some(at),
            Deadline::Never => entry.expires_at = None,
        }
        Ok(true)
    }
}
