// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::any::Any;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use cachegate_client::{
    CacheClient, CacheSettings, Error, Expiry, FacadeHandle, KeyIter, Lock, LockOptions, RawConnection, Result, Ttl,
    Version,
};
use once_cell::sync::OnceCell;

use crate::{AbsorptionPolicy, ClientFactory, ClientRegistry, GlobalDefaults, Operation};

/// The cache object applications use.
///
/// A facade owns at most one client. The client is created on the first operation, from the factory
/// selected by the cache's `CLIENT_CLASS` option, and reused for the life of the facade. Concurrent
/// first operations create exactly one client.
///
/// Every operation is forwarded to the client unchanged. When the cache is configured to ignore
/// failures, a connectivity failure is replaced by the fallback value of the operation:
///
/// | Operation | Fallback |
/// |---|---|
/// | `get` | the caller's `default` |
/// | `get_many` | an empty map |
/// | `keys`, `iter_keys` | no keys |
/// | `lock`, `incr`, `decr`, `incr_version`, `ttl` | `None` |
/// | `add`, `set`, `delete`, `has_key`, `persist`, `expire` | `false` |
/// | `delete_pattern`, `delete_many` | `0` |
/// | `set_many`, `clear` | `()` |
///
/// Failures while creating the client are never absorbed.
///
/// # Examples
///
/// ```
/// use cachegate::{CacheFacade, CacheSettings, ClientRegistry, Expiry, GlobalDefaults};
///
/// let cache = CacheFacade::<String>::new(
///     "default",
///     CacheSettings::default(),
///     &ClientRegistry::default(),
///     &GlobalDefaults::default(),
/// )?;
///
/// assert!(!cache.is_connected());
/// cache.set("greeting", "hello".to_string(), Expiry::Default, None)?;
/// assert!(cache.is_connected());
///
/// assert_eq!(cache.get("greeting", None, None)?.as_deref(), Some("hello"));
/// assert_eq!(cache.get("missing", Some("fallback".to_string()), None)?.as_deref(), Some("fallback"));
/// # Ok::<(), cachegate::Error>(())
/// ```
pub struct CacheFacade<V> {
    handle: FacadeHandle,
    factory: ClientFactory<V>,
    client: OnceCell<Box<dyn CacheClient<V>>>,
    policy: AbsorptionPolicy,
}

impl<V> Debug for CacheFacade<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheFacade")
            .field("alias", &self.handle.alias())
            .field("client", &self.handle.options().client)
            .field("connected", &self.is_connected())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<V> CacheFacade<V> {
    /// Creates the facade of the cache `alias`, selecting its client factory from `registry`.
    ///
    /// The client itself is not created until the first operation.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `registry` has no factory under the `CLIENT_CLASS` option.
    pub fn new(
        alias: impl Into<String>,
        settings: CacheSettings,
        registry: &ClientRegistry<V>,
        defaults: &GlobalDefaults,
    ) -> Result<Self> {
        let factory = registry.resolve(&settings.options.client)?;
        Ok(Self::from_factory(alias, settings, factory, defaults))
    }

    /// Creates the facade of the cache `alias` with an explicit client factory, ignoring the
    /// `CLIENT_CLASS` option.
    pub fn with_factory<F>(
        alias: impl Into<String>,
        settings: CacheSettings,
        factory: F,
        defaults: &GlobalDefaults,
    ) -> Self
    where
        F: Fn(FacadeHandle) -> Result<Box<dyn CacheClient<V>>> + Send + Sync + 'static,
    {
        Self::from_factory(alias, settings, Arc::new(factory), defaults)
    }

    fn from_factory(
        alias: impl Into<String>,
        settings: CacheSettings,
        factory: ClientFactory<V>,
        defaults: &GlobalDefaults,
    ) -> Self {
        let handle = FacadeHandle::new(alias, settings);
        let policy = AbsorptionPolicy::from_options(handle.alias(), handle.options(), defaults);
        Self {
            handle,
            factory,
            client: OnceCell::new(),
            policy,
        }
    }

    /// Returns the alias of this cache.
    #[must_use]
    pub fn alias(&self) -> &str {
        self.handle.alias()
    }

    /// Returns the settings of this cache.
    #[must_use]
    pub fn settings(&self) -> &CacheSettings {
        self.handle.settings()
    }

    /// Returns the handle passed to this cache's client.
    #[must_use]
    pub fn handle(&self) -> &FacadeHandle {
        &self.handle
    }

    /// Returns the failure absorption policy of this cache.
    #[must_use]
    pub fn policy(&self) -> &AbsorptionPolicy {
        &self.policy
    }

    /// Returns `true` once the client has been created.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.client.get().is_some()
    }

    /// Returns the client, creating it on first use.
    ///
    /// If creation fails, the error is returned and the next call tries again.
    ///
    /// # Errors
    ///
    /// Returns whatever error the client factory returns.
    pub fn client(&self) -> Result<&dyn CacheClient<V>> {
        self.client
            .get_or_try_init(|| match (self.factory)(self.handle.clone()) {
                Ok(client) => {
                    tracing::debug!(
                        cache.name = self.handle.alias(),
                        cache.client = self.handle.options().client.as_str(),
                        "cache.client_created"
                    );
                    Ok(client)
                }
                Err(error) => {
                    tracing::warn!(
                        cache.name = self.handle.alias(),
                        cache.client = self.handle.options().client.as_str(),
                        error = %error,
                        "cache.client_failed"
                    );
                    Err(error)
                }
            })
            .map(|client| &**client)
    }

    /// Stores `value` under `key` if the key holds no value. Returns `true` if it was stored.
    ///
    /// # Errors
    ///
    /// Returns client creation failures and unabsorbed client failures.
    pub fn add(&self, key: &str, value: V, expiry: impl Into<Expiry>, version: Option<Version>) -> Result<bool> {
        let client = self.client()?;
        self.policy
            .run(Operation::Add, false, || client.add(key, value, expiry.into(), version))
    }

    /// Stores `value` under `key`. Returns `true` if it was stored.
    ///
    /// # Errors
    ///
    /// Returns client creation failures and unabsorbed client failures.
    pub fn set(&self, key: &str, value: V, expiry: impl Into<Expiry>, version: Option<Version>) -> Result<bool> {
        let client = self.client()?;
        self.policy
            .run(Operation::Set, false, || client.set(key, value, expiry.into(), version))
    }

    /// Stores every entry of `entries`.
    ///
    /// # Errors
    ///
    /// Returns client creation failures and unabsorbed client failures.
    pub fn set_many(
        &self,
        entries: HashMap<String, V>,
        expiry: impl Into<Expiry>,
        version: Option<Version>,
    ) -> Result<()> {
        let client = self.client()?;
        self.policy
            .run(Operation::SetMany, (), || client.set_many(entries, expiry.into(), version))
    }

    /// Fetches the value under `key`, or `default` if the key holds none.
    ///
    /// When a connectivity failure is absorbed, `default` is returned as well.
    ///
    /// # Errors
    ///
    /// Returns client creation failures and unabsorbed client failures.
    pub fn get(&self, key: &str, default: Option<V>, version: Option<Version>) -> Result<Option<V>> {
        let client = self.client()?;
        match client.get(key, version) {
            Ok(found) => Ok(found.or(default)),
            Err(error) => self.policy.recover(Operation::Get, error, default),
        }
    }

    /// Fetches the values under `keys`. Keys without a value are absent from the result.
    ///
    /// # Errors
    ///
    /// Returns client creation failures and unabsorbed client failures.
    pub fn get_many(&self, keys: &[&str], version: Option<Version>) -> Result<HashMap<String, V>> {
        let client = self.client()?;
        self.policy
            .run(Operation::GetMany, HashMap::new(), || client.get_many(keys, version))
    }

    /// Removes `key`. Returns `true` if it held a value.
    ///
    /// # Errors
    ///
    /// Returns client creation failures and unabsorbed client failures.
    pub fn delete(&self, key: &str, version: Option<Version>) -> Result<bool> {
        let client = self.client()?;
        self.policy.run(Operation::Delete, false, || client.delete(key, version))
    }

    /// Removes every key matching `pattern`. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns client creation failures and unabsorbed client failures.
    pub fn delete_pattern(&self, pattern: &str, version: Option<Version>) -> Result<u64> {
        let client = self.client()?;
        self.policy
            .run(Operation::DeletePattern, 0, || client.delete_pattern(pattern, version))
    }

    /// Removes `keys`. Returns how many held a value.
    ///
    /// # Errors
    ///
    /// Returns client creation failures and unabsorbed client failures.
    pub fn delete_many(&self, keys: &[&str], version: Option<Version>) -> Result<u64> {
        let client = self.client()?;
        self.policy
            .run(Operation::DeleteMany, 0, || client.delete_many(keys, version))
    }

    /// Removes everything from the cache.
    ///
    /// # Errors
    ///
    /// Returns client creation failures and unabsorbed client failures.
    pub fn clear(&self) -> Result<()> {
        let client = self.client()?;
        self.policy.run(Operation::Clear, (), || client.clear())
    }

    /// Lists the keys matching `pattern`.
    ///
    /// # Errors
    ///
    /// Returns client creation failures and unabsorbed client failures.
    pub fn keys(&self, pattern: &str, version: Option<Version>) -> Result<Vec<String>> {
        let client = self.client()?;
        self.policy
            .run(Operation::Keys, Vec::new(), || client.keys(pattern, version))
    }

    /// Lazily lists the keys matching `pattern`.
    ///
    /// The absorption policy also covers failures while iterating: an absorbed failure ends the
    /// sequence, any other failure is yielded as an item.
    ///
    /// # Errors
    ///
    /// Returns client creation failures and unabsorbed client failures.
    pub fn iter_keys(&self, pattern: &str, version: Option<Version>) -> Result<KeyIter> {
        let client = self.client()?;
        let keys = self
            .policy
            .run(Operation::IterKeys, KeyIter::empty(), || client.iter_keys(pattern, version))?;
        Ok(KeyIter::new(AbsorbingKeys {
            inner: keys,
            policy: self.policy.clone(),
            finished: false,
        }))
    }

    /// Returns `true` if `key` holds a value.
    ///
    /// # Errors
    ///
    /// Returns client creation failures and unabsorbed client failures.
    pub fn has_key(&self, key: &str, version: Option<Version>) -> Result<bool> {
        let client = self.client()?;
        self.policy.run(Operation::HasKey, false, || client.has_key(key, version))
    }

    /// Returns the lock named `key`, not yet acquired.
    ///
    /// # Errors
    ///
    /// Returns client creation failures and unabsorbed client failures.
    pub fn lock(&self, key: &str, options: LockOptions) -> Result<Option<Lock>> {
        let client = self.client()?;
        self.policy
            .run(Operation::Lock, None, || client.lock(key, options).map(Some))
    }

    /// Adds `delta` to the integer under `key` and returns the new value.
    ///
    /// # Errors
    ///
    /// Returns client creation failures and unabsorbed client failures.
    pub fn incr(&self, key: &str, delta: i64, version: Option<Version>) -> Result<Option<i64>> {
        let client = self.client()?;
        self.policy
            .run(Operation::Incr, None, || client.incr(key, delta, version).map(Some))
    }

    /// Subtracts `delta` from the integer under `key` and returns the new value.
    ///
    /// # Errors
    ///
    /// Returns client creation failures and unabsorbed client failures.
    pub fn decr(&self, key: &str, delta: i64, version: Option<Version>) -> Result<Option<i64>> {
        let client = self.client()?;
        self.policy
            .run(Operation::Decr, None, || client.decr(key, delta, version).map(Some))
    }

    /// Moves the value of `key` to version `version + delta` and returns the new version.
    ///
    /// # Errors
    ///
    /// Returns client creation failures and unabsorbed client failures.
    pub fn incr_version(&self, key: &str, delta: i32, version: Option<Version>) -> Result<Option<Version>> {
        let client = self.client()?;
        self.policy.run(Operation::IncrVersion, None, || {
            client.incr_version(key, delta, version).map(Some)
        })
    }

    /// Reports how long `key` has left to live.
    ///
    /// # Errors
    ///
    /// Returns client creation failures and unabsorbed client failures.
    pub fn ttl(&self, key: &str, version: Option<Version>) -> Result<Option<Ttl>> {
        let client = self.client()?;
        self.policy
            .run(Operation::Ttl, None, || client.ttl(key, version).map(Some))
    }

    /// Removes the expiry of `key`. Returns `true` if the key exists.
    ///
    /// # Errors
    ///
    /// Returns client creation failures and unabsorbed client failures.
    pub fn persist(&self, key: &str, version: Option<Version>) -> Result<bool> {
        let client = self.client()?;
        self.policy.run(Operation::Persist, false, || client.persist(key, version))
    }

    /// Makes `key` expire after `timeout`. Returns `true` if the key exists.
    ///
    /// # Errors
    ///
    /// Returns client creation failures and unabsorbed client failures.
    pub fn expire(&self, key: &str, timeout: Duration, version: Option<Version>) -> Result<bool> {
        let client = self.client()?;
        self.policy
            .run(Operation::Expire, false, || client.expire(key, timeout, version))
    }

    /// Returns the connection underlying the client, bypassing the facade and its failure
    /// absorption.
    ///
    /// # Errors
    ///
    /// Returns an [`Unsupported`](cachegate_client::ErrorKind::Unsupported) error naming
    /// `raw_connection` if the client has no raw connection, client creation failures, and
    /// failures of the client to provide the connection.
    pub fn raw_connection(&self, write: bool) -> Result<RawConnection> {
        let client = self.client()?;
        let provider = client
            .raw_connection_provider()
            .ok_or_else(|| Error::unsupported("raw_connection"))?;
        provider.raw_connection(write)
    }

    /// Returns the connection underlying the client as a concrete type `R`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`raw_connection`](Self::raw_connection), and an invalid-usage error if
    /// the connection is not an `R`.
    pub fn raw_connection_as<R>(&self, write: bool) -> Result<Arc<R>>
    where
        R: Any + Send + Sync,
    {
        self.raw_connection(write)?.downcast::<R>().map_err(|_connection| {
            Error::invalid_usage(format!(
                "the raw connection of cache '{}' is not a {}",
                self.alias(),
                std::any::type_name::<R>()
            ))
        })
    }
}

/// Applies the absorption policy to the items of a key sequence.
struct AbsorbingKeys {
    inner: KeyIter,
    policy: AbsorptionPolicy,
    finished: bool,
}

impl Iterator for AbsorbingKeys {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.inner.next()? {
            Ok(key) => Some(Ok(key)),
            Err(error) => match self.policy.recover(Operation::IterKeys, error, ()) {
                Ok(()) => {
                    self.finished = true;
                    None
                }
                Err(error) => Some(Err(error)),
            },
        }
    }
}
