// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use cachegate_client::{Error, RawConnection, Result};

use crate::{CacheFacade, CachesConfig, ClientRegistry, DEFAULT_ALIAS, GlobalDefaults};

/// The configured caches of a process, looked up by alias.
///
/// Every facade is created up front, which resolves its client factory; the clients themselves
/// are still created lazily on first use.
///
/// # Examples
///
/// ```
/// use cachegate::{Caches, CachesConfig, ClientRegistry, Expiry, GlobalDefaults};
///
/// let config = CachesConfig::from_json(r#"{"default": {}, "sessions": {"KEY_PREFIX": "s"}}"#)?;
/// let caches = Caches::<i64>::new(config, &ClientRegistry::default(), &GlobalDefaults::default())?;
///
/// let sessions = caches.get("sessions")?;
/// sessions.set("active", 3, Expiry::Default, None)?;
/// assert_eq!(sessions.incr("active", 1, None)?, Some(4));
///
/// assert!(caches.get("unknown").is_err());
/// # Ok::<(), cachegate::Error>(())
/// ```
pub struct Caches<V> {
    facades: BTreeMap<String, Arc<CacheFacade<V>>>,
}

impl<V> Debug for Caches<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.facades.iter()).finish()
    }
}

impl<V> Caches<V> {
    /// Creates a facade for every cache in `config`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a cache names a client `registry` does not know.
    pub fn new(config: CachesConfig, registry: &ClientRegistry<V>, defaults: &GlobalDefaults) -> Result<Self> {
        let facades = config
            .into_iter()
            .map(|(alias, settings)| {
                let facade = CacheFacade::new(alias.clone(), settings, registry, defaults)?;
                Ok((alias, Arc::new(facade)))
            })
            .collect::<Result<_>>()?;
        Ok(Self { facades })
    }

    /// Returns the cache registered under `alias`.
    ///
    /// # Errors
    ///
    /// Returns an invalid-usage error if no cache is configured under `alias`.
    pub fn get(&self, alias: &str) -> Result<Arc<CacheFacade<V>>> {
        self.facades
            .get(alias)
            .map(Arc::clone)
            .ok_or_else(|| Error::invalid_usage(format!("no cache is configured under alias '{alias}'")))
    }

    /// Returns the cache registered under [`DEFAULT_ALIAS`].
    ///
    /// # Errors
    ///
    /// Returns an invalid-usage error if there is no default cache.
    pub fn default_cache(&self) -> Result<Arc<CacheFacade<V>>> {
        self.get(DEFAULT_ALIAS)
    }

    /// Returns the configured aliases in sorted order.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.facades.keys().map(String::as_str)
    }

    /// Returns the connection underlying the client of the cache `alias`.
    ///
    /// This bypasses the facade, including its failure absorption.
    ///
    /// # Errors
    ///
    /// Returns an invalid-usage error for an unknown alias, and the errors of
    /// [`CacheFacade::raw_connection`].
    pub fn raw_connection(&self, alias: &str, write: bool) -> Result<RawConnection> {
        self.get(alias)?.raw_connection(write)
    }

    /// Returns the connection underlying the client of the cache `alias` as a concrete type `R`.
    ///
    /// # Errors
    ///
    /// Returns an invalid-usage error for an unknown alias, and the errors of
    /// [`CacheFacade::raw_connection_as`].
    pub fn raw_connection_as<R>(&self, alias: &str, write: bool) -> Result<Arc<R>>
    where
        R: Any + Send + Sync,
    {
        self.get(alias)?.raw_connection_as(write)
    }
}
