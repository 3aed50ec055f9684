// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Client selection by name.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use cachegate_client::{CacheClient, Error, FacadeHandle, Result};

/// Creates the client of a facade.
///
/// Receives the handle of the facade the client will serve. Errors returned by a factory reach the
/// caller of the operation that triggered construction and are never absorbed.
pub type ClientFactory<V> = Arc<dyn Fn(FacadeHandle) -> Result<Box<dyn CacheClient<V>>> + Send + Sync>;

/// Client factories keyed by the name used in `CLIENT_CLASS`.
///
/// A facade looks up its factory once, when it is constructed.
///
/// # Examples
///
/// ```
/// use cachegate::{CacheClient, ClientRegistry, MemoryClient};
///
/// let registry = ClientRegistry::<String>::new().with("local", |handle| {
///     let client: Box<dyn CacheClient<String>> = Box::new(MemoryClient::new(&handle)?);
///     Ok(client)
/// });
///
/// assert!(registry.contains("local"));
/// assert!(registry.resolve("cluster").is_err());
/// ```
pub struct ClientRegistry<V> {
    factories: HashMap<String, ClientFactory<V>>,
}

impl<V> ClientRegistry<V> {
    /// Creates a registry without any factory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registers `factory` under `name`, replacing any factory registered under it before.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(FacadeHandle) -> Result<Box<dyn CacheClient<V>>> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Registers `factory` under `name` and returns the registry.
    #[must_use]
    pub fn with<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(FacadeHandle) -> Result<Box<dyn CacheClient<V>>> + Send + Sync + 'static,
    {
        self.register(name, factory);
        self
    }

    /// Returns `true` if a factory is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Returns the registered names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the factory registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if nothing is registered under `name`.
    pub fn resolve(&self, name: &str) -> Result<ClientFactory<V>> {
        self.factories.get(name).map(Arc::clone).ok_or_else(|| {
            Error::configuration(format!(
                "unknown cache client '{name}', registered clients: [{}]",
                self.names().join(", ")
            ))
        })
    }
}

impl<V> Clone for ClientRegistry<V> {
    fn clone(&self) -> Self {
        Self {
            factories: self.factories.clone(),
        }
    }
}

impl<V> Debug for ClientRegistry<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRegistry").field("names", &self.names()).finish()
    }
}

#[cfg(feature = "memory")]
impl<V> Default for ClientRegistry<V>
where
    V: cachegate_memory::Counter + Clone + Send + Sync + 'static,
{
    /// Creates a registry with the in-process client registered under
    /// [`DEFAULT_CLIENT`](cachegate_client::DEFAULT_CLIENT).
    fn default() -> Self {
        Self::new().with(cachegate_client::DEFAULT_CLIENT, memory_client::<V>)
    }
}

#[cfg(feature = "memory")]
fn memory_client<V>(handle: FacadeHandle) -> Result<Box<dyn CacheClient<V>>>
where
    V: cachegate_memory::Counter + Clone + Send + Sync + 'static,
{
    let client: Box<dyn CacheClient<V>> = Box::new(cachegate_memory::MemoryClient::new(&handle)?);
    Ok(client)
}
