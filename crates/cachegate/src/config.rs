// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Process-wide defaults and the alias map.

use std::collections::BTreeMap;

use cachegate_client::{CacheSettings, Error, Result};
use serde::Deserialize;

/// The logger identity used when none is configured.
pub const DEFAULT_LOGGER: &str = "cachegate";

/// The alias of the cache most applications use.
pub const DEFAULT_ALIAS: &str = "default";

/// Defaults applied to every cache whose options leave a value unset.
///
/// Resolved once at startup and passed to the facades; nothing reads them from ambient state.
///
/// # Examples
///
/// ```
/// use cachegate::GlobalDefaults;
///
/// let defaults: GlobalDefaults = serde_json::from_str(r#"{"ignore_exceptions": true}"#)?;
/// assert!(defaults.ignore_exceptions);
/// assert!(!defaults.log_ignored_exceptions);
/// assert_eq!(defaults.logger, "cachegate");
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GlobalDefaults {
    /// Absorb connectivity failures unless a cache says otherwise.
    pub ignore_exceptions: bool,

    /// Log absorbed failures unless a cache says otherwise.
    pub log_ignored_exceptions: bool,

    /// Logger identity attached to absorbed-failure events.
    pub logger: String,
}

impl Default for GlobalDefaults {
    fn default() -> Self {
        Self {
            ignore_exceptions: false,
            log_ignored_exceptions: false,
            logger: DEFAULT_LOGGER.to_string(),
        }
    }
}

/// Settings of every configured cache, keyed by alias.
///
/// Deserializes from a JSON object mapping aliases to [`CacheSettings`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct CachesConfig(BTreeMap<String, CacheSettings>);

impl CachesConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from JSON.
    ///
    /// # Examples
    ///
    /// ```
    /// use cachegate::CachesConfig;
    ///
    /// let config = CachesConfig::from_json(
    ///     r#"{
    ///         "default": { "LOCATION": "10.0.0.1:7000" },
    ///         "sessions": { "LOCATION": "10.0.0.2:7000", "OPTIONS": { "IGNORE_EXCEPTIONS": true } }
    ///     }"#,
    /// )?;
    ///
    /// assert_eq!(config.aliases().collect::<Vec<_>>(), ["default", "sessions"]);
    /// # Ok::<(), cachegate::Error>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `json` is not a valid configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::configuration(format!("invalid cache configuration: {e}")))
    }

    /// Adds or replaces the settings of `alias`.
    #[must_use]
    pub fn with(mut self, alias: impl Into<String>, settings: CacheSettings) -> Self {
        self.0.insert(alias.into(), settings);
        self
    }

    /// Returns the settings of `alias`.
    #[must_use]
    pub fn get(&self, alias: &str) -> Option<&CacheSettings> {
        self.0.get(alias)
    }

    /// Returns the configured aliases in sorted order.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Returns `true` if no cache is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl IntoIterator for CachesConfig {
    type Item = (String, CacheSettings);
    type IntoIter = std::collections::btree_map::IntoIter<String, CacheSettings>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
