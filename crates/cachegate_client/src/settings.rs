// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Per-cache settings, shared between a facade and the client it creates.
//!
//! The field names follow the conventional cache settings layout, so a settings map reads the
//! same whether it is written in JSON or built in code:
//!
//! ```
//! use cachegate_client::CacheSettings;
//!
//! let settings: CacheSettings = serde_json::from_str(
//!     r#"{
//!         "LOCATION": "redis://10.0.0.1:7000,redis://10.0.0.2:7000",
//!         "TIMEOUT": 60,
//!         "KEY_PREFIX": "shop",
//!         "OPTIONS": { "CLIENT_CLASS": "memory", "IGNORE_EXCEPTIONS": true }
//!     }"#,
//! )?;
//!
//! assert_eq!(settings.location.addresses().len(), 2);
//! assert_eq!(settings.options.ignore_exceptions, Some(true));
//! # Ok::<(), serde_json::Error>(())
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::Version;

/// The client selected when a cache does not name one.
pub const DEFAULT_CLIENT: &str = "memory";

/// The default expiry applied when a write asks for [`Expiry::Default`](crate::Expiry::Default).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Opaque connection descriptor for a cluster: the addresses (and any credentials embedded in
/// them) a client connects to.
///
/// Deserializes from either a single comma-separated string or a list of strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "LocationRepr")]
pub struct ServerSpec(Vec<String>);

#[derive(Deserialize)]
#[serde(untagged)]
enum LocationRepr {
    One(String),
    Many(Vec<String>),
}

impl From<LocationRepr> for ServerSpec {
    fn from(repr: LocationRepr) -> Self {
        match repr {
            LocationRepr::One(location) => Self::parse(&location),
            LocationRepr::Many(addresses) => Self::new(addresses),
        }
    }
}

impl ServerSpec {
    /// Creates a spec from individual addresses.
    pub fn new<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(addresses.into_iter().map(Into::into).collect())
    }

    /// Parses a comma-separated list of addresses, ignoring surrounding whitespace and empty entries.
    ///
    /// # Examples
    ///
    /// ```
    /// use cachegate_client::ServerSpec;
    ///
    /// let spec = ServerSpec::parse("10.0.0.1:7000, 10.0.0.2:7000,");
    /// assert_eq!(spec.addresses(), ["10.0.0.1:7000", "10.0.0.2:7000"]);
    /// ```
    #[must_use]
    pub fn parse(location: &str) -> Self {
        Self::new(location.split(',').map(str::trim).filter(|address| !address.is_empty()))
    }

    /// Returns the configured addresses.
    #[must_use]
    pub fn addresses(&self) -> &[String] {
        &self.0
    }

    /// Returns `true` if no address is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for ServerSpec {
    fn from(location: &str) -> Self {
        Self::parse(location)
    }
}

/// Backend options of a single cache (the `OPTIONS` map).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BackendOptions {
    /// Name of the client implementation to construct.
    #[serde(rename = "CLIENT_CLASS", default = "default_client")]
    pub client: String,

    /// Absorb connectivity failures. Falls back to the process-wide default when unset.
    #[serde(rename = "IGNORE_EXCEPTIONS", default)]
    pub ignore_exceptions: Option<bool>,

    /// Log absorbed failures. Falls back to the process-wide default when unset.
    #[serde(rename = "LOG_IGNORED_EXCEPTIONS", default)]
    pub log_ignored_exceptions: Option<bool>,

    /// Any other options, kept verbatim for the client.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn default_client() -> String {
    DEFAULT_CLIENT.to_string()
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            client: default_client(),
            ignore_exceptions: None,
            log_ignored_exceptions: None,
            extra: BTreeMap::new(),
        }
    }
}

impl BackendOptions {
    /// Returns the raw value of a client-specific option.
    #[must_use]
    pub fn extra(&self, name: &str) -> Option<&serde_json::Value> {
        self.extra.get(name)
    }
}

/// Settings of one named cache.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CacheSettings {
    /// Where the cluster lives.
    #[serde(rename = "LOCATION", default)]
    pub location: ServerSpec,

    /// Expiry used for [`Expiry::Default`](crate::Expiry::Default) writes; `None` keeps values forever.
    #[serde(rename = "TIMEOUT", default = "default_timeout", deserialize_with = "deserialize_timeout")]
    pub timeout: Option<Duration>,

    /// Prefix prepended to every key this cache writes.
    #[serde(rename = "KEY_PREFIX", default)]
    pub key_prefix: String,

    /// Version used when an operation does not name one.
    #[serde(rename = "VERSION", default = "default_version")]
    pub version: Version,

    /// Backend options.
    #[serde(rename = "OPTIONS", default)]
    pub options: BackendOptions,
}

fn default_timeout() -> Option<Duration> {
    Some(DEFAULT_TIMEOUT)
}

fn default_version() -> Version {
    1
}

fn deserialize_timeout<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let seconds = Option::<f64>::deserialize(deserializer)?;
    seconds
        .map(|seconds| Duration::try_from_secs_f64(seconds).map_err(serde::de::Error::custom))
        .transpose()
}

impl CacheSettings {
    /// Creates settings for a cache at `location` with every other value defaulted.
    pub fn new(location: impl Into<ServerSpec>) -> Self {
        Self {
            location: location.into(),
            ..Self::default()
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            location: ServerSpec::default(),
            timeout: default_timeout(),
            key_prefix: String::new(),
            version: default_version(),
            options: BackendOptions::default(),
        }
    }
}

/// Read-only view of the facade that owns a client.
///
/// Handed to a client factory when the client is created. The client may keep it to consult the
/// owning cache's alias, server spec and settings; holding it does not keep the facade alive.
#[derive(Debug, Clone)]
pub struct FacadeHandle(Arc<FacadeInfo>);

#[derive(Debug)]
struct FacadeInfo {
    alias: String,
    settings: CacheSettings,
}

impl FacadeHandle {
    /// Creates a handle for the cache named `alias`.
    pub fn new(alias: impl Into<String>, settings: CacheSettings) -> Self {
        Self(Arc::new(FacadeInfo {
            alias: alias.into(),
            settings,
        }))
    }

    /// Returns the alias the owning cache is registered under.
    #[must_use]
    pub fn alias(&self) -> &str {
        &self.0.alias
    }

    /// Returns the connection descriptor of the owning cache.
    #[must_use]
    pub fn server(&self) -> &ServerSpec {
        &self.0.settings.location
    }

    /// Returns the full settings of the owning cache.
    #[must_use]
    pub fn settings(&self) -> &CacheSettings {
        &self.0.settings
    }

    /// Returns the backend options of the owning cache.
    #[must_use]
    pub fn options(&self) -> &BackendOptions {
        &self.0.settings.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_settings_use_defaults() {
        let settings: CacheSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, CacheSettings::default());
        assert_eq!(settings.timeout, Some(DEFAULT_TIMEOUT));
        assert_eq!(settings.version, 1);
        assert_eq!(settings.options.client, DEFAULT_CLIENT);
        assert!(settings.location.is_empty());
    }

    #[test]
    fn null_timeout_means_never() {
        let settings: CacheSettings = serde_json::from_str(r#"{"TIMEOUT": null}"#).unwrap();
        assert_eq!(settings.timeout, None);
    }

    #[test]
    fn fractional_timeout_is_accepted() {
        let settings: CacheSettings = serde_json::from_str(r#"{"TIMEOUT": 0.5}"#).unwrap();
        assert_eq!(settings.timeout, Some(Duration::from_millis(500)));
    }

    #[test]
    fn negative_timeout_is_rejected() {
        serde_json::from_str::<CacheSettings>(r#"{"TIMEOUT": -1}"#).unwrap_err();
    }

    #[test]
    fn location_list_is_kept_verbatim() {
        let settings: CacheSettings = serde_json::from_str(r#"{"LOCATION": ["a:1", "b:2"]}"#).unwrap();
        assert_eq!(settings.location.addresses(), ["a:1", "b:2"]);
    }

    #[test]
    fn unknown_options_are_preserved() {
        let settings: CacheSettings =
            serde_json::from_str(r#"{"OPTIONS": {"CLIENT_CLASS": "cluster", "SOCKET_TIMEOUT": 5}}"#).unwrap();
        assert_eq!(settings.options.client, "cluster");
        assert_eq!(settings.options.extra("SOCKET_TIMEOUT"), Some(&serde_json::json!(5)));
        assert_eq!(settings.options.ignore_exceptions, None);
    }

    #[test]
    fn handle_exposes_owning_cache() {
        let handle = FacadeHandle::new("sessions", CacheSettings::new("10.0.0.1:7000"));
        assert_eq!(handle.alias(), "sessions");
        assert_eq!(handle.server().addresses(), ["10.0.0.1:7000"]);
        assert_eq!(handle.options().client, DEFAULT_CLIENT);

        let clone = handle.clone();
        assert_eq!(clone.settings(), handle.settings());
    }
}
