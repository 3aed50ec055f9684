// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Expiry requests and time-to-live reports.

use std::time::Duration;

/// The namespace tag of a cache key.
///
/// Bumping a version invalidates every key written under the previous one without deleting them.
pub type Version = u32;

/// How long a written value should live.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use cachegate_client::Expiry;
///
/// let expiry = Expiry::from(Duration::from_secs(30));
/// assert_eq!(expiry, Expiry::After(Duration::from_secs(30)));
/// assert_eq!(Expiry::default(), Expiry::Default);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Expiry {
    /// Use the timeout configured for the cache.
    #[default]
    Default,

    /// Keep the value until it is deleted or evicted.
    Never,

    /// Expire the value after the given duration. A zero duration expires it immediately.
    After(Duration),
}

impl From<Duration> for Expiry {
    fn from(duration: Duration) -> Self {
        Self::After(duration)
    }
}

impl From<Option<Duration>> for Expiry {
    fn from(duration: Option<Duration>) -> Self {
        duration.map_or(Self::Never, Self::After)
    }
}

/// The remaining lifetime of a key, as reported by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ttl {
    /// The key does not exist.
    Missing,

    /// The key exists and has no expiry.
    Persistent,

    /// The key exists and expires after the given duration.
    Expires(Duration),
}

impl Ttl {
    /// Returns the remaining duration, if the key expires.
    #[must_use]
    pub fn remaining(self) -> Option<Duration> {
        match self {
            Self::Expires(remaining) => Some(remaining),
            Self::Missing | Self::Persistent => None,
        }
    }
}
