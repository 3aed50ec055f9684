// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types for cache operations.

use std::fmt::{Display, Formatter};

use recoverable::{Recovery, RecoveryInfo};

/// Classifies an [`Error`].
///
/// Only [`ErrorKind::Connectivity`] is eligible for absorption by a facade; every other kind always
/// reaches the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The cluster or one of its nodes could not be reached, or a transport-level call failed.
    Connectivity,

    /// Client selection or backend options are invalid or cannot be resolved.
    Configuration,

    /// The configured client does not implement a requested capability.
    Unsupported,

    /// The caller passed arguments the operation cannot work with.
    InvalidUsage,
}

impl ErrorKind {
    /// Returns a stable, lowercase name for this kind, suitable for log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connectivity => "connectivity",
            Self::Configuration => "configuration",
            Self::Unsupported => "unsupported",
            Self::InvalidUsage => "invalid_usage",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error from a cache client or facade.
///
/// The error carries an [`ErrorKind`] alongside the underlying cause. Use
/// [`std::error::Error::source()`] to reach the original error if one was attached.
///
/// # Examples
///
/// ```
/// use cachegate_client::{Error, ErrorKind};
///
/// let error = Error::connectivity("node 10.0.0.3:7000 refused the connection");
/// assert_eq!(error.kind(), ErrorKind::Connectivity);
/// assert!(error.is_connectivity());
/// ```
#[ohno::error]
pub struct Error {
    kind: ErrorKind,
}

impl Error {
    /// Creates a connectivity error: the cluster is unreachable or a node call failed in transport.
    pub fn connectivity(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(ErrorKind::Connectivity, cause)
    }

    /// Creates a configuration error.
    pub fn configuration(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(ErrorKind::Configuration, cause)
    }

    /// Creates an error reporting that the configured client lacks `capability`.
    ///
    /// # Examples
    ///
    /// ```
    /// use cachegate_client::{Error, ErrorKind};
    ///
    /// let error = Error::unsupported("raw_connection");
    /// assert_eq!(error.kind(), ErrorKind::Unsupported);
    /// assert!(error.to_string().contains("raw_connection"));
    /// ```
    pub fn unsupported(capability: &str) -> Self {
        Self::caused_by(
            ErrorKind::Unsupported,
            format!("the configured cache client does not support the '{capability}' capability"),
        )
    }

    /// Creates an invalid-usage error.
    pub fn invalid_usage(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(ErrorKind::InvalidUsage, cause)
    }

    /// Returns the kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns `true` if this is a connectivity error.
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        self.kind == ErrorKind::Connectivity
    }
}

impl Recovery for Error {
    fn recovery(&self) -> RecoveryInfo {
        match self.kind {
            ErrorKind::Connectivity => RecoveryInfo::unavailable(),
            ErrorKind::Configuration | ErrorKind::Unsupported | ErrorKind::InvalidUsage => RecoveryInfo::never(),
        }
    }
}

/// A specialized [`Result`] type for cache operations.
pub type Result<T> = std::result::Result<T, Error>;
