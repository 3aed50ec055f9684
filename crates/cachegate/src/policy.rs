// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Failure absorption.

use std::sync::Arc;

use cachegate_client::{BackendOptions, Error, Result};

use crate::GlobalDefaults;

/// The facade operation a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Operation {
    /// `add`
    Add,
    /// `set`
    Set,
    /// `set_many`
    SetMany,
    /// `get`
    Get,
    /// `get_many`
    GetMany,
    /// `delete`
    Delete,
    /// `delete_pattern`
    DeletePattern,
    /// `delete_many`
    DeleteMany,
    /// `clear`
    Clear,
    /// `keys`
    Keys,
    /// `iter_keys`, including failures while iterating
    IterKeys,
    /// `has_key`
    HasKey,
    /// `lock`
    Lock,
    /// `incr`
    Incr,
    /// `decr`
    Decr,
    /// `incr_version`
    IncrVersion,
    /// `ttl`
    Ttl,
    /// `persist`
    Persist,
    /// `expire`
    Expire,
}

impl Operation {
    /// Returns the name used for this operation in log events.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "cache.add",
            Self::Set => "cache.set",
            Self::SetMany => "cache.set_many",
            Self::Get => "cache.get",
            Self::GetMany => "cache.get_many",
            Self::Delete => "cache.delete",
            Self::DeletePattern => "cache.delete_pattern",
            Self::DeleteMany => "cache.delete_many",
            Self::Clear => "cache.clear",
            Self::Keys => "cache.keys",
            Self::IterKeys => "cache.iter_keys",
            Self::HasKey => "cache.has_key",
            Self::Lock => "cache.lock",
            Self::Incr => "cache.incr",
            Self::Decr => "cache.decr",
            Self::IncrVersion => "cache.incr_version",
            Self::Ttl => "cache.ttl",
            Self::Persist => "cache.persist",
            Self::Expire => "cache.expire",
        }
    }
}

/// Decides what happens when a delegated client call fails.
///
/// Only connectivity failures can be absorbed, and only when the policy ignores failures. An
/// absorbed failure is replaced by the fallback value of the operation and, if enabled, logged as
/// an `ERROR` event named `cache.failure_ignored`. Every other failure is returned unchanged.
///
/// # Examples
///
/// ```
/// use cachegate::{AbsorptionPolicy, Error, Operation};
///
/// let policy = AbsorptionPolicy::new("default").ignore_failures(true);
///
/// let absorbed = policy.run(Operation::Delete, false, || Err(Error::connectivity("node down")));
/// assert!(!absorbed?);
///
/// let propagated = policy.run(Operation::Delete, false, || Err(Error::invalid_usage("bad key")));
/// assert!(propagated.is_err());
/// # Ok::<(), Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct AbsorptionPolicy {
    alias: Arc<str>,
    ignore_failures: bool,
    log_ignored: bool,
    logger: Arc<str>,
}

impl AbsorptionPolicy {
    /// Creates a policy for the cache named `alias` that propagates every failure.
    pub fn new(alias: impl Into<Arc<str>>) -> Self {
        Self {
            alias: alias.into(),
            ignore_failures: false,
            log_ignored: false,
            logger: Arc::from(crate::config::DEFAULT_LOGGER),
        }
    }

    /// Creates the policy of a cache from its backend options, falling back to `defaults` for
    /// anything the options leave unset.
    #[must_use]
    pub fn from_options(alias: &str, options: &BackendOptions, defaults: &GlobalDefaults) -> Self {
        Self::new(alias)
            .ignore_failures(options.ignore_exceptions.unwrap_or(defaults.ignore_exceptions))
            .log_ignored(options.log_ignored_exceptions.unwrap_or(defaults.log_ignored_exceptions))
            .logger(defaults.logger.as_str())
    }

    /// Sets whether connectivity failures are absorbed.
    #[must_use]
    pub fn ignore_failures(mut self, ignore: bool) -> Self {
        self.ignore_failures = ignore;
        self
    }

    /// Sets whether absorbed failures are logged.
    #[must_use]
    pub fn log_ignored(mut self, log: bool) -> Self {
        self.log_ignored = log;
        self
    }

    /// Sets the logger identity attached to absorbed-failure events.
    #[must_use]
    pub fn logger(mut self, logger: impl Into<Arc<str>>) -> Self {
        self.logger = logger.into();
        self
    }

    /// Returns `true` if connectivity failures are absorbed.
    #[must_use]
    pub fn ignores_failures(&self) -> bool {
        self.ignore_failures
    }

    /// Returns `true` if absorbed failures are logged.
    #[must_use]
    pub fn logs_ignored(&self) -> bool {
        self.log_ignored
    }

    /// Runs `work`, replacing an absorbable failure with `fallback`.
    ///
    /// # Errors
    ///
    /// Returns the failure of `work` unless the policy absorbs it.
    pub fn run<T>(&self, operation: Operation, fallback: T, work: impl FnOnce() -> Result<T>) -> Result<T> {
        match work() {
            Ok(value) => Ok(value),
            Err(error) => self.recover(operation, error, fallback),
        }
    }

    /// Absorbs `error` into `fallback` if the policy allows it, otherwise returns it.
    ///
    /// # Errors
    ///
    /// Returns `error` if it is not a connectivity failure or failures are not ignored.
    pub fn recover<T>(&self, operation: Operation, error: Error, fallback: T) -> Result<T> {
        if !self.ignore_failures || !error.is_connectivity() {
            return Err(error);
        }

        if self.log_ignored {
            tracing::error!(
                cache.name = &*self.alias,
                cache.operation = operation.as_str(),
                logger = &*self.logger,
                error = %error,
                "cache.failure_ignored"
            );
        }

        Ok(fallback)
    }
}
