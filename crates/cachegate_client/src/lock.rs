// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Named, client-defined locks.

use std::fmt::Debug;
use std::time::Duration;

use crate::Result;

/// Parameters for acquiring a named lock.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use cachegate_client::LockOptions;
///
/// let options = LockOptions::new()
///     .timeout(Duration::from_secs(30))
///     .blocking_timeout(Duration::from_secs(5));
///
/// assert_eq!(options.get_timeout(), Some(Duration::from_secs(30)));
/// assert_eq!(options.get_sleep(), Duration::from_millis(100));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LockOptions {
    timeout: Option<Duration>,
    sleep: Duration,
    blocking_timeout: Option<Duration>,
}

impl LockOptions {
    /// Creates options for a lock that never expires, polls every 100ms and waits indefinitely.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            timeout: None,
            sleep: Duration::from_millis(100),
            blocking_timeout: None,
        }
    }

    /// Releases the lock automatically after `timeout` if its holder never does.
    #[must_use]
    pub const fn timeout(self, timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..self
        }
    }

    /// Sets how long a blocking acquire waits between attempts.
    #[must_use]
    pub const fn sleep(self, sleep: Duration) -> Self {
        Self { sleep, ..self }
    }

    /// Limits how long a blocking acquire keeps trying.
    #[must_use]
    pub const fn blocking_timeout(self, blocking_timeout: Duration) -> Self {
        Self {
            blocking_timeout: Some(blocking_timeout),
            ..self
        }
    }

    /// Returns the automatic release timeout, if any.
    #[must_use]
    pub const fn get_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Returns the pause between blocking acquire attempts.
    #[must_use]
    pub const fn get_sleep(&self) -> Duration {
        self.sleep
    }

    /// Returns the limit on blocking acquisition, if any.
    #[must_use]
    pub const fn get_blocking_timeout(&self) -> Option<Duration> {
        self.blocking_timeout
    }
}

impl Default for LockOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// A lock implementation provided by a cache client.
///
/// Acquisition and release semantics are entirely up to the client.
pub trait CacheLock: Debug + Send + Sync {
    /// Tries to take the lock, waiting according to the lock's options when `blocking` is set.
    ///
    /// Returns `false` if the lock could not be taken.
    fn acquire(&self, blocking: bool) -> Result<bool>;

    /// Releases a lock held by this handle.
    fn release(&self) -> Result<()>;

    /// Returns `true` if any handle currently holds the lock.
    fn locked(&self) -> Result<bool>;
}

/// A scoped handle to a named lock returned by a cache.
#[derive(Debug)]
pub struct Lock(Box<dyn CacheLock>);

impl Lock {
    /// Wraps a client lock.
    pub fn new(lock: impl CacheLock + 'static) -> Self {
        Self(Box::new(lock))
    }

    /// Tries to take the lock. See [`CacheLock::acquire`].
    pub fn acquire(&self, blocking: bool) -> Result<bool> {
        self.0.acquire(blocking)
    }

    /// Releases the lock. See [`CacheLock::release`].
    pub fn release(&self) -> Result<()> {
        self.0.release()
    }

    /// Returns `true` if the lock is held by anyone.
    pub fn locked(&self) -> Result<bool> {
        self.0.locked()
    }

    /// Acquires the lock with blocking and returns a guard that releases it when dropped.
    ///
    /// Returns `None` if the lock could not be taken within its blocking timeout. A failure to
    /// release the lock when the guard drops cannot be returned; it is logged as a `WARN`
    /// `cache.lock_release_failed` event instead.
    pub fn guard(&self) -> Result<Option<LockGuard<'_>>> {
        Ok(self.acquire(true)?.then_some(LockGuard { lock: self }))
    }
}

/// Releases the held [`Lock`] when dropped.
#[derive(Debug)]
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard<'a> {
    lock: &'a Lock,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if let Err(error) = self.lock.release() {
            tracing::warn!(
                cache.lock = ?self.lock,
                error = %error,
                "cache.lock_release_failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::testing::LogCapture;

    #[derive(Debug)]
    struct StaleLock;

    impl CacheLock for StaleLock {
        fn acquire(&self, _blocking: bool) -> Result<bool> {
            Ok(true)
        }

        fn release(&self) -> Result<()> {
            Err(Error::connectivity("node 10.0.0.4 refused release"))
        }

        fn locked(&self) -> Result<bool> {
            Ok(true)
        }
    }

    #[test]
    fn guard_logs_release_failures() {
        let capture = LogCapture::new();
        let _subscriber = tracing::subscriber::set_default(capture.subscriber());

        let lock = Lock::new(StaleLock);
        drop(lock.guard().unwrap());

        assert_eq!(capture.count("cache.lock_release_failed"), 1);
        capture.assert_contains("WARN");
        capture.assert_contains("node 10.0.0.4 refused release");
    }
}
