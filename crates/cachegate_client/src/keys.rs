// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;

use crate::Result;

/// A lazily evaluated sequence of cache keys.
///
/// Each item is fallible because clients typically fetch keys in batches and any batch can fail
/// in transport. The sequence is single-pass; call `iter_keys` again to restart.
///
/// # Examples
///
/// ```
/// use cachegate_client::KeyIter;
///
/// let keys = KeyIter::from_keys(vec!["a".to_string(), "b".to_string()]);
/// let collected: Vec<String> = keys.collect::<Result<_, _>>()?;
/// assert_eq!(collected, ["a", "b"]);
/// # Ok::<(), cachegate_client::Error>(())
/// ```
pub struct KeyIter(Box<dyn Iterator<Item = Result<String>> + Send>);

impl KeyIter {
    /// Wraps any sendable iterator of fallible keys.
    pub fn new<I>(iter: I) -> Self
    where
        I: Iterator<Item = Result<String>> + Send + 'static,
    {
        Self(Box::new(iter))
    }

    /// Creates a sequence over keys that are already known.
    #[must_use]
    pub fn from_keys(keys: Vec<String>) -> Self {
        Self::new(keys.into_iter().map(Ok))
    }

    /// Creates a sequence that yields nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(std::iter::empty())
    }
}

impl Iterator for KeyIter {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl Debug for KeyIter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyIter").finish_non_exhaustive()
    }
}

impl Default for KeyIter {
    fn default() -> Self {
        Self::empty()
    }
}
