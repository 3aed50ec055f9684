// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use globset::{GlobBuilder, GlobMatcher};

use crate::{Error, Result};

/// A compiled glob pattern over cache keys.
///
/// `*` matches any sequence (including `/` and `:`), `?` matches one character, `[abc]` and
/// `[a-z]` match a class (negated with `!` or `^`), and `\` escapes the next character.
///
/// Clients compile the pattern passed to `keys`, `iter_keys` and `delete_pattern` once per call.
///
/// # Examples
///
/// ```
/// use cachegate_client::KeyPattern;
///
/// let pattern = KeyPattern::new("user:[0-9]*")?;
/// assert!(pattern.matches("user:42"));
/// assert!(!pattern.matches("user:admin"));
/// # Ok::<(), cachegate_client::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct KeyPattern {
    matcher: GlobMatcher,
}

impl KeyPattern {
    /// Compiles `pattern`.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorKind::InvalidUsage`](crate::ErrorKind::InvalidUsage) error if the pattern
    /// is malformed, for example an unclosed `[` class or a reversed range.
    pub fn new(pattern: &str) -> Result<Self> {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(false)
            .backslash_escape(true)
            .build()
            .map_err(Error::invalid_usage)?;

        Ok(Self {
            matcher: glob.compile_matcher(),
        })
    }

    /// The pattern as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.matcher.glob().glob()
    }

    /// Returns `true` if `key` matches the pattern.
    #[must_use]
    pub fn matches(&self, key: &str) -> bool {
        self.matcher.is_match(key)
    }
}
