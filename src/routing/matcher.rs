//! Path prefix matching.
//!
//! # Responsibilities
//! - Validate prefix shape at construction
//! - Match path prefix on segment boundaries (case-sensitive)
//! - Produce the remainder of the path after the prefix
//!
//! # Design Decisions
//! - `/core` matches `/core` and `/core/...` but never `/corevette`
//! - An exact match leaves an empty remainder, which is normalized to `/`
//! - No regex to guarantee O(n) matching

use std::fmt;

use super::error::ConfigError;

/// A validated path prefix.
///
/// Invariants: non-empty, starts with exactly one `/`, does not end with `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathPrefix {
    prefix: String,
}

impl PathPrefix {
    /// Validate and wrap a prefix. `index` is the rule position, used only
    /// for error reporting.
    pub fn parse(prefix: impl Into<String>, index: usize) -> Result<Self, ConfigError> {
        let prefix = prefix.into();

        if prefix.is_empty() {
            return Err(ConfigError::EmptyPrefix { index });
        }
        if !prefix.starts_with('/') {
            return Err(ConfigError::MissingLeadingSeparator { prefix });
        }
        if prefix.starts_with("//") {
            return Err(ConfigError::RepeatedLeadingSeparator { prefix });
        }
        if prefix.ends_with('/') {
            return Err(ConfigError::TrailingSeparator { prefix });
        }

        Ok(Self { prefix })
    }

    pub fn as_str(&self) -> &str {
        &self.prefix
    }

    /// Strip this prefix from `path` if it matches on a segment boundary.
    ///
    /// Returns the rewritten path (`/` when the prefix consumes the whole
    /// path) or `None` when the prefix does not apply.
    pub fn strip<'a>(&self, path: &'a str) -> Option<&'a str> {
        let rest = path.strip_prefix(self.prefix.as_str())?;
        if rest.is_empty() {
            Some("/")
        } else if rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }

    /// Returns true if the prefix applies to `path`.
    pub fn matches(&self, path: &str) -> bool {
        self.strip(path).is_some()
    }

    /// Returns true if every path this prefix matches is also matched by
    /// `other`, i.e. `other` is this prefix or one of its ancestor segments.
    pub fn is_covered_by(&self, other: &PathPrefix) -> bool {
        other.matches(&self.prefix)
    }
}

impl fmt::Display for PathPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prefix)
    }
}
