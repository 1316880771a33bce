//! Error types for the rosterkit library.
//!
//! ## Key Components
//!
//! - [`CacheError`]: Returned when a write names a group the cache does not
//!   know about (fan-out into a missing category or tag).
//! - [`InvariantError`]: Returned when the hash index and the order index of a
//!   cache disagree (`check_invariants` methods).
//! - [`ConfigError`]: Returned when tracker configuration is invalid
//!   (e.g. a zero recent-player threshold).
//!
//! ## Example Usage
//!
//! ```
//! use std::time::Duration;
//!
//! use rosterkit::config::TrackerConfig;
//! use rosterkit::error::ConfigError;
//!
//! let config: Result<TrackerConfig, ConfigError> = TrackerConfig::builder()
//!     .recent_threshold(Duration::from_secs(300))
//!     .try_build();
//! assert!(config.is_ok());
//!
//! // A zero threshold is caught without panicking
//! let bad = TrackerConfig::builder()
//!     .recent_threshold(Duration::ZERO)
//!     .try_build();
//! assert!(bad.is_err());
//! ```

use std::fmt;

use crate::entity::{GroupId, GroupKind};

// ---------------------------------------------------------------------------
// CacheError
// ---------------------------------------------------------------------------

/// Error returned when a cache write cannot be applied.
///
/// Absence conditions (missing ids, unknown group ids on reads, pagination
/// past the end) never produce an error; only writes that would leave a
/// fan-out half applied do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheError {
    /// The entity is assigned to a group that has not been created with
    /// `add_group`.
    UnknownGroup { kind: GroupKind, group: GroupId },
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownGroup { kind, group } => {
                write!(f, "unknown {kind} group {group}")
            },
        }
    }
}

impl std::error::Error for CacheError {}

// ---------------------------------------------------------------------------
// InvariantError
// ---------------------------------------------------------------------------

/// Error returned when internal cache invariants are violated.
///
/// Produced by `check_invariants` methods on cache types
/// (e.g. [`PrimaryCache::check_invariants`](crate::cache::PrimaryCache::check_invariants)).
/// Carries a human-readable description of which invariant failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantError(String);

impl InvariantError {
    /// Creates a new `InvariantError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvariantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for InvariantError {}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when tracker configuration parameters are invalid.
///
/// Produced by [`TrackerConfigBuilder::try_build`](crate::config::TrackerConfigBuilder::try_build).
/// Carries a human-readable description of which parameter failed validation.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use rosterkit::config::TrackerConfig;
///
/// let err = TrackerConfig::builder()
///     .recent_threshold(Duration::ZERO)
///     .try_build()
///     .unwrap_err();
/// assert!(err.to_string().contains("threshold"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(String);

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- CacheError -------------------------------------------------------

    #[test]
    fn cache_error_names_kind_and_group() {
        let err = CacheError::UnknownGroup {
            kind: GroupKind::Tag,
            group: 7,
        };
        assert_eq!(err.to_string(), "unknown tag group 7");
    }

    #[test]
    fn cache_error_implements_std_error() {
        fn assert_error<T: std::error::Error>() {}
        assert_error::<CacheError>();
    }

    // -- InvariantError ---------------------------------------------------

    #[test]
    fn invariant_display_shows_message() {
        let err = InvariantError::new("order index length mismatch");
        assert_eq!(err.to_string(), "order index length mismatch");
    }

    #[test]
    fn invariant_debug_includes_message() {
        let err = InvariantError::new("bad pointer");
        let dbg = format!("{:?}", err);
        assert!(dbg.contains("bad pointer"));
    }

    #[test]
    fn invariant_message_accessor() {
        let err = InvariantError::new("test");
        assert_eq!(err.message(), "test");
    }

    #[test]
    fn invariant_clone_and_eq() {
        let a = InvariantError::new("x");
        let b = a.clone();
        assert_eq!(a, b);
    }

    #[test]
    fn invariant_implements_std_error() {
        fn assert_error<T: std::error::Error>() {}
        assert_error::<InvariantError>();
    }

    // -- ConfigError ------------------------------------------------------

    #[test]
    fn config_display_shows_message() {
        let err = ConfigError::new("recent threshold must be > 0");
        assert_eq!(err.to_string(), "recent threshold must be > 0");
    }

    #[test]
    fn config_debug_includes_message() {
        let err = ConfigError::new("bad placement");
        let dbg = format!("{:?}", err);
        assert!(dbg.contains("bad placement"));
    }

    #[test]
    fn config_message_accessor() {
        let err = ConfigError::new("test");
        assert_eq!(err.message(), "test");
    }

    #[test]
    fn config_clone_and_eq() {
        let a = ConfigError::new("x");
        let b = a.clone();
        assert_eq!(a, b);
    }

    #[test]
    fn config_implements_std_error() {
        fn assert_error<T: std::error::Error>() {}
        assert_error::<ConfigError>();
    }
}
