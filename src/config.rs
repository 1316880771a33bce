//! Tracker configuration.
//!
//! ## Example
//!
//! ```
//! use std::time::Duration;
//!
//! use rosterkit::config::{ListFilter, NoCategoryPlacement, TrackerConfig};
//!
//! let config = TrackerConfig::builder()
//!     .recent_threshold(Duration::from_secs(600))
//!     .list_filter(ListFilter::CurrentPlayers)
//!     .no_category_placement(NoCategoryPlacement::Top)
//!     .build();
//! assert_eq!(config.recent_threshold_ms(), 600_000);
//! ```

use std::time::Duration;

use crate::error::ConfigError;

/// Default recency window: fifteen minutes.
pub const DEFAULT_RECENT_THRESHOLD: Duration = Duration::from_secs(15 * 60);

/// Which list view [`PlayerCacheService::resort`](crate::service::PlayerCacheService::resort)
/// rebuilds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListFilter {
    #[default]
    AllPlayers,
    CurrentPlayers,
    RecentPlayers,
    PlayersByCategory,
    PlayersByTag,
}

/// Where players without a ranked category sort relative to ranked ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NoCategoryPlacement {
    /// One rank above the best-ranked category.
    Top,
    /// One rank below the worst-ranked category.
    #[default]
    Bottom,
    /// Rank 0.
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    recent_threshold: Duration,
    list_filter: ListFilter,
    no_category_placement: NoCategoryPlacement,
}

impl TrackerConfig {
    pub fn builder() -> TrackerConfigBuilder {
        TrackerConfigBuilder::new()
    }

    pub fn recent_threshold(&self) -> Duration {
        self.recent_threshold
    }

    /// Recency window in milliseconds, saturating at `i64::MAX`.
    pub fn recent_threshold_ms(&self) -> i64 {
        i64::try_from(self.recent_threshold.as_millis()).unwrap_or(i64::MAX)
    }

    pub fn list_filter(&self) -> ListFilter {
        self.list_filter
    }

    pub fn no_category_placement(&self) -> NoCategoryPlacement {
        self.no_category_placement
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            recent_threshold: DEFAULT_RECENT_THRESHOLD,
            list_filter: ListFilter::default(),
            no_category_placement: NoCategoryPlacement::default(),
        }
    }
}

/// Builder for [`TrackerConfig`].
#[derive(Debug, Clone)]
pub struct TrackerConfigBuilder {
    config: TrackerConfig,
}

impl TrackerConfigBuilder {
    /// Creates a builder holding the default configuration.
    pub fn new() -> Self {
        Self {
            config: TrackerConfig::default(),
        }
    }

    /// Sets how long a removed player stays in the recent list.
    pub fn recent_threshold(mut self, threshold: Duration) -> Self {
        self.config.recent_threshold = threshold;
        self
    }

    pub fn list_filter(mut self, filter: ListFilter) -> Self {
        self.config.list_filter = filter;
        self
    }

    pub fn no_category_placement(mut self, placement: NoCategoryPlacement) -> Self {
        self.config.no_category_placement = placement;
        self
    }

    /// Builds the configuration.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid. For a non-panicking
    /// alternative, use [`try_build`](Self::try_build).
    pub fn build(self) -> TrackerConfig {
        match self.try_build() {
            Ok(config) => config,
            Err(e) => panic!("{}", e),
        }
    }

    /// Builds the configuration, returning an error instead of panicking.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the recent threshold is zero.
    pub fn try_build(self) -> Result<TrackerConfig, ConfigError> {
        if self.config.recent_threshold.is_zero() {
            return Err(ConfigError::new("recent threshold must be greater than zero"));
        }
        Ok(self.config)
    }
}

impl Default for TrackerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
