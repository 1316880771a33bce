pub use crate::cache::{
    AllowListCache, CurrentCache, GroupCache, PrimaryCache, RecencyState, RecentCache,
    StaticGroups,
};
pub use crate::config::{ListFilter, NoCategoryPlacement, TrackerConfig, TrackerConfigBuilder};
pub use crate::ds::EntityArena;
pub use crate::entity::{
    EntityId, GroupId, GroupKind, Player, TrackedEntity, UNGROUPED, Visibility, VisibilityFlags,
};
pub use crate::error::{CacheError, ConfigError, InvariantError};
pub use crate::metrics::CacheMetricsSnapshot;
pub use crate::order::{EntityOrder, player_order};
pub use crate::search::{SearchType, search_filter};
pub use crate::service::PlayerCacheService;
pub use crate::traits::{BasicEntityCache, EntityCache, GroupSource, GroupedEntityCache};
