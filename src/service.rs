//! Coordinator driving every cache for [`Player`] records.
//!
//! ## Architecture
//!
//! ```text
//!                         PlayerCacheService
//!   ┌──────────────────────────────────────────────────────────────┐
//!   │ writes: Mutex<()>     serializes coordinator writes          │
//!   │ arena:  EntityArena<Player>   (owns every record)            │
//!   │                                                              │
//!   │   add / update / remove ──► PrimaryCache                     │
//!   │                        ──► CurrentCache   (allow-list gate)  │
//!   │                        ──► RecentCache    (countdowns)       │
//!   │                        ──► GroupCache<Category>              │
//!   │                        ──► GroupCache<Tag>                   │
//!   │                                                              │
//!   │ ranks: category rank table from the GroupSource              │
//!   │ config: TrackerConfig (threshold, list filter, placement)    │
//!   └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reads go straight to the caches and never take the write mutex. The
//! service owns no timer: callers decide when to run [`sweep_recent`] and
//! [`resort`].
//!
//! [`sweep_recent`]: PlayerCacheService::sweep_recent
//! [`resort`]: PlayerCacheService::resort
//!
//! ## Example Usage
//!
//! ```
//! use std::sync::Arc;
//!
//! use rosterkit::cache::{AllowListCache, StaticGroups};
//! use rosterkit::config::TrackerConfig;
//! use rosterkit::entity::Player;
//! use rosterkit::service::PlayerCacheService;
//! use rosterkit::traits::BasicEntityCache;
//!
//! let source = Arc::new(StaticGroups::new().with_category(1, 0));
//! let service = PlayerCacheService::new(TrackerConfig::default(), source);
//!
//! service.current_players().set_ids([2]);
//! service.load_players([
//!     Player::new(1, "Ash", 1).with_categories([1]),
//!     Player::new(2, "Bo", 1),
//! ]);
//!
//! assert_eq!(service.players().count(), 2);
//! assert_eq!(service.current_players().count(), 1);
//! ```

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

use crate::cache::{AllowListCache, CurrentCache, GroupCache, PrimaryCache, RecentCache};
use crate::config::{ListFilter, NoCategoryPlacement, TrackerConfig};
use crate::ds::EntityArena;
use crate::entity::{EntityId, GroupId, GroupKind, Player, TrackedEntity};
use crate::order::{EntityOrder, player_order};
use crate::search::{SearchType, search_filter};
use crate::traits::{BasicEntityCache, EntityCache, GroupSource, GroupedEntityCache};

/// Rank given to players with no ranked category.
pub fn no_category_rank(placement: NoCategoryPlacement, ranks: &FxHashMap<GroupId, i32>) -> i32 {
    let (Some(min), Some(max)) = (ranks.values().min(), ranks.values().max()) else {
        return 0;
    };
    match placement {
        NoCategoryPlacement::Top => min.saturating_sub(1),
        NoCategoryPlacement::Bottom => max.saturating_add(1),
        NoCategoryPlacement::Default => 0,
    }
}

pub struct PlayerCacheService {
    config: TrackerConfig,
    source: Arc<dyn GroupSource>,
    arena: EntityArena<Player>,
    players: PrimaryCache<Player>,
    current: CurrentCache<Player>,
    recent: RecentCache<Player>,
    categories: GroupCache<Player>,
    tags: GroupCache<Player>,
    ranks: RwLock<FxHashMap<GroupId, i32>>,
    writes: Mutex<()>,
}

impl PlayerCacheService {
    pub fn new(config: TrackerConfig, source: Arc<dyn GroupSource>) -> Self {
        let ranks = source.category_ranks();
        let order = player_order(
            &ranks,
            no_category_rank(config.no_category_placement(), &ranks),
        );
        Self {
            players: PrimaryCache::new(order.clone()),
            current: CurrentCache::new(order.clone()),
            recent: RecentCache::new(order.clone()),
            categories: GroupCache::new(GroupKind::Category, order.clone(), Arc::clone(&source)),
            tags: GroupCache::new(GroupKind::Tag, order, Arc::clone(&source)),
            arena: EntityArena::new(),
            ranks: RwLock::new(ranks),
            writes: Mutex::new(()),
            config,
            source,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn arena(&self) -> &EntityArena<Player> {
        &self.arena
    }

    pub fn players(&self) -> &PrimaryCache<Player> {
        &self.players
    }

    pub fn current_players(&self) -> &CurrentCache<Player> {
        &self.current
    }

    pub fn recent_players(&self) -> &RecentCache<Player> {
        &self.recent
    }

    pub fn categories(&self) -> &GroupCache<Player> {
        &self.categories
    }

    pub fn tags(&self) -> &GroupCache<Player> {
        &self.tags
    }

    pub fn get_player(&self, id: EntityId) -> Option<Arc<Player>> {
        self.arena.get(id)
    }

    /// Re-reads the rank table and returns the matching player order.
    fn refresh_order(&self) -> EntityOrder<Player> {
        self.install_ranks(self.source.category_ranks())
    }

    fn install_ranks(&self, ranks: FxHashMap<GroupId, i32>) -> EntityOrder<Player> {
        let order = player_order(
            &ranks,
            no_category_rank(self.config.no_category_placement(), &ranks),
        );
        *self.ranks.write() = ranks;
        order
    }

    /// Replaces every record.
    ///
    /// Ids indexed by the current and recent caches before the reload are
    /// carried over through their allow-lists, and the matching flags are
    /// restored on the new records. Recent countdowns are discarded. A
    /// repeated id keeps its last record.
    pub fn load_players(&self, players: impl IntoIterator<Item = Player>) {
        let _writes = self.writes.lock();
        let current_ids: FxHashSet<EntityId> = self
            .current
            .get_ids()
            .into_iter()
            .chain(self.current.allowed_ids())
            .collect();
        let recent_ids: FxHashSet<EntityId> = self
            .recent
            .get_ids()
            .into_iter()
            .chain(self.recent.allowed_ids())
            .collect();

        let order = self.refresh_order();
        self.players.initialize(order.clone());
        self.current.initialize(order.clone());
        self.recent.initialize(order.clone());
        self.categories.initialize(order.clone());
        self.tags.initialize(order);
        self.current.set_ids(current_ids.iter().copied());
        self.recent.set_ids(recent_ids.iter().copied());

        let ranks = self.ranks.read().clone();
        let handles = self.arena.replace_all(players.into_iter().map(|player| {
            let flags = player.visibility();
            flags.set_current(current_ids.contains(&player.id()));
            flags.set_recent(recent_ids.contains(&player.id()));
            player.refresh_primary_category(&ranks);
            player
        }));
        for handle in &handles {
            self.index(handle);
        }
        debug!(players = handles.len(), "load players");
    }

    /// Adds a new record; an id that is already known is treated as an
    /// update.
    pub fn add_player(&self, player: Player) -> Arc<Player> {
        let _writes = self.writes.lock();
        let handle = self.store(player);
        trace!(id = handle.id(), "add player");
        handle
    }

    /// Replaces a record and re-files it in every cache.
    ///
    /// Visibility flags of the previous record are carried over and a recent
    /// countdown in progress is kept.
    pub fn update_player(&self, player: Player) -> Arc<Player> {
        let _writes = self.writes.lock();
        let handle = self.store(player);
        trace!(id = handle.id(), "update player");
        handle
    }

    /// Arena insert plus indexing. Callers hold the write mutex so the
    /// arena and the caches always serve the same handle.
    fn store(&self, player: Player) -> Arc<Player> {
        player.refresh_primary_category(&self.ranks.read());
        let (handle, previous) = self.arena.insert(player);
        match previous {
            Some(previous) => {
                let flags = handle.visibility();
                flags.set_current(flags.is_current() || previous.visibility().is_current());
                flags.set_recent(flags.is_recent() || previous.visibility().is_recent());
                self.reindex(&previous, &handle);
            },
            None => self.index(&handle),
        }
        handle
    }

    /// Deletes a record and drops it from every cache without a recent
    /// countdown.
    pub fn remove_player(&self, id: EntityId) -> Option<Arc<Player>> {
        let _writes = self.writes.lock();
        let handle = self.arena.remove(id)?;
        self.players.remove(&handle);
        self.current.remove(&handle);
        self.current.revoke_id(id);
        self.recent.forget(id);
        self.categories.remove(&handle);
        self.tags.remove(&handle);
        trace!(id, "remove player");
        Some(handle)
    }

    pub fn add_category(&self, category: GroupId) {
        let _writes = self.writes.lock();
        self.categories.add_group(category);
    }

    pub fn add_tag(&self, tag: GroupId) {
        let _writes = self.writes.lock();
        self.tags.add_group(tag);
    }

    /// Drops a category: every member is replaced by a copy without it,
    /// with a recomputed primary category, then every cache is resorted
    /// under the refreshed rank table.
    ///
    /// Indexed records are never mutated; their sort keys stay fixed while
    /// any cache holds them.
    pub fn remove_category(&self, category: GroupId) -> bool {
        let _writes = self.writes.lock();
        let Some(members) = self.categories.get_group(category) else {
            return false;
        };
        let mut ranks = self.source.category_ranks();
        ranks.remove(&category);
        let order = self.install_ranks(ranks.clone());
        self.categories.remove_group(category);
        for member in members.values() {
            let next = Player::clone(member);
            next.unassign_group(GroupKind::Category, category);
            next.refresh_primary_category(&ranks);
            let (handle, previous) = self.arena.insert(next);
            let previous = previous.unwrap_or_else(|| Arc::clone(member));
            self.reindex(&previous, &handle);
        }
        self.resort_all_with(order);
        debug!(category, members = members.len(), "remove category");
        true
    }

    /// Drops a tag: unassigns it from its members and re-files them in the
    /// tag cache.
    pub fn remove_tag(&self, tag: GroupId) -> bool {
        let _writes = self.writes.lock();
        let Some(members) = self.tags.get_group(tag) else {
            return false;
        };
        for player in members.values() {
            player.unassign_group(GroupKind::Tag, tag);
        }
        self.tags.remove_group(tag);
        for player in members.values() {
            self.tags.remove(player);
            self.tags.add(player);
        }
        debug!(tag, members = members.len(), "remove tag");
        true
    }

    /// Rebuilds the view selected by the configured [`ListFilter`] under a
    /// freshly read rank table.
    pub fn resort(&self) {
        let _writes = self.writes.lock();
        let order = self.refresh_order();
        match self.config.list_filter() {
            ListFilter::AllPlayers => self.players.resort(order),
            ListFilter::CurrentPlayers => self.current.resort(order),
            ListFilter::RecentPlayers => self.recent.resort(order),
            ListFilter::PlayersByCategory => self.categories.resort(order),
            ListFilter::PlayersByTag => self.tags.resort(order),
        }
    }

    /// Rebuilds every view.
    pub fn resort_all(&self) {
        let _writes = self.writes.lock();
        let order = self.refresh_order();
        self.resort_all_with(order);
    }

    fn resort_all_with(&self, order: EntityOrder<Player>) {
        self.players.resort(order.clone());
        self.current.resort(order.clone());
        self.recent.resort(order.clone());
        self.categories.resort(order.clone());
        self.tags.resort(order);
    }

    /// Finalizes every recent countdown older than the configured threshold.
    ///
    /// Expired players lose `is_recent` and their allow-list entry. Returns
    /// the expired ids.
    pub fn sweep_recent(&self, now_ms: i64) -> Vec<EntityId> {
        let _writes = self.writes.lock();
        let cutoff = now_ms.saturating_sub(self.config.recent_threshold_ms());
        let expired = self.recent.expire_before(cutoff);
        for &id in &expired {
            if let Some(player) = self.arena.get(id) {
                player.visibility().set_recent(false);
            }
        }
        debug!(now_ms, expired = expired.len(), "sweep recent");
        expired
    }

    /// Filtered page of one list view. `group` selects the category or tag
    /// for the group views and is ignored otherwise.
    pub fn page_view(
        &self,
        view: ListFilter,
        group: GroupId,
        query: &str,
        search_type: SearchType,
        start: usize,
        count: usize,
    ) -> Vec<Arc<Player>> {
        let filter = search_filter(query, search_type);
        match view {
            ListFilter::AllPlayers => self.players.page_where(filter, start, count),
            ListFilter::CurrentPlayers => self.current.page_where(filter, start, count),
            ListFilter::RecentPlayers => self.recent.page_where(filter, start, count),
            ListFilter::PlayersByCategory => {
                self.categories.page_where_in(group, filter, start, count)
            },
            ListFilter::PlayersByTag => self.tags.page_where_in(group, filter, start, count),
        }
    }

    /// Number of players in one list view matching `query`.
    pub fn count_view(
        &self,
        view: ListFilter,
        group: GroupId,
        query: &str,
        search_type: SearchType,
    ) -> usize {
        let filter = search_filter(query, search_type);
        match view {
            ListFilter::AllPlayers => self.players.count_where(filter),
            ListFilter::CurrentPlayers => self.current.count_where(filter),
            ListFilter::RecentPlayers => self.recent.count_where(filter),
            ListFilter::PlayersByCategory => self.categories.count_where_in(group, filter),
            ListFilter::PlayersByTag => self.tags.count_where_in(group, filter),
        }
    }

    fn index(&self, player: &Arc<Player>) {
        self.players.add(player);
        self.current.add(player);
        self.recent.add(player);
        self.categories.add(player);
        self.tags.add(player);
    }

    /// Swaps `previous` for `next` in every cache. The recent cache keeps
    /// its recency state.
    fn reindex(&self, previous: &Player, next: &Arc<Player>) {
        self.players.remove(previous);
        self.players.add(next);
        self.current.remove(previous);
        self.current.add(next);
        self.recent.reindex(next);
        self.categories.remove(previous);
        self.categories.add(next);
        self.tags.remove(previous);
        self.tags.add(next);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::cache::{RecencyState, StaticGroups};
    use crate::entity::UNGROUPED;

    fn groups() -> Arc<StaticGroups> {
        Arc::new(
            StaticGroups::new()
                .with_category(10, 1)
                .with_category(20, 2)
                .with_tag(7),
        )
    }

    fn service(filter: ListFilter) -> PlayerCacheService {
        let config = TrackerConfig::builder()
            .recent_threshold(Duration::from_secs(60))
            .list_filter(filter)
            .build();
        PlayerCacheService::new(config, groups())
    }

    fn names(list: Vec<Arc<Player>>) -> Vec<String> {
        list.iter().map(|p| p.name().to_string()).collect()
    }

    #[test]
    fn placement_ranks() {
        let ranks: FxHashMap<GroupId, i32> = [(1, 3), (2, 8)].into_iter().collect();
        assert_eq!(no_category_rank(NoCategoryPlacement::Top, &ranks), 2);
        assert_eq!(no_category_rank(NoCategoryPlacement::Bottom, &ranks), 9);
        assert_eq!(no_category_rank(NoCategoryPlacement::Default, &ranks), 0);
        assert_eq!(no_category_rank(NoCategoryPlacement::Top, &FxHashMap::default()), 0);
    }

    #[test]
    fn load_orders_by_category_then_name() {
        let svc = service(ListFilter::AllPlayers);
        svc.load_players([
            Player::new(1, "zed", 1).with_categories([10]),
            Player::new(2, "amy", 1),
            Player::new(3, "bob", 1).with_categories([20, 10]),
            Player::new(4, "cat", 1).with_categories([20]),
        ]);
        assert_eq!(names(svc.players().get_all()), vec!["bob", "zed", "cat", "amy"]);
        assert_eq!(svc.categories().count_in(10), 2);
        assert_eq!(svc.categories().count_in(20), 2);
        assert_eq!(names(svc.categories().get_all_in(UNGROUPED)), vec!["amy"]);
        assert_eq!(svc.tags().count_in(UNGROUPED), 4);
    }

    #[test]
    fn reload_carries_visibility() {
        let svc = service(ListFilter::AllPlayers);
        svc.current_players().set_ids([1]);
        svc.recent_players().set_ids([2]);
        svc.load_players([Player::new(1, "a", 1), Player::new(2, "b", 1)]);
        assert!(svc.current_players().contains(1));
        assert!(svc.recent_players().contains(2));

        svc.current_players().clear_ids();
        svc.recent_players().clear_ids();
        svc.load_players([Player::new(1, "a", 1), Player::new(2, "b", 1)]);
        assert!(svc.get_player(1).unwrap().visibility().is_current());
        assert!(svc.current_players().contains(1));
        assert!(svc.recent_players().contains(2));
        assert!(!svc.recent_players().contains(1));
    }

    #[test]
    fn update_keeps_flags_and_countdown() {
        let svc = service(ListFilter::AllPlayers);
        svc.recent_players().set_ids([1]);
        let first = svc.add_player(Player::new(1, "a", 1));
        svc.recent_players().remove_at(&first, 500);

        let updated = svc.update_player(Player::new(1, "renamed", 1).with_tags([7]));
        assert!(updated.visibility().is_recent());
        assert_eq!(
            svc.recent_players().recency_state(1),
            Some(RecencyState::Expiring { since: 500 })
        );
        assert_eq!(svc.players().get(1).unwrap().name(), "renamed");
        assert_eq!(svc.tags().count_in(7), 1);
        assert_eq!(svc.tags().count_in(UNGROUPED), 0);
        svc.players().debug_validate_invariants();
        svc.recent_players().debug_validate_invariants();
    }

    #[test]
    fn load_with_repeated_id_indexes_the_stored_record() {
        let svc = service(ListFilter::AllPlayers);
        svc.load_players([
            Player::new(1, "a", 1).with_tags([7]),
            Player::new(1, "b", 1),
        ]);
        let stored = svc.get_player(1).unwrap();
        assert_eq!(stored.name(), "b");
        assert!(Arc::ptr_eq(&svc.players().get(1).unwrap(), &stored));
        assert!(Arc::ptr_eq(&svc.tags().get(1).unwrap(), &stored));
        assert_eq!(svc.tags().count_in(7), 0);
        assert_eq!(svc.players().count(), 1);
    }

    #[test]
    fn add_player_with_known_id_updates() {
        let svc = service(ListFilter::AllPlayers);
        svc.add_player(Player::new(1, "a", 1));
        svc.add_player(Player::new(1, "b", 1));
        assert_eq!(svc.players().count(), 1);
        assert_eq!(svc.players().get(1).unwrap().name(), "b");
        assert!(Arc::ptr_eq(
            &svc.players().get(1).unwrap(),
            &svc.get_player(1).unwrap()
        ));
    }

    #[test]
    fn remove_player_clears_every_cache() {
        let svc = service(ListFilter::AllPlayers);
        svc.current_players().set_ids([1]);
        svc.recent_players().set_ids([1]);
        svc.add_player(Player::new(1, "a", 1).with_categories([10]).with_tags([7]));
        assert!(svc.remove_player(1).is_some());
        assert!(svc.remove_player(1).is_none());
        assert_eq!(svc.players().count(), 0);
        assert_eq!(svc.current_players().count(), 0);
        assert_eq!(svc.recent_players().recency_state(1), None);
        assert_eq!(svc.categories().count_in(10), 0);
        assert_eq!(svc.tags().count_in(7), 0);
    }

    #[test]
    fn unknown_category_is_rejected_until_added() {
        let svc = service(ListFilter::AllPlayers);
        svc.add_player(Player::new(1, "a", 1).with_categories([30]));
        assert!(svc.categories().get(1).is_none());
        assert_eq!(svc.players().count(), 1);

        svc.add_category(30);
        svc.update_player(Player::new(1, "a", 1).with_categories([30]));
        assert_eq!(svc.categories().count_in(30), 1);
    }

    #[test]
    fn remove_category_refiles_members() {
        let svc = service(ListFilter::AllPlayers);
        svc.load_players([
            Player::new(1, "a", 1).with_categories([10, 20]),
            Player::new(2, "b", 1).with_categories([10]),
        ]);
        let before = svc.get_player(1).unwrap();
        assert!(svc.remove_category(10));
        assert!(!svc.remove_category(10));

        // The previously stored record is left untouched.
        assert_eq!(before.categories(), vec![10, 20]);
        assert_eq!(before.primary_category(), 10);
        let a = svc.get_player(1).unwrap();
        assert!(Arc::ptr_eq(&svc.players().get(1).unwrap(), &a));
        assert_eq!(a.categories(), vec![20]);
        assert_eq!(a.primary_category(), 20);
        assert_eq!(svc.categories().count_in(20), 1);
        assert_eq!(names(svc.categories().get_all_in(UNGROUPED)), vec!["b"]);
        assert!(!svc.categories().has_group(10));
        svc.categories().debug_validate_invariants();
        svc.players().debug_validate_invariants();
    }

    #[test]
    fn remove_tag_moves_members_to_ungrouped() {
        let svc = service(ListFilter::AllPlayers);
        svc.add_player(Player::new(1, "a", 1).with_tags([7]));
        assert!(svc.remove_tag(7));
        assert_eq!(svc.tags().count_in(UNGROUPED), 1);
        assert!(svc.get_player(1).unwrap().tags().is_empty());
    }

    #[test]
    fn sweep_expires_old_countdowns() {
        let svc = service(ListFilter::RecentPlayers);
        svc.recent_players().set_ids([1, 2]);
        let a = svc.add_player(Player::new(1, "a", 1));
        let b = svc.add_player(Player::new(2, "b", 1));
        svc.recent_players().remove_at(&a, 1_000);
        svc.recent_players().remove_at(&b, 50_000);

        assert!(svc.sweep_recent(60_000).is_empty());
        assert_eq!(svc.sweep_recent(61_000), vec![1]);
        assert!(!a.visibility().is_recent());
        assert!(b.visibility().is_recent());
        assert!(!svc.recent_players().contains(1));
        assert!(svc.recent_players().contains(2));
    }

    #[test]
    fn resort_targets_configured_view() {
        let svc = service(ListFilter::CurrentPlayers);
        svc.current_players().set_ids([1, 2]);
        svc.add_player(Player::new(1, "a", 1));
        svc.add_player(Player::new(2, "b", 1));
        svc.resort();
        assert_eq!(svc.current_players().metrics().resorts, 1);
        assert_eq!(svc.players().metrics().resorts, 0);
        svc.resort_all();
        assert_eq!(svc.players().metrics().resorts, 1);
    }

    #[test]
    fn views_with_search() {
        let svc = service(ListFilter::AllPlayers);
        svc.current_players().set_ids([1]);
        svc.load_players([
            Player::new(1, "Ash", 1).with_tags([7]),
            Player::new(2, "Ashley", 1).with_tags([7]),
            Player::new(3, "Bo", 1),
        ]);
        let page = svc.page_view(ListFilter::AllPlayers, 0, "ash", SearchType::Contains, 0, 10);
        assert_eq!(names(page), vec!["Ash", "Ashley"]);
        assert_eq!(
            svc.count_view(ListFilter::PlayersByTag, 7, "ash", SearchType::Exact),
            1
        );
        assert_eq!(
            svc.count_view(ListFilter::CurrentPlayers, 0, "", SearchType::Contains),
            1
        );
        assert!(
            svc.page_view(ListFilter::PlayersByCategory, 99, "", SearchType::Contains, 0, 5)
                .is_empty()
        );
    }
}
