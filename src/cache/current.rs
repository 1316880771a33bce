//! Current-visibility cache: entities present in the live session.
//!
//! ## Architecture
//!
//! ```text
//!   CurrentCache<P>
//!   ┌──────────────────────────────────────────────┐
//!   │ RwLock<CurrentState<P>>                      │
//!   │   members: IndexedSet<P>  (hash + order)     │
//!   │   allow:   AllowList      (FxHashSet<id>)    │
//!   ├──────────────────────────────────────────────┤
//!   │ counters: CacheCounters                      │
//!   └──────────────────────────────────────────────┘
//!
//!   add(e):  allow ∋ e.id  ∨  e.is_current  ──yes──► mark_visible, insert
//!                                           ──no───► rejected (false)
//! ```
//!
//! `set_ids` is typically called once per ingestion tick with the ids the
//! client reports as present; the following `add` calls are cheap and need
//! no per-entity flag bookkeeping by the caller.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::cache::allow_list::{AllowList, AllowListCache, mark_visible};
use crate::ds::indexed_set::{IndexedSet, OrderedView};
use crate::entity::{EntityId, TrackedEntity, Visibility};
use crate::error::InvariantError;
use crate::metrics::{CacheCounters, CacheMetricsSnapshot};
use crate::order::EntityOrder;
use crate::traits::{BasicEntityCache, EntityCache};

#[derive(Debug)]
struct CurrentState<P> {
    members: IndexedSet<P>,
    allow: AllowList,
}

pub struct CurrentCache<P> {
    inner: RwLock<CurrentState<P>>,
    counters: CacheCounters,
}

impl<P> CurrentCache<P>
where
    P: TrackedEntity,
{
    pub fn new(order: EntityOrder<P>) -> Self {
        Self {
            inner: RwLock::new(CurrentState {
                members: IndexedSet::new(order),
                allow: AllowList::default(),
            }),
            counters: CacheCounters::default(),
        }
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.inner.read().members.contains(id)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().members.is_empty()
    }

    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        self.inner.read().members.check_invariants()
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        self.inner.read().members.debug_validate_invariants();
    }
}

impl<P> EntityCache<P> for CurrentCache<P>
where
    P: TrackedEntity,
{
    /// Discards every member and empties the allow-list.
    fn initialize(&self, order: EntityOrder<P>) {
        let mut state = self.inner.write();
        state.members.reset(order);
        state.allow.clear();
    }

    fn add(&self, entity: &Arc<P>) -> bool {
        let mut state = self.inner.write();
        let admitted = state.allow.admits(entity.as_ref(), Visibility::Current);
        let inserted = admitted && {
            mark_visible(entity.as_ref(), Visibility::Current);
            state.members.insert(Arc::clone(entity))
        };
        drop(state);
        trace!(cache = "current", id = entity.id(), admitted, inserted, "add");
        if inserted || !admitted {
            self.counters.record_add(admitted);
        }
        admitted
    }

    fn remove(&self, entity: &P) -> bool {
        let removed = self.inner.write().members.remove(entity.id()).is_some();
        if removed {
            self.counters.record_remove();
        }
        trace!(cache = "current", id = entity.id(), removed, "remove");
        removed
    }

    fn resort(&self, order: EntityOrder<P>) {
        let mut state = self.inner.write();
        debug!(
            cache = "current",
            order = order.name(),
            len = state.members.len(),
            "resort"
        );
        state.members.resort(order);
        self.counters.record_resort();
    }

    fn get(&self, id: EntityId) -> Option<Arc<P>> {
        let found = self.inner.read().members.get(id).cloned();
        self.counters.record_lookup(found.is_some());
        found
    }

    fn metrics(&self) -> CacheMetricsSnapshot {
        self.counters.snapshot(self.inner.read().members.len())
    }
}

impl<P> BasicEntityCache<P> for CurrentCache<P>
where
    P: TrackedEntity,
{
    type View = IndexedSet<P>;

    fn with_view<R>(&self, f: impl FnOnce(&Self::View) -> R) -> R {
        let state = self.inner.read();
        f(&state.members)
    }
}

impl<P> AllowListCache for CurrentCache<P>
where
    P: TrackedEntity,
{
    fn set_ids(&self, ids: impl IntoIterator<Item = EntityId>) {
        self.inner.write().allow.set(ids);
    }

    fn clear_ids(&self) {
        self.inner.write().allow.clear();
    }

    fn save_ids(&self) {
        let mut state = self.inner.write();
        let state = &mut *state;
        state.allow.extend(state.members.member_ids());
    }

    fn get_ids(&self) -> Vec<EntityId> {
        self.inner.read().members.member_ids()
    }

    fn allowed_ids(&self) -> Vec<EntityId> {
        self.inner.read().allow.to_vec()
    }

    fn revoke_id(&self, id: EntityId) -> bool {
        self.inner.write().allow.revoke(id)
    }
}

impl<P> fmt::Debug for CurrentCache<P>
where
    P: TrackedEntity,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.read();
        f.debug_struct("CurrentCache")
            .field("len", &state.members.len())
            .field("allowed", &state.allow.to_vec().len())
            .field("order", &state.members.order().name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Player;

    fn player(id: EntityId) -> Arc<Player> {
        Arc::new(Player::new(id, format!("p{id}"), 1))
    }

    fn sorted(mut ids: Vec<EntityId>) -> Vec<EntityId> {
        ids.sort_unstable();
        ids
    }

    #[test]
    fn rejects_without_list_or_flag() {
        let cache = CurrentCache::new(EntityOrder::by_id());
        let p = player(1);
        assert!(!cache.add(&p));
        assert!(!p.visibility().is_current());
        assert_eq!(cache.count(), 0);
        assert_eq!(cache.metrics().rejected_adds, 1);
    }

    #[test]
    fn allow_list_admits_and_marks_visible() {
        let cache = CurrentCache::new(EntityOrder::by_id());
        cache.set_ids([1]);
        let p = player(1);
        assert!(cache.add(&p));
        assert!(p.visibility().is_current());
        assert!(cache.contains(1));
        cache.debug_validate_invariants();
    }

    #[test]
    fn flag_admits_without_list() {
        let cache = CurrentCache::new(EntityOrder::by_id());
        let p = Arc::new(Player::new(4, "d", 1).with_visibility(true, false));
        assert!(cache.add(&p));
        assert_eq!(cache.get_ids(), vec![4]);
    }

    #[test]
    fn duplicate_add_keeps_single_member() {
        let cache = CurrentCache::new(EntityOrder::by_id());
        cache.set_ids([1]);
        assert!(cache.add(&player(1)));
        assert!(cache.add(&player(1)));
        assert_eq!(cache.count(), 1);
        assert_eq!(cache.metrics().adds, 1);
        cache.debug_validate_invariants();
    }

    #[test]
    fn initialize_discards_members_and_allow_list() {
        let cache = CurrentCache::new(EntityOrder::by_id());
        cache.set_ids([1, 2]);
        cache.add(&player(1));
        cache.initialize(EntityOrder::by_id());
        assert!(cache.is_empty());
        assert!(cache.allowed_ids().is_empty());
        assert!(!cache.add(&player(2)));
        assert_eq!(cache.count(), 0);
    }

    #[test]
    fn save_ids_unions_members_into_allow_list() {
        let cache = CurrentCache::new(EntityOrder::by_id());
        cache.set_ids([1, 2]);
        cache.add(&player(1));
        cache.add(&player(2));
        cache.set_ids([3]);
        cache.save_ids();
        cache.save_ids();
        assert_eq!(sorted(cache.allowed_ids()), vec![1, 2, 3]);
        assert_eq!(sorted(cache.get_ids()), vec![1, 2]);
    }

    #[test]
    fn clear_and_revoke() {
        let cache = CurrentCache::new(EntityOrder::by_id());
        cache.set_ids([1, 2]);
        assert!(cache.revoke_id(1));
        assert!(!cache.revoke_id(1));
        assert!(!cache.add(&player(1)));
        cache.clear_ids();
        assert!(cache.allowed_ids().is_empty());
        assert!(!cache.add(&player(2)));
    }

    #[test]
    fn remove_and_resort() {
        let cache = CurrentCache::new(EntityOrder::by_id());
        cache.set_ids([1, 2, 3]);
        for id in [3, 1, 2] {
            cache.add(&player(id));
        }
        cache.resort(EntityOrder::by_id().reversed());
        let ids: Vec<_> = cache.get_all().iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec![3, 2, 1]);
        assert!(cache.remove(&Player::new(2, "", 0)));
        assert!(!cache.remove(&Player::new(2, "", 0)));
        assert_eq!(cache.count(), 2);
        cache.debug_validate_invariants();
    }
}
