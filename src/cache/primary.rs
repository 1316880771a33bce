//! Primary cache: the full working set of entities known to the session.
//!
//! ## Architecture
//!
//! ```text
//!   PrimaryCache<P>
//!   ┌────────────────────────────────────────────────┐
//!   │ RwLock<IndexedSet<P>>                          │
//!   │   by_id:   FxHashMap<EntityId, Arc<P>>         │
//!   │   ordered: OrderIndex<P> (EntityOrder<P>)      │
//!   ├────────────────────────────────────────────────┤
//!   │ counters: CacheCounters (atomics)              │
//!   └────────────────────────────────────────────────┘
//! ```
//!
//! Entries are created on the first `add` and removed only by `remove`;
//! nothing here is time-based.
//!
//! ## Example Usage
//!
//! ```
//! use std::sync::Arc;
//!
//! use rosterkit::cache::PrimaryCache;
//! use rosterkit::entity::{Player, TrackedEntity};
//! use rosterkit::order::EntityOrder;
//! use rosterkit::traits::{BasicEntityCache, EntityCache};
//!
//! let cache = PrimaryCache::new(EntityOrder::by_id());
//! for id in [5, 2, 9] {
//!     cache.add(&Arc::new(Player::new(id, format!("p{id}"), 1)));
//! }
//! let ids = |v: Vec<Arc<Player>>| v.iter().map(|p| p.id()).collect::<Vec<_>>();
//! assert_eq!(ids(cache.get_all()), vec![2, 5, 9]);
//! assert_eq!(ids(cache.page(0, 2)), vec![2, 5]);
//!
//! cache.resort(EntityOrder::by_id().reversed());
//! assert_eq!(ids(cache.get_all()), vec![9, 5, 2]);
//! ```
//!
//! ## Thread Safety
//!
//! One `parking_lot::RwLock` guards both indexes. Writes (including the full
//! `resort` rebuild) hold the write guard for their whole duration.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::ds::indexed_set::IndexedSet;
use crate::entity::{EntityId, TrackedEntity};
use crate::error::InvariantError;
use crate::metrics::{CacheCounters, CacheMetricsSnapshot};
use crate::order::EntityOrder;
use crate::traits::{BasicEntityCache, EntityCache};

pub struct PrimaryCache<P> {
    inner: RwLock<IndexedSet<P>>,
    counters: CacheCounters,
}

impl<P> PrimaryCache<P>
where
    P: TrackedEntity,
{
    pub fn new(order: EntityOrder<P>) -> Self {
        Self {
            inner: RwLock::new(IndexedSet::new(order)),
            counters: CacheCounters::default(),
        }
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.inner.read().contains(id)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        self.inner.read().check_invariants()
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        self.inner.read().debug_validate_invariants();
    }
}

impl<P> EntityCache<P> for PrimaryCache<P>
where
    P: TrackedEntity,
{
    fn initialize(&self, order: EntityOrder<P>) {
        self.inner.write().reset(order);
    }

    fn add(&self, entity: &Arc<P>) -> bool {
        let inserted = self.inner.write().insert(Arc::clone(entity));
        trace!(cache = "primary", id = entity.id(), inserted, "add");
        if inserted {
            self.counters.record_add(true);
        }
        true
    }

    fn remove(&self, entity: &P) -> bool {
        let removed = self.inner.write().remove(entity.id()).is_some();
        if removed {
            self.counters.record_remove();
        }
        trace!(cache = "primary", id = entity.id(), removed, "remove");
        removed
    }

    fn resort(&self, order: EntityOrder<P>) {
        let mut set = self.inner.write();
        debug!(cache = "primary", order = order.name(), len = set.len(), "resort");
        set.resort(order);
        self.counters.record_resort();
    }

    fn get(&self, id: EntityId) -> Option<Arc<P>> {
        let found = self.inner.read().get(id).cloned();
        self.counters.record_lookup(found.is_some());
        found
    }

    fn metrics(&self) -> CacheMetricsSnapshot {
        self.counters.snapshot(self.inner.read().len())
    }
}

impl<P> BasicEntityCache<P> for PrimaryCache<P>
where
    P: TrackedEntity,
{
    type View = IndexedSet<P>;

    fn with_view<R>(&self, f: impl FnOnce(&Self::View) -> R) -> R {
        let set = self.inner.read();
        f(&set)
    }
}

impl<P> fmt::Debug for PrimaryCache<P>
where
    P: TrackedEntity,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let set = self.inner.read();
        f.debug_struct("PrimaryCache")
            .field("len", &set.len())
            .field("order", &set.order().name())
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

    fn ids(list: Vec<Arc<Player>>) -> Vec<EntityId> {
        list.iter().map(|p| p.id()).collect()
    }

    fn filled(order: EntityOrder<Player>, members: &[EntityId]) -> PrimaryCache<Player> {
        let cache = PrimaryCache::new(order);
        for &id in members {
            cache.add(&player(id));
        }
        cache
    }

    #[test]
    fn concrete_scenario() {
        let cache = filled(EntityOrder::by_id(), &[5, 2, 9]);
        assert_eq!(ids(cache.get_all()), vec![2, 5, 9]);
        assert_eq!(ids(cache.page(0, 2)), vec![2, 5]);

        cache.resort(EntityOrder::by_id().reversed());
        assert_eq!(ids(cache.get_all()), vec![9, 5, 2]);

        assert!(cache.remove(&Player::new(5, "", 0)));
        assert_eq!(ids(cache.get_all()), vec![9, 2]);
        cache.debug_validate_invariants();
    }

    #[test]
    fn add_is_noop_for_known_id() {
        let cache = filled(EntityOrder::by_id(), &[1]);
        let original = cache.get(1).unwrap();
        assert!(cache.add(&player(1)));
        assert_eq!(cache.count(), 1);
        assert_eq!(cache.metrics().adds, 1);
        assert!(Arc::ptr_eq(&cache.get(1).unwrap(), &original));
    }

    #[test]
    fn remove_missing_returns_false() {
        let cache = filled(EntityOrder::by_id(), &[1]);
        assert!(!cache.remove(&Player::new(2, "", 0)));
        assert_eq!(cache.count(), 1);
    }

    #[test]
    fn initialize_discards_entries() {
        let cache = filled(EntityOrder::by_id(), &[1, 2]);
        cache.initialize(EntityOrder::by_id().reversed());
        assert!(cache.is_empty());
        cache.add(&player(1));
        cache.add(&player(3));
        assert_eq!(ids(cache.get_all()), vec![3, 1]);
    }

    #[test]
    fn filtered_reads() {
        let cache = filled(EntityOrder::by_id(), &[1, 2, 3, 4, 5, 6]);
        let odd = |p: &Player| p.id() % 2 == 1;
        assert_eq!(ids(cache.get_where(odd)), vec![1, 3, 5]);
        assert_eq!(cache.count_where(odd), 3);
        assert_eq!(cache.find_first(|p| p.id() > 4).map(|p| p.id()), Some(5));
        assert!(cache.find_first(|p| p.id() > 40).is_none());
        assert_eq!(ids(cache.page_where(odd, 1, 5)), vec![3, 5]);
        assert!(cache.page_where(odd, 3, 1).is_empty());
    }

    #[test]
    fn pagination_past_end_is_empty() {
        let cache = filled(EntityOrder::by_id(), &[1, 2, 3]);
        assert!(cache.page(3, 1).is_empty());
        assert!(cache.page(99, 5).is_empty());
        assert_eq!(ids(cache.page(2, 99)), vec![3]);
    }

    #[test]
    fn snapshots_are_detached() {
        let cache = filled(EntityOrder::by_id(), &[1, 2]);
        let before = cache.get_all();
        cache.add(&player(3));
        cache.remove(&Player::new(1, "", 0));
        assert_eq!(ids(before), vec![1, 2]);
        assert_eq!(ids(cache.get_all()), vec![2, 3]);
    }

    #[test]
    fn metrics_track_calls() {
        let cache = filled(EntityOrder::by_id(), &[1, 2]);
        cache.get(1);
        cache.get(7);
        cache.remove(&Player::new(2, "", 0));
        cache.resort(EntityOrder::by_id());
        let snap = cache.metrics();
        assert_eq!(snap.adds, 2);
        assert_eq!(snap.removes, 1);
        assert_eq!(snap.resorts, 1);
        assert_eq!(snap.lookup_hits, 1);
        assert_eq!(snap.lookup_misses, 1);
        assert_eq!(snap.len, 1);
    }
}
