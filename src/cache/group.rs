//! Group cache: one hash/order index pair per category or tag.
//!
//! ## Architecture
//!
//! ```text
//!   GroupCache<P> (kind = Category | Tag)
//!   ┌───────────────────────────────────────────────────────────┐
//!   │ RwLock<GroupState<P>>                                     │
//!   │   groups: FxHashMap<GroupId, IndexedSet<P>>               │
//!   │     0  ──► IndexedSet  (UNGROUPED: no assigned groups)    │
//!   │     4  ──► IndexedSet                                     │
//!   │     7  ──► IndexedSet                                     │
//!   │   order: EntityOrder<P>  (bound to groups created later)  │
//!   ├───────────────────────────────────────────────────────────┤
//!   │ source: Arc<dyn GroupSource>                              │
//!   │ counters: CacheCounters                                   │
//!   └───────────────────────────────────────────────────────────┘
//!
//!   add(e): targets = e.assigned_groups(kind) or [0]
//!           every target must exist ──► insert into each (fan-out)
//!           otherwise nothing is written
//!   remove(e): scan every group, drop e.id wherever present
//! ```
//!
//! Removal never consults the entity's group list; it may have changed
//! since the entity was added.
//!
//! ## Example Usage
//!
//! ```
//! use std::sync::Arc;
//!
//! use rosterkit::cache::{GroupCache, StaticGroups};
//! use rosterkit::entity::{GroupKind, Player, UNGROUPED};
//! use rosterkit::order::EntityOrder;
//! use rosterkit::traits::{EntityCache, GroupedEntityCache};
//!
//! let source = Arc::new(StaticGroups::new().with_tag(4).with_tag(7));
//! let tags = GroupCache::new(GroupKind::Tag, EntityOrder::by_id(), source);
//!
//! let player = Arc::new(Player::new(1, "Ash", 1).with_tags([4, 7]));
//! assert!(tags.add(&player));
//! assert_eq!(tags.count_in(4), 1);
//! assert_eq!(tags.count_in(7), 1);
//! assert_eq!(tags.count_in(UNGROUPED), 0);
//!
//! // Unknown groups are rejected as a whole.
//! let stray = Arc::new(Player::new(2, "Bo", 1).with_tags([4, 99]));
//! assert!(tags.try_add(&stray).is_err());
//! assert_eq!(tags.count_in(4), 1);
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace, warn};

use crate::ds::indexed_set::IndexedSet;
use crate::entity::{EntityId, GroupId, GroupKind, TrackedEntity, UNGROUPED};
use crate::error::{CacheError, InvariantError};
use crate::metrics::{CacheCounters, CacheMetricsSnapshot};
use crate::order::EntityOrder;
use crate::traits::{EntityCache, GroupSource, GroupedEntityCache};

#[derive(Debug)]
struct GroupState<P> {
    groups: FxHashMap<GroupId, IndexedSet<P>>,
    order: EntityOrder<P>,
}

impl<P> GroupState<P>
where
    P: TrackedEntity,
{
    fn seeded(order: EntityOrder<P>, ids: impl IntoIterator<Item = GroupId>) -> Self {
        let mut groups = FxHashMap::default();
        groups.insert(UNGROUPED, IndexedSet::new(order.clone()));
        for id in ids {
            groups
                .entry(id)
                .or_insert_with(|| IndexedSet::new(order.clone()));
        }
        Self { groups, order }
    }

    fn member_len(&self) -> usize {
        let mut ids = FxHashSet::default();
        for set in self.groups.values() {
            ids.extend(set.ids());
        }
        ids.len()
    }
}

pub struct GroupCache<P> {
    kind: GroupKind,
    source: Arc<dyn GroupSource>,
    inner: RwLock<GroupState<P>>,
    counters: CacheCounters,
}

impl<P> GroupCache<P>
where
    P: TrackedEntity,
{
    /// Creates the cache with group 0 plus every group `source` reports for
    /// `kind`.
    pub fn new(kind: GroupKind, order: EntityOrder<P>, source: Arc<dyn GroupSource>) -> Self {
        let state = GroupState::seeded(order, source.group_ids(kind));
        Self {
            kind,
            source,
            inner: RwLock::new(state),
            counters: CacheCounters::default(),
        }
    }

    pub fn kind(&self) -> GroupKind {
        self.kind
    }

    /// Fan-out insert.
    ///
    /// Every target group is checked before anything is written, so an
    /// unknown group leaves the cache untouched. Returns how many groups
    /// newly indexed the entity.
    pub fn try_add(&self, entity: &Arc<P>) -> Result<usize, CacheError> {
        let mut targets = entity.assigned_groups(self.kind);
        if targets.is_empty() {
            targets.push(UNGROUPED);
        }

        let mut state = self.inner.write();
        if let Some(&group) = targets.iter().find(|&g| !state.groups.contains_key(g)) {
            return Err(CacheError::UnknownGroup {
                kind: self.kind,
                group,
            });
        }

        let mut inserted = 0;
        for group in &targets {
            if let Some(set) = state.groups.get_mut(group) {
                if set.insert(Arc::clone(entity)) {
                    inserted += 1;
                }
            }
        }
        drop(state);
        trace!(cache = %self.kind, id = entity.id(), groups = ?targets, inserted, "add");
        Ok(inserted)
    }

    /// Group ids currently held, sorted.
    pub fn group_ids(&self) -> Vec<GroupId> {
        let mut ids: Vec<GroupId> = self.inner.read().groups.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn has_group(&self, group: GroupId) -> bool {
        self.inner.read().groups.contains_key(&group)
    }

    /// Groups currently holding `id`, sorted.
    pub fn groups_of(&self, id: EntityId) -> Vec<GroupId> {
        let mut ids: Vec<GroupId> = self
            .inner
            .read()
            .groups
            .iter()
            .filter(|(_, set)| set.contains(id))
            .map(|(&group, _)| group)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        let state = self.inner.read();
        if !state.groups.contains_key(&UNGROUPED) {
            return Err(InvariantError::new("ungrouped group 0 is missing"));
        }
        for (group, set) in &state.groups {
            set.check_invariants().map_err(|err| {
                InvariantError::new(format!("{} group {group}: {err}", self.kind))
            })?;
        }
        Ok(())
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        if let Err(err) = self.check_invariants() {
            panic!("{err}");
        }
    }
}

impl<P> EntityCache<P> for GroupCache<P>
where
    P: TrackedEntity,
{
    /// Drops every group and re-seeds from the group source.
    fn initialize(&self, order: EntityOrder<P>) {
        let state = GroupState::seeded(order, self.source.group_ids(self.kind));
        *self.inner.write() = state;
        debug!(cache = %self.kind, "initialize");
    }

    fn add(&self, entity: &Arc<P>) -> bool {
        match self.try_add(entity) {
            Ok(_) => {
                self.counters.record_add(true);
                true
            },
            Err(err) => {
                warn!(id = entity.id(), %err, "rejected group fan-out");
                self.counters.record_add(false);
                false
            },
        }
    }

    fn remove(&self, entity: &P) -> bool {
        let id = entity.id();
        let mut removed_from = 0usize;
        {
            let mut state = self.inner.write();
            for set in state.groups.values_mut() {
                if set.remove(id).is_some() {
                    removed_from += 1;
                }
            }
        }
        trace!(cache = %self.kind, id, removed_from, "remove");
        if removed_from > 0 {
            self.counters.record_remove();
        }
        removed_from > 0
    }

    fn resort(&self, order: EntityOrder<P>) {
        let mut state = self.inner.write();
        debug!(
            cache = %self.kind,
            order = order.name(),
            groups = state.groups.len(),
            "resort"
        );
        for set in state.groups.values_mut() {
            set.resort(order.clone());
        }
        state.order = order;
        self.counters.record_resort();
    }

    fn get(&self, id: EntityId) -> Option<Arc<P>> {
        let found = self
            .inner
            .read()
            .groups
            .values()
            .find_map(|set| set.get(id).cloned());
        self.counters.record_lookup(found.is_some());
        found
    }

    fn metrics(&self) -> CacheMetricsSnapshot {
        self.counters.snapshot(self.inner.read().member_len())
    }
}

impl<P> GroupedEntityCache<P> for GroupCache<P>
where
    P: TrackedEntity,
{
    fn with_group<R>(&self, group: GroupId, f: impl FnOnce(&IndexedSet<P>) -> R) -> Option<R> {
        let state = self.inner.read();
        state.groups.get(&group).map(f)
    }

    fn add_group(&self, group: GroupId) {
        let mut state = self.inner.write();
        let state = &mut *state;
        let order = &state.order;
        let created = !state.groups.contains_key(&group);
        state
            .groups
            .entry(group)
            .or_insert_with(|| IndexedSet::new(order.clone()));
        debug!(cache = %self.kind, group, created, "add group");
    }

    fn remove_group(&self, group: GroupId) -> bool {
        if group == UNGROUPED {
            return false;
        }
        let removed = self.inner.write().groups.remove(&group);
        debug!(
            cache = %self.kind,
            group,
            members = removed.as_ref().map_or(0, IndexedSet::len),
            "remove group"
        );
        removed.is_some()
    }
}

impl<P> fmt::Debug for GroupCache<P>
where
    P: TrackedEntity,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.read();
        f.debug_struct("GroupCache")
            .field("kind", &self.kind)
            .field("groups", &state.groups.len())
            .field("order", &state.order.name())
            .finish_non_exhaustive()
    }
}

/// Fixed [`GroupSource`] for callers that keep group definitions in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticGroups {
    categories: FxHashMap<GroupId, i32>,
    tags: Vec<GroupId>,
}

impl StaticGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a category with its sort rank (lower ranks first).
    pub fn with_category(mut self, id: GroupId, rank: i32) -> Self {
        self.categories.insert(id, rank);
        self
    }

    pub fn with_tag(mut self, id: GroupId) -> Self {
        if !self.tags.contains(&id) {
            self.tags.push(id);
        }
        self
    }
}

impl GroupSource for StaticGroups {
    fn group_ids(&self, kind: GroupKind) -> Vec<GroupId> {
        match kind {
            GroupKind::Category => {
                let mut ids: Vec<GroupId> = self.categories.keys().copied().collect();
                ids.sort_unstable();
                ids
            },
            GroupKind::Tag => self.tags.clone(),
        }
    }

    fn category_ranks(&self) -> FxHashMap<GroupId, i32> {
        self.categories.clone()
    }
}
