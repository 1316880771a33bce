//! Recent-visibility cache: entities seen within the recency window.
//!
//! ## Architecture
//!
//! ```text
//!   RecentCache<P>
//!   ┌─────────────────────────────────────────────────────────────┐
//!   │ RwLock<RecentIndex<P>>                                      │
//!   │   slots:   FxHashMap<EntityId, RecentSlot<P>>  (tri-state)  │
//!   │   ordered: OrderIndex<P>  (Active + Expiring handles)       │
//!   │   allow:   AllowList                                        │
//!   ├─────────────────────────────────────────────────────────────┤
//!   │ counters: CacheCounters                                     │
//!   └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Recency state machine
//!
//! ```text
//!                  remove                 remove
//!   (absent) ───────────────► Detached ───────────► (absent)
//!      │                         │
//!      │ add (admitted)          │ add (admitted)
//!      ▼                         ▼
//!    Active ──── remove ────► Expiring ─── remove ───► (absent)
//!      ▲                         │
//!      └──── add(is_current) ────┘   remove_expiry / add(is_current)
//! ```
//!
//! The first `remove` starts a countdown stamped in unix milliseconds. The
//! second `remove` finalizes it and drops the entity from every index,
//! including the expiry record. An `add` whose entity is currently present
//! (`is_current`) clears any countdown even if it was not admitted.
//!
//! ## Example Usage
//!
//! ```
//! use std::sync::Arc;
//!
//! use rosterkit::cache::{AllowListCache, RecencyState, RecentCache};
//! use rosterkit::entity::Player;
//! use rosterkit::order::EntityOrder;
//! use rosterkit::traits::{BasicEntityCache, EntityCache};
//!
//! let cache = RecentCache::new(EntityOrder::by_id());
//! cache.set_ids([7]);
//! let player = Arc::new(Player::new(7, "Wren", 1));
//! assert!(cache.add(&player));
//!
//! cache.remove_at(&player, 1_000);
//! assert_eq!(cache.recency_state(7), Some(RecencyState::Expiring { since: 1_000 }));
//! assert_eq!(cache.count(), 1);
//!
//! cache.remove_at(&player, 2_000);
//! assert_eq!(cache.recency_state(7), None);
//! assert_eq!(cache.count(), 0);
//! ```

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::cache::allow_list::{AllowList, AllowListCache, mark_visible};
use crate::ds::indexed_set::OrderedView;
use crate::ds::order_index::OrderIndex;
use crate::entity::{EntityId, TrackedEntity, Visibility};
use crate::error::InvariantError;
use crate::metrics::{CacheCounters, CacheMetricsSnapshot};
use crate::order::EntityOrder;
use crate::traits::{BasicEntityCache, EntityCache};

/// Observable recency state of one id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecencyState {
    /// Indexed, no countdown.
    Active,
    /// Indexed, countdown started at `since` (unix ms).
    Expiring { since: i64 },
    /// Not indexed, countdown started at `since` (unix ms).
    Detached { since: i64 },
}

#[derive(Debug)]
enum RecentSlot<P> {
    Active(Arc<P>),
    Expiring { entity: Arc<P>, since: i64 },
    Detached { since: i64 },
}

impl<P> RecentSlot<P> {
    fn entity(&self) -> Option<&Arc<P>> {
        match self {
            Self::Active(entity) | Self::Expiring { entity, .. } => Some(entity),
            Self::Detached { .. } => None,
        }
    }

    fn countdown(&self) -> Option<i64> {
        match self {
            Self::Active(_) => None,
            Self::Expiring { since, .. } | Self::Detached { since } => Some(*since),
        }
    }

    fn state(&self) -> RecencyState {
        match self {
            Self::Active(_) => RecencyState::Active,
            Self::Expiring { since, .. } => RecencyState::Expiring { since: *since },
            Self::Detached { since } => RecencyState::Detached { since: *since },
        }
    }
}

/// Indexes of a [`RecentCache`]; the view handed to read closures.
#[derive(Debug)]
pub struct RecentIndex<P> {
    slots: FxHashMap<EntityId, RecentSlot<P>>,
    ordered: OrderIndex<P>,
    allow: AllowList,
}

impl<P> RecentIndex<P>
where
    P: TrackedEntity,
{
    fn new(order: EntityOrder<P>) -> Self {
        Self {
            slots: FxHashMap::default(),
            ordered: OrderIndex::new(order),
            allow: AllowList::default(),
        }
    }

    fn indexed_len(&self) -> usize {
        self.ordered.len()
    }

    /// Admits `entity` into the indexes. Returns `true` when a handle was
    /// newly indexed.
    fn admit(&mut self, entity: &Arc<P>) -> bool {
        let id = entity.id();
        match self.slots.remove(&id) {
            None => {
                self.slots.insert(id, RecentSlot::Active(Arc::clone(entity)));
                self.ordered.insert(Arc::clone(entity));
                true
            },
            Some(RecentSlot::Detached { since }) => {
                self.slots.insert(
                    id,
                    RecentSlot::Expiring {
                        entity: Arc::clone(entity),
                        since,
                    },
                );
                self.ordered.insert(Arc::clone(entity));
                true
            },
            Some(indexed) => {
                self.slots.insert(id, indexed);
                false
            },
        }
    }

    /// Admission gate plus the `is_current` countdown reset shared by `add`
    /// and `reindex`. Returns whether the gate admitted `entity`.
    fn offer(&mut self, entity: &Arc<P>) -> bool {
        let admitted = self.allow.admits(entity.as_ref(), Visibility::Recent);
        if admitted {
            mark_visible(entity.as_ref(), Visibility::Recent);
            self.admit(entity);
        }
        if entity.visibility().is_current() {
            self.clear_countdown(entity.id());
        }
        admitted
    }

    /// Swaps the indexed handle for `entity`'s id and re-files it in the
    /// order index. The recency state is kept.
    fn swap_handle(&mut self, entity: &Arc<P>) -> bool {
        let previous = match self.slots.get_mut(&entity.id()) {
            Some(RecentSlot::Active(held)) | Some(RecentSlot::Expiring { entity: held, .. }) => {
                std::mem::replace(held, Arc::clone(entity))
            },
            Some(RecentSlot::Detached { .. }) | None => return false,
        };
        self.ordered.remove(&previous);
        self.ordered.insert(Arc::clone(entity));
        true
    }

    /// Drops any countdown for `id`. Returns `true` if one existed.
    fn clear_countdown(&mut self, id: EntityId) -> bool {
        match self.slots.remove(&id) {
            Some(RecentSlot::Expiring { entity, .. }) => {
                self.slots.insert(id, RecentSlot::Active(entity));
                true
            },
            Some(RecentSlot::Detached { .. }) => true,
            Some(active) => {
                self.slots.insert(id, active);
                false
            },
            None => false,
        }
    }

    /// One step of two-phase removal. Returns `true` if the entity left
    /// the indexes.
    fn step_remove(&mut self, id: EntityId, now_ms: i64) -> bool {
        match self.slots.remove(&id) {
            None => {
                self.slots.insert(id, RecentSlot::Detached { since: now_ms });
                false
            },
            Some(RecentSlot::Active(entity)) => {
                self.slots
                    .insert(id, RecentSlot::Expiring { entity, since: now_ms });
                false
            },
            Some(RecentSlot::Expiring { entity, .. }) => {
                self.ordered.remove(&entity);
                true
            },
            Some(RecentSlot::Detached { .. }) => false,
        }
    }

    /// Drops every trace of `id`: slot, order entry and allow-list entry.
    fn forget(&mut self, id: EntityId) -> bool {
        let allowed = self.allow.revoke(id);
        match self.slots.remove(&id) {
            Some(RecentSlot::Active(entity)) | Some(RecentSlot::Expiring { entity, .. }) => {
                self.ordered.remove(&entity);
                true
            },
            Some(RecentSlot::Detached { .. }) => true,
            None => allowed,
        }
    }

    /// Finalizes every countdown started at or before `cutoff_ms`.
    fn finalize_before(&mut self, cutoff_ms: i64) -> Vec<EntityId> {
        let expired: Vec<EntityId> = self
            .slots
            .iter()
            .filter(|(_, slot)| slot.countdown().is_some_and(|since| since <= cutoff_ms))
            .map(|(&id, _)| id)
            .collect();
        for &id in &expired {
            if let Some(RecentSlot::Expiring { entity, .. }) = self.slots.remove(&id) {
                self.ordered.remove(&entity);
            }
            self.allow.revoke(id);
        }
        expired
    }

    fn check_invariants(&self) -> Result<(), InvariantError> {
        self.ordered.check_invariants()?;
        let indexed = self.slots.values().filter(|s| s.entity().is_some()).count();
        if indexed != self.ordered.len() {
            return Err(InvariantError::new(format!(
                "recency table has {indexed} indexed members, order index has {}",
                self.ordered.len()
            )));
        }
        for id in self.ordered.ids() {
            if self.slots.get(&id).and_then(RecentSlot::entity).is_none() {
                return Err(InvariantError::new(format!(
                    "id {id} is ordered but not indexed in the recency table"
                )));
            }
        }
        Ok(())
    }
}

impl<P> OrderedView<P> for RecentIndex<P>
where
    P: TrackedEntity,
{
    fn lookup(&self, id: EntityId) -> Option<&Arc<P>> {
        self.slots.get(&id).and_then(RecentSlot::entity)
    }

    fn ordered(&self) -> &OrderIndex<P> {
        &self.ordered
    }

    fn member_ids(&self) -> Vec<EntityId> {
        self.ordered.ids().collect()
    }
}

pub struct RecentCache<P> {
    inner: RwLock<RecentIndex<P>>,
    counters: CacheCounters,
}

impl<P> RecentCache<P>
where
    P: TrackedEntity,
{
    pub fn new(order: EntityOrder<P>) -> Self {
        Self {
            inner: RwLock::new(RecentIndex::new(order)),
            counters: CacheCounters::default(),
        }
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.inner.read().lookup(id).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().indexed_len() == 0
    }

    /// Two-phase removal stamped with `now_ms`.
    ///
    /// Returns `true` only on the call that drops the entity from the
    /// indexes.
    pub fn remove_at(&self, entity: &P, now_ms: i64) -> bool {
        let id = entity.id();
        let removed = self.inner.write().step_remove(id, now_ms);
        if removed {
            self.counters.record_remove();
        }
        trace!(cache = "recent", id, now_ms, removed, "remove");
        removed
    }

    /// Re-files `entity` after its sort key changed, without starting a
    /// countdown. Ids that are not indexed go through the `add` gate.
    pub fn reindex(&self, entity: &Arc<P>) -> bool {
        let mut index = self.inner.write();
        let kept = index.swap_handle(entity);
        let admitted = index.offer(entity);
        drop(index);
        trace!(cache = "recent", id = entity.id(), kept, admitted, "reindex");
        kept || admitted
    }

    /// Removes `id` in one step, skipping the countdown, and revokes it from
    /// the allow-list. Used when the record itself is deleted.
    pub fn forget(&self, id: EntityId) -> bool {
        let forgotten = self.inner.write().forget(id);
        if forgotten {
            self.counters.record_remove();
        }
        trace!(cache = "recent", id, forgotten, "forget");
        forgotten
    }

    /// Countdown stamps of every `Expiring` and `Detached` id.
    pub fn get_expiry(&self) -> FxHashMap<EntityId, i64> {
        self.inner
            .read()
            .slots
            .iter()
            .filter_map(|(&id, slot)| slot.countdown().map(|since| (id, since)))
            .collect()
    }

    /// Cancels the countdown for `id`.
    ///
    /// An indexed entity returns to `Active`; a detached record is dropped.
    pub fn remove_expiry(&self, id: EntityId) -> bool {
        self.inner.write().clear_countdown(id)
    }

    pub fn recency_state(&self, id: EntityId) -> Option<RecencyState> {
        self.inner.read().slots.get(&id).map(RecentSlot::state)
    }

    /// Finalizes every countdown started at or before `cutoff_ms` and revokes
    /// those ids from the allow-list. Returns the expired ids.
    ///
    /// Flags on the records are left to the caller.
    pub fn expire_before(&self, cutoff_ms: i64) -> Vec<EntityId> {
        let expired = self.inner.write().finalize_before(cutoff_ms);
        for _ in &expired {
            self.counters.record_remove();
        }
        if !expired.is_empty() {
            debug!(cache = "recent", cutoff_ms, expired = expired.len(), "expire");
        }
        expired
    }

    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        self.inner.read().check_invariants()
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        if let Err(err) = self.check_invariants() {
            panic!("{err}");
        }
    }
}

impl<P> EntityCache<P> for RecentCache<P>
where
    P: TrackedEntity,
{
    /// Discards every member, countdown and allow-list entry.
    fn initialize(&self, order: EntityOrder<P>) {
        let mut index = self.inner.write();
        index.slots.clear();
        index.ordered.reset(order);
        index.allow.clear();
    }

    fn add(&self, entity: &Arc<P>) -> bool {
        let admitted = self.inner.write().offer(entity);
        trace!(cache = "recent", id = entity.id(), admitted, "add");
        self.counters.record_add(admitted);
        admitted
    }

    /// Two-phase removal stamped with the wall clock.
    fn remove(&self, entity: &P) -> bool {
        self.remove_at(entity, Utc::now().timestamp_millis())
    }

    fn resort(&self, order: EntityOrder<P>) {
        let mut index = self.inner.write();
        debug!(
            cache = "recent",
            order = order.name(),
            len = index.indexed_len(),
            "resort"
        );
        index.ordered.resort(order);
        self.counters.record_resort();
    }

    fn get(&self, id: EntityId) -> Option<Arc<P>> {
        let found = self.inner.read().lookup(id).cloned();
        self.counters.record_lookup(found.is_some());
        found
    }

    fn metrics(&self) -> CacheMetricsSnapshot {
        self.counters.snapshot(self.inner.read().indexed_len())
    }
}

impl<P> BasicEntityCache<P> for RecentCache<P>
where
    P: TrackedEntity,
{
    type View = RecentIndex<P>;

    fn with_view<R>(&self, f: impl FnOnce(&Self::View) -> R) -> R {
        let index = self.inner.read();
        f(&index)
    }
}

impl<P> AllowListCache for RecentCache<P>
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
        let mut index = self.inner.write();
        let members = index.member_ids();
        index.allow.extend(members);
    }

    fn get_ids(&self) -> Vec<EntityId> {
        self.inner.read().member_ids()
    }

    fn allowed_ids(&self) -> Vec<EntityId> {
        self.inner.read().allow.to_vec()
    }

    fn revoke_id(&self, id: EntityId) -> bool {
        self.inner.write().allow.revoke(id)
    }
}

impl<P> fmt::Debug for RecentCache<P>
where
    P: TrackedEntity,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let index = self.inner.read();
        f.debug_struct("RecentCache")
            .field("len", &index.indexed_len())
            .field("tracked", &index.slots.len())
            .field("order", &index.ordered.order().name())
            .finish_non_exhaustive()
    }
}
