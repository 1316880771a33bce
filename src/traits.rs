//! # Cache Trait Hierarchy
//!
//! Every cache in this crate pairs a hash index with an order index behind a
//! single `RwLock`. The traits below split the surface into the write
//! contract all caches share, the flat query surface, and the per-group
//! query surface.
//!
//! ## Architecture
//!
//! ```text
//!                     ┌───────────────────────────────────────┐
//!                     │          EntityCache<P>               │
//!                     │                                       │
//!                     │  initialize(order)                    │
//!                     │  add(&Arc<P>) → bool                  │
//!                     │  remove(&P) → bool                    │
//!                     │  resort(order)                        │
//!                     │  get(id) → Option<Arc<P>>             │
//!                     │  metrics() → CacheMetricsSnapshot     │
//!                     └──────────────────┬────────────────────┘
//!                                        │
//!               ┌────────────────────────┴───────────────────────┐
//!               ▼                                                ▼
//!   ┌──────────────────────────────┐          ┌───────────────────────────────────┐
//!   │  BasicEntityCache<P>         │          │  GroupedEntityCache<P>            │
//!   │                              │          │                                   │
//!   │  find_first(pred)            │          │  add_group / remove_group         │
//!   │  get_where(pred)             │          │  find_first_in(group, pred)       │
//!   │  get_all()                   │          │  get_all_in(group)                │
//!   │  count() / count_where(pred) │          │  page_in / page_where_in          │
//!   │  page(start, count)          │          │  count_in / count_where_in        │
//!   │  page_where(pred, s, c)      │          │  get_group(group)                 │
//!   └──────────────────────────────┘          └───────────────────────────────────┘
//!      PrimaryCache, CurrentCache,                 GroupCache (category, tag)
//!      RecentCache
//! ```
//!
//! ## Snapshot semantics
//!
//! Every read takes the shared guard, copies the handles it returns into a
//! fresh `Vec`, and releases the guard. Later writes are never reflected in a
//! list that was already returned.
//!
//! ## Pagination
//!
//! `page(start, count)` is skip/take over the order index. A `start` past the
//! end yields an empty list. `page_where` filters first, then skips/takes
//! over the filtered sequence.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::ds::indexed_set::{IndexedSet, OrderedView, scan};
use crate::entity::{EntityId, GroupId, GroupKind, TrackedEntity};
use crate::metrics::CacheMetricsSnapshot;
use crate::order::EntityOrder;

/// Write contract shared by every cache.
pub trait EntityCache<P>
where
    P: TrackedEntity,
{
    /// Discards every entry and binds `order`.
    fn initialize(&self, order: EntityOrder<P>);

    /// Indexes `entity`. Returns `true` if the call admitted the entity
    /// (duplicates report `true` without re-inserting).
    fn add(&self, entity: &Arc<P>) -> bool;

    /// Removes `entity` by id. Returns `true` if it left the indexes.
    fn remove(&self, entity: &P) -> bool;

    /// Rebuilds the order index under `order`.
    fn resort(&self, order: EntityOrder<P>);

    /// Hash lookup.
    fn get(&self, id: EntityId) -> Option<Arc<P>>;

    /// Counter snapshot.
    fn metrics(&self) -> CacheMetricsSnapshot;
}

/// Flat query surface over one hash/order index pair.
pub trait BasicEntityCache<P>: EntityCache<P>
where
    P: TrackedEntity,
{
    type View: OrderedView<P>;

    /// Runs `f` against the indexes under the shared guard.
    fn with_view<R>(&self, f: impl FnOnce(&Self::View) -> R) -> R;

    /// First entity in order matching `predicate`.
    fn find_first(&self, predicate: impl Fn(&P) -> bool) -> Option<Arc<P>> {
        self.with_view(|view| scan::find_first(view, predicate))
    }

    /// Every entity matching `predicate`, in order.
    fn get_where(&self, predicate: impl Fn(&P) -> bool) -> Vec<Arc<P>> {
        self.with_view(|view| scan::filter(view, predicate))
    }

    /// Every entity, in order.
    fn get_all(&self) -> Vec<Arc<P>> {
        self.with_view(|view| scan::all(view))
    }

    fn count(&self) -> usize {
        self.with_view(|view| view.ordered().len())
    }

    fn count_where(&self, predicate: impl Fn(&P) -> bool) -> usize {
        self.with_view(|view| scan::count_where(view, predicate))
    }

    /// Skip `start`, take `count`.
    fn page(&self, start: usize, count: usize) -> Vec<Arc<P>> {
        self.with_view(|view| scan::page(view, start, count))
    }

    /// Filter, then skip `start` and take `count`.
    fn page_where(
        &self,
        predicate: impl Fn(&P) -> bool,
        start: usize,
        count: usize,
    ) -> Vec<Arc<P>> {
        self.with_view(|view| scan::filter_page(view, predicate, start, count))
    }
}

/// Per-group query surface. Unknown group ids yield empty results.
pub trait GroupedEntityCache<P>: EntityCache<P>
where
    P: TrackedEntity,
{
    /// Runs `f` against one group's indexes under the shared guard.
    fn with_group<R>(&self, group: GroupId, f: impl FnOnce(&IndexedSet<P>) -> R) -> Option<R>;

    /// Creates an empty group if absent.
    fn add_group(&self, group: GroupId);

    /// Drops a group's indexes; entities are untouched.
    fn remove_group(&self, group: GroupId) -> bool;

    fn find_first_in(&self, group: GroupId, predicate: impl Fn(&P) -> bool) -> Option<Arc<P>> {
        self.with_group(group, |set| scan::find_first(set, predicate))
            .flatten()
    }

    fn get_all_in(&self, group: GroupId) -> Vec<Arc<P>> {
        self.with_group(group, |set| scan::all(set))
            .unwrap_or_default()
    }

    fn page_in(&self, group: GroupId, start: usize, count: usize) -> Vec<Arc<P>> {
        self.with_group(group, |set| scan::page(set, start, count))
            .unwrap_or_default()
    }

    fn page_where_in(
        &self,
        group: GroupId,
        predicate: impl Fn(&P) -> bool,
        start: usize,
        count: usize,
    ) -> Vec<Arc<P>> {
        self.with_group(group, |set| scan::filter_page(set, predicate, start, count))
            .unwrap_or_default()
    }

    fn count_in(&self, group: GroupId) -> usize {
        self.with_group(group, |set| set.len()).unwrap_or(0)
    }

    fn count_where_in(&self, group: GroupId, predicate: impl Fn(&P) -> bool) -> usize {
        self.with_group(group, |set| scan::count_where(set, predicate))
            .unwrap_or(0)
    }

    /// Detached copy of one group's hash index.
    fn get_group(&self, group: GroupId) -> Option<FxHashMap<EntityId, Arc<P>>> {
        self.with_group(group, |set| set.snapshot_map())
    }
}

/// Lists the groups that exist outside the cache.
///
/// Consulted by [`GroupCache::initialize`](crate::cache::GroupCache) and by
/// the coordinator when building the player order.
pub trait GroupSource: Send + Sync {
    /// Every known group id of `kind` (excluding [`UNGROUPED`](crate::entity::UNGROUPED)).
    fn group_ids(&self, kind: GroupKind) -> Vec<GroupId>;

    /// Category rank table; lower ranks sort first.
    fn category_ranks(&self) -> FxHashMap<GroupId, i32> {
        FxHashMap::default()
    }
}
