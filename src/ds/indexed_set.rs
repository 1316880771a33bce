//! Hash index + order index pair over entity handles.
//!
//! ## Architecture
//!
//! ```text
//!   by_id: FxHashMap<EntityId, Arc<P>>      ordered: OrderIndex<P>
//!   ┌──────┬──────────┐                     ┌─────┬─────┬─────┐
//!   │  5   │ Arc<P5>  │ ─── same handles ──► │ P2  │ P5  │ P9  │
//!   │  2   │ Arc<P2>  │                     └─────┴─────┴─────┘
//!   │  9   │ Arc<P9>  │
//!   └──────┴──────────┘
//! ```
//!
//! The two indexes hold exactly the same members whenever no `&mut` borrow
//! is live. Every cache in this crate is built from one (or, for groups,
//! many) `IndexedSet`s behind a single `RwLock`.
//!
//! ## Core Operations
//! - `insert`: hash insert if the id is absent, then order insert.
//! - `remove`: hash remove by id, then order remove of the stored handle.
//! - `resort`: order index rebuild; hash index untouched.
//! - read helpers: `find_first`, `filter`, `page`, `filter_page`, `count_where`.
//!
//! `debug_validate_invariants()` is available in debug/test builds.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::ds::order_index::OrderIndex;
use crate::entity::{EntityId, TrackedEntity};
use crate::error::InvariantError;
use crate::order::EntityOrder;

/// Read access shared by every cache view.
///
/// Implemented by [`IndexedSet`] and by the recent cache's state table so the
/// query surface in [`BasicEntityCache`](crate::traits::BasicEntityCache) is
/// written once.
pub trait OrderedView<P> {
    /// Hash lookup.
    fn lookup(&self, id: EntityId) -> Option<&Arc<P>>;

    /// The order index backing ordered scans.
    fn ordered(&self) -> &OrderIndex<P>;

    /// Ids currently indexed.
    fn member_ids(&self) -> Vec<EntityId>;
}

#[derive(Debug)]
pub struct IndexedSet<P> {
    by_id: FxHashMap<EntityId, Arc<P>>,
    ordered: OrderIndex<P>,
}

impl<P> IndexedSet<P>
where
    P: TrackedEntity,
{
    pub fn new(order: EntityOrder<P>) -> Self {
        Self {
            by_id: FxHashMap::default(),
            ordered: OrderIndex::new(order),
        }
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&Arc<P>> {
        self.by_id.get(&id)
    }

    /// Inserts `entity` into both indexes; returns `false` if its id was
    /// already present (the stored handle is kept).
    pub fn insert(&mut self, entity: Arc<P>) -> bool {
        let id = entity.id();
        if self.by_id.contains_key(&id) {
            return false;
        }
        self.by_id.insert(id, Arc::clone(&entity));
        self.ordered.insert(entity);
        true
    }

    /// Removes `id` from both indexes.
    pub fn remove(&mut self, id: EntityId) -> Option<Arc<P>> {
        let stored = self.by_id.remove(&id)?;
        self.ordered.remove(&stored);
        Some(stored)
    }

    pub fn resort(&mut self, order: EntityOrder<P>) {
        self.ordered.resort(order);
    }

    /// Drops every member and binds `order`.
    pub fn reset(&mut self, order: EntityOrder<P>) {
        self.by_id.clear();
        self.ordered.reset(order);
    }

    pub fn order(&self) -> &EntityOrder<P> {
        self.ordered.order()
    }

    /// Member ids in hash order.
    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.by_id.keys().copied()
    }

    /// Detached copy of the hash index.
    pub fn snapshot_map(&self) -> FxHashMap<EntityId, Arc<P>> {
        self.by_id.clone()
    }

    /// Verifies that both indexes hold the same ids and the order holds.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        check_agreement(&self.by_id, &self.ordered)
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        if let Err(err) = self.check_invariants() {
            panic!("{err}");
        }
    }
}

impl<P> OrderedView<P> for IndexedSet<P>
where
    P: TrackedEntity,
{
    fn lookup(&self, id: EntityId) -> Option<&Arc<P>> {
        self.by_id.get(&id)
    }

    fn ordered(&self) -> &OrderIndex<P> {
        &self.ordered
    }

    fn member_ids(&self) -> Vec<EntityId> {
        self.by_id.keys().copied().collect()
    }
}

/// Shared agreement check between a hash index and an order index.
pub(crate) fn check_agreement<P, V>(
    by_id: &FxHashMap<EntityId, V>,
    ordered: &OrderIndex<P>,
) -> Result<(), InvariantError>
where
    P: TrackedEntity,
{
    ordered.check_invariants()?;
    if by_id.len() != ordered.len() {
        return Err(InvariantError::new(format!(
            "hash index has {} members, order index has {}",
            by_id.len(),
            ordered.len()
        )));
    }
    for id in ordered.ids() {
        if !by_id.contains_key(&id) {
            return Err(InvariantError::new(format!(
                "id {id} is ordered but missing from the hash index"
            )));
        }
    }
    Ok(())
}

/// Ordered scans shared by every view.
pub(crate) mod scan {
    use super::*;

    pub fn find_first<P>(
        view: &impl OrderedView<P>,
        predicate: impl Fn(&P) -> bool,
    ) -> Option<Arc<P>>
    where
        P: TrackedEntity,
    {
        view.ordered().iter().find(|e| predicate(e)).cloned()
    }

    pub fn filter<P>(view: &impl OrderedView<P>, predicate: impl Fn(&P) -> bool) -> Vec<Arc<P>>
    where
        P: TrackedEntity,
    {
        view.ordered()
            .iter()
            .filter(|e| predicate(e))
            .cloned()
            .collect()
    }

    pub fn all<P>(view: &impl OrderedView<P>) -> Vec<Arc<P>>
    where
        P: TrackedEntity,
    {
        view.ordered().as_slice().to_vec()
    }

    pub fn count_where<P>(view: &impl OrderedView<P>, predicate: impl Fn(&P) -> bool) -> usize
    where
        P: TrackedEntity,
    {
        view.ordered().iter().filter(|e| predicate(e)).count()
    }

    pub fn page<P>(view: &impl OrderedView<P>, start: usize, count: usize) -> Vec<Arc<P>>
    where
        P: TrackedEntity,
    {
        view.ordered().page(start, count).to_vec()
    }

    pub fn filter_page<P>(
        view: &impl OrderedView<P>,
        predicate: impl Fn(&P) -> bool,
        start: usize,
        count: usize,
    ) -> Vec<Arc<P>>
    where
        P: TrackedEntity,
    {
        view.ordered()
            .iter()
            .filter(|e| predicate(e))
            .skip(start)
            .take(count)
            .cloned()
            .collect()
    }
}
