//! Comparator-ordered index of entity handles.
//!
//! ## Architecture
//!
//! ```text
//!   order: EntityOrder<P>            entries: Vec<Arc<P>> (sorted)
//!   ┌─────────────────────┐          ┌─────┬─────┬─────┬─────┐
//!   │ compare(a, b)       │──────────►│  2  │  5  │  9  │ 11  │
//!   └─────────────────────┘          └─────┴─────┴─────┴─────┘
//!                                      ▲ page(1, 2) = [5, 9]
//! ```
//!
//! ## Behavior
//! - `insert`: binary search for the slot; an entity with the same id already
//!   present is a no-op. Comparator-equal entities with distinct ids are kept
//!   side by side so the index never silently drops a member.
//! - `remove`: binary search, then scan the equal run for the id; falls back
//!   to a linear scan when the entity's sort key changed after insertion.
//! - `resort`: stable O(n log n) rebuild under a new order.
//! - `page`: contiguous slice, O(1) to locate.
//!
//! ## Performance
//! - `insert` / `remove`: O(log n) search + O(n) shift
//! - `page`: O(count)
//!
//! `debug_validate_invariants()` is available in debug/test builds.

use std::cmp::Ordering;
use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::entity::{EntityId, TrackedEntity};
use crate::error::InvariantError;
use crate::order::EntityOrder;

/// Sorted set of entity handles under a swappable [`EntityOrder`].
#[derive(Debug)]
pub struct OrderIndex<P> {
    entries: Vec<Arc<P>>,
    order: EntityOrder<P>,
}

impl<P> OrderIndex<P>
where
    P: TrackedEntity,
{
    /// Creates an empty index bound to `order`.
    pub fn new(order: EntityOrder<P>) -> Self {
        Self {
            entries: Vec::new(),
            order,
        }
    }

    /// Returns the bound order.
    pub fn order(&self) -> &EntityOrder<P> {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts `entity`; returns `false` if its id is already present.
    pub fn insert(&mut self, entity: Arc<P>) -> bool {
        match self.search(&entity) {
            Ok(pos) => {
                let (lo, hi) = self.equal_run(pos, &entity);
                if self.entries[lo..hi].iter().any(|e| e.id() == entity.id()) {
                    return false;
                }
                self.entries.insert(hi, entity);
                true
            },
            Err(pos) => {
                self.entries.insert(pos, entity);
                true
            },
        }
    }

    /// Removes the entry whose id matches `entity`.
    pub fn remove(&mut self, entity: &P) -> Option<Arc<P>> {
        let id = entity.id();
        let pos = match self.search(entity) {
            Ok(pos) => {
                let (lo, hi) = self.equal_run(pos, entity);
                (lo..hi).find(|&i| self.entries[i].id() == id)
            },
            Err(_) => None,
        };
        // Sort key may have moved since insertion.
        let pos = pos.or_else(|| self.entries.iter().position(|e| e.id() == id))?;
        Some(self.entries.remove(pos))
    }

    /// Rebuilds the order under `order`.
    pub fn resort(&mut self, order: EntityOrder<P>) {
        self.order = order;
        let order = &self.order;
        self.entries.sort_by(|a, b| order.compare(a, b));
    }

    /// Drops all entries and binds `order`.
    pub fn reset(&mut self, order: EntityOrder<P>) {
        self.entries.clear();
        self.order = order;
    }

    /// Ordered iteration.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<P>> {
        self.entries.iter()
    }

    /// Skip/take window; empty when `start` is past the end.
    pub fn page(&self, start: usize, count: usize) -> &[Arc<P>] {
        let start = start.min(self.entries.len());
        let end = start.saturating_add(count).min(self.entries.len());
        &self.entries[start..end]
    }

    pub fn as_slice(&self) -> &[Arc<P>] {
        &self.entries
    }

    /// Ids in index order.
    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entries.iter().map(|e| e.id())
    }

    /// Verifies ordering and id uniqueness.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        let mut seen = FxHashSet::default();
        for entry in &self.entries {
            if !seen.insert(entry.id()) {
                return Err(InvariantError::new(format!(
                    "order index holds id {} twice",
                    entry.id()
                )));
            }
        }
        for pair in self.entries.windows(2) {
            if self.order.compare(&pair[0], &pair[1]) == Ordering::Greater {
                return Err(InvariantError::new(format!(
                    "order index out of order at ids {} > {} under `{}`",
                    pair[0].id(),
                    pair[1].id(),
                    self.order.name()
                )));
            }
        }
        Ok(())
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        if let Err(err) = self.check_invariants() {
            panic!("{err}");
        }
    }

    fn search(&self, entity: &P) -> Result<usize, usize> {
        self.entries
            .binary_search_by(|held| self.order.compare(held, entity))
    }

    /// Half-open range of entries comparing equal to `entity` around `pos`.
    fn equal_run(&self, pos: usize, entity: &P) -> (usize, usize) {
        let mut lo = pos;
        while lo > 0 && self.order.compare(&self.entries[lo - 1], entity) == Ordering::Equal {
            lo -= 1;
        }
        let mut hi = pos;
        while hi < self.entries.len()
            && self.order.compare(&self.entries[hi], entity) == Ordering::Equal
        {
            hi += 1;
        }
        (lo, hi)
    }
}
