//! Owning table of entity records.
//!
//! Caches only hold `Arc<P>` handles; the arena is the one place a record is
//! created, replaced or dropped. Handles never point back at the arena, so
//! there are no reference cycles.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::entity::{EntityId, TrackedEntity};

#[derive(Debug)]
pub struct EntityArena<P> {
    inner: RwLock<FxHashMap<EntityId, Arc<P>>>,
}

impl<P> EntityArena<P>
where
    P: TrackedEntity,
{
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(FxHashMap::default()),
        }
    }

    /// Stores `entity`, returning the new handle and the replaced one.
    pub fn insert(&self, entity: P) -> (Arc<P>, Option<Arc<P>>) {
        let handle = Arc::new(entity);
        let previous = self.inner.write().insert(handle.id(), Arc::clone(&handle));
        (handle, previous)
    }

    pub fn remove(&self, id: EntityId) -> Option<Arc<P>> {
        self.inner.write().remove(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<Arc<P>> {
        self.inner.read().get(&id).cloned()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.inner.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Replaces every record and returns the stored handles in input order.
    ///
    /// A repeated id keeps its last record; earlier records for that id are
    /// dropped and not returned.
    pub fn replace_all(&self, entities: impl IntoIterator<Item = P>) -> Vec<Arc<P>> {
        let handles: Vec<Arc<P>> = entities.into_iter().map(Arc::new).collect();
        let mut table = self.inner.write();
        table.clear();
        for handle in &handles {
            table.insert(handle.id(), Arc::clone(handle));
        }
        handles
            .into_iter()
            .filter(|handle| {
                table
                    .get(&handle.id())
                    .is_some_and(|stored| Arc::ptr_eq(stored, handle))
            })
            .collect()
    }

    /// Detached list of every handle (unordered).
    pub fn handles(&self) -> Vec<Arc<P>> {
        self.inner.read().values().cloned().collect()
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }
}

impl<P> Default for EntityArena<P>
where
    P: TrackedEntity,
{
    fn default() -> Self {
        Self::new()
    }
}
