//! Allow-list gate shared by the visibility caches.
//!
//! The ingestion layer pre-authorizes a batch of ids once per tick with
//! `set_ids`, then pushes many cheap `add` calls. An entity is admitted when
//! its id is on the list or its own visibility flag is already set.

use rustc_hash::FxHashSet;

use crate::entity::{EntityId, TrackedEntity, Visibility};

/// Allow-list operations exposed by [`CurrentCache`](super::CurrentCache) and
/// [`RecentCache`](super::RecentCache).
pub trait AllowListCache {
    /// Replaces the allow-list.
    fn set_ids(&self, ids: impl IntoIterator<Item = EntityId>);

    /// Empties the allow-list.
    fn clear_ids(&self);

    /// Unions the ids currently indexed into the allow-list.
    fn save_ids(&self);

    /// Ids currently indexed (what a reload should carry over).
    fn get_ids(&self) -> Vec<EntityId>;

    /// The raw allow-list.
    fn allowed_ids(&self) -> Vec<EntityId>;

    /// Drops one id from the allow-list; returns `true` if it was listed.
    fn revoke_id(&self, id: EntityId) -> bool;
}

#[derive(Debug, Default)]
pub(crate) struct AllowList {
    ids: FxHashSet<EntityId>,
}

impl AllowList {
    pub(crate) fn set(&mut self, ids: impl IntoIterator<Item = EntityId>) {
        self.ids = ids.into_iter().collect();
    }

    pub(crate) fn clear(&mut self) {
        self.ids.clear();
    }

    pub(crate) fn extend(&mut self, ids: impl IntoIterator<Item = EntityId>) {
        self.ids.extend(ids);
    }

    pub(crate) fn revoke(&mut self, id: EntityId) -> bool {
        self.ids.remove(&id)
    }

    pub(crate) fn to_vec(&self) -> Vec<EntityId> {
        self.ids.iter().copied().collect()
    }

    /// Admission test: listed id, or flag already set.
    pub(crate) fn admits<P>(&self, entity: &P, which: Visibility) -> bool
    where
        P: TrackedEntity,
    {
        self.ids.contains(&entity.id()) || entity.visibility().get(which)
    }
}

/// Marks an admitted entity as visible.
///
/// Admission writes through to the caller's record so that later reads of
/// the flag agree with cache membership. Kept as its own step so the
/// coupling can be dropped without touching the gate.
pub(crate) fn mark_visible<P>(entity: &P, which: Visibility)
where
    P: TrackedEntity,
{
    entity.visibility().set(which, true);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Player;

    #[test]
    fn admits_by_list_or_flag() {
        let mut list = AllowList::default();
        let listed = Player::new(1, "a", 1);
        let flagged = Player::new(2, "b", 1).with_visibility(true, false);
        let neither = Player::new(3, "c", 1);

        list.set([1]);
        assert!(list.admits(&listed, Visibility::Current));
        assert!(list.admits(&flagged, Visibility::Current));
        assert!(!list.admits(&flagged, Visibility::Recent));
        assert!(!list.admits(&neither, Visibility::Current));
    }

    #[test]
    fn set_replaces_and_extend_unions() {
        let mut list = AllowList::default();
        list.set([1, 2]);
        list.set([3]);
        list.extend([3, 4]);
        let mut ids = list.to_vec();
        ids.sort_unstable();
        assert_eq!(ids, vec![3, 4]);
        assert!(list.revoke(3));
        assert!(!list.revoke(3));
        list.clear();
        assert!(list.to_vec().is_empty());
    }

    #[test]
    fn mark_visible_sets_selected_flag() {
        let player = Player::new(1, "a", 1);
        mark_visible(&player, Visibility::Recent);
        assert!(player.visibility().is_recent());
        assert!(!player.visibility().is_current());
    }
}
