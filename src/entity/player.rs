//! Concrete player record.

use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::entity::{EntityId, GroupId, GroupKind, TrackedEntity, UNGROUPED, VisibilityFlags};

/// A player character seen during the session.
///
/// Name and world are part of the sort key: callers must remove the player
/// from every cache before replacing it with a record that sorts differently
/// (see [`PlayerCacheService::update_player`](crate::service::PlayerCacheService::update_player)).
#[derive(Debug)]
pub struct Player {
    id: EntityId,
    name: String,
    world_id: u32,
    world_name: String,
    free_company: String,
    notes: String,
    flags: VisibilityFlags,
    categories: RwLock<Vec<GroupId>>,
    tags: RwLock<Vec<GroupId>>,
    primary_category: AtomicU32,
}

impl Player {
    pub fn new(id: EntityId, name: impl Into<String>, world_id: u32) -> Self {
        Self {
            id,
            name: name.into(),
            world_id,
            world_name: String::new(),
            free_company: String::new(),
            notes: String::new(),
            flags: VisibilityFlags::default(),
            categories: RwLock::new(Vec::new()),
            tags: RwLock::new(Vec::new()),
            primary_category: AtomicU32::new(UNGROUPED),
        }
    }

    pub fn with_world_name(mut self, world_name: impl Into<String>) -> Self {
        self.world_name = world_name.into();
        self
    }

    pub fn with_free_company(mut self, free_company: impl Into<String>) -> Self {
        self.free_company = free_company.into();
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn with_categories(self, categories: impl IntoIterator<Item = GroupId>) -> Self {
        *self.categories.write() = categories.into_iter().collect();
        self
    }

    pub fn with_tags(self, tags: impl IntoIterator<Item = GroupId>) -> Self {
        *self.tags.write() = tags.into_iter().collect();
        self
    }

    pub fn with_visibility(self, current: bool, recent: bool) -> Self {
        self.flags.set_current(current);
        self.flags.set_recent(recent);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn world_id(&self) -> u32 {
        self.world_id
    }

    pub fn world_name(&self) -> &str {
        &self.world_name
    }

    pub fn free_company(&self) -> &str {
        &self.free_company
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn categories(&self) -> Vec<GroupId> {
        self.categories.read().clone()
    }

    pub fn tags(&self) -> Vec<GroupId> {
        self.tags.read().clone()
    }

    /// Replaces the assigned groups of `kind`.
    pub fn set_groups(&self, kind: GroupKind, groups: Vec<GroupId>) {
        *self.groups_lock(kind).write() = groups;
    }

    /// Drops `group` from the assigned groups of `kind`.
    ///
    /// Returns `true` if the group was assigned.
    pub fn unassign_group(&self, kind: GroupKind, group: GroupId) -> bool {
        let mut groups = self.groups_lock(kind).write();
        let before = groups.len();
        groups.retain(|&g| g != group);
        groups.len() != before
    }

    /// Category used as the first sort key; [`UNGROUPED`] when none is ranked.
    pub fn primary_category(&self) -> GroupId {
        self.primary_category.load(Ordering::Acquire)
    }

    /// Recomputes the primary category from `ranks` and stores it.
    pub fn refresh_primary_category(&self, ranks: &FxHashMap<GroupId, i32>) -> GroupId {
        let primary = primary_category_for(&self.categories.read(), ranks);
        self.primary_category.store(primary, Ordering::Release);
        primary
    }

    fn groups_lock(&self, kind: GroupKind) -> &RwLock<Vec<GroupId>> {
        match kind {
            GroupKind::Category => &self.categories,
            GroupKind::Tag => &self.tags,
        }
    }
}

impl Clone for Player {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: self.name.clone(),
            world_id: self.world_id,
            world_name: self.world_name.clone(),
            free_company: self.free_company.clone(),
            notes: self.notes.clone(),
            flags: self.flags.clone(),
            categories: RwLock::new(self.categories()),
            tags: RwLock::new(self.tags()),
            primary_category: AtomicU32::new(self.primary_category()),
        }
    }
}

impl TrackedEntity for Player {
    #[inline]
    fn id(&self) -> EntityId {
        self.id
    }

    #[inline]
    fn visibility(&self) -> &VisibilityFlags {
        &self.flags
    }

    fn assigned_groups(&self, kind: GroupKind) -> Vec<GroupId> {
        self.groups_lock(kind).read().clone()
    }
}

/// Picks the assigned category with the lowest rank.
///
/// Categories missing from `ranks` are skipped; ties keep the first assigned.
pub fn primary_category_for(categories: &[GroupId], ranks: &FxHashMap<GroupId, i32>) -> GroupId {
    let mut primary = UNGROUPED;
    let mut best = i32::MAX;
    for category in categories {
        let Some(&rank) = ranks.get(category) else {
            continue;
        };
        if rank < best {
            best = rank;
            primary = *category;
        }
    }
    primary
}
