//! Entity contract consumed by every cache.
//!
//! Caches never own or construct entity records. They index `Arc<P>` handles
//! handed out by an [`EntityArena`](crate::ds::EntityArena) and only touch
//! three things on the record:
//!
//! - the stable id,
//! - the visibility flags (read, and force-set on admission),
//! - the assigned-group lists for one [`GroupKind`].
//!
//! ```text
//!   EntityArena (owner)            caches (handles only)
//!   ┌──────────────────┐           ┌──────────────┐
//!   │ 5 ─► Arc<Player> │──clone───►│ PrimaryCache │
//!   │ 2 ─► Arc<Player> │──clone───►│ CurrentCache │
//!   │ 9 ─► Arc<Player> │──clone───►│ GroupCache   │ (fan-out: one Arc, N groups)
//!   └──────────────────┘           └──────────────┘
//! ```

pub mod player;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

pub use player::Player;

/// Stable identifier of a tracked entity.
pub type EntityId = u32;

/// Identifier of a category or tag group.
pub type GroupId = u32;

/// Reserved group holding entities with no assigned group.
pub const UNGROUPED: GroupId = 0;

/// Which assigned-group list a [`GroupCache`](crate::cache::GroupCache) reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupKind {
    Category,
    Tag,
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Category => f.write_str("category"),
            Self::Tag => f.write_str("tag"),
        }
    }
}

/// Which visibility flag a subset cache gates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Current,
    Recent,
}

/// Membership flags shared between the ingestion layer and the caches.
///
/// Atomics let a cache force-set a flag through a shared `Arc<P>` handle
/// while other caches hold the same handle.
#[derive(Debug, Default)]
pub struct VisibilityFlags {
    current: AtomicBool,
    recent: AtomicBool,
}

impl VisibilityFlags {
    pub fn new(current: bool, recent: bool) -> Self {
        Self {
            current: AtomicBool::new(current),
            recent: AtomicBool::new(recent),
        }
    }

    #[inline]
    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_recent(&self) -> bool {
        self.recent.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set_current(&self, value: bool) {
        self.current.store(value, Ordering::Release);
    }

    #[inline]
    pub fn set_recent(&self, value: bool) {
        self.recent.store(value, Ordering::Release);
    }

    /// Reads the flag selected by `which`.
    #[inline]
    pub fn get(&self, which: Visibility) -> bool {
        match which {
            Visibility::Current => self.is_current(),
            Visibility::Recent => self.is_recent(),
        }
    }

    /// Writes the flag selected by `which`.
    #[inline]
    pub fn set(&self, which: Visibility, value: bool) {
        match which {
            Visibility::Current => self.set_current(value),
            Visibility::Recent => self.set_recent(value),
        }
    }
}

impl Clone for VisibilityFlags {
    fn clone(&self) -> Self {
        Self::new(self.is_current(), self.is_recent())
    }
}

/// A record the caches can index.
///
/// Implementors must keep `id()` stable for the lifetime of the record.
/// Group lists may change while the record is indexed; group caches clean
/// up by presence, not by re-reading the list.
pub trait TrackedEntity: Send + Sync {
    /// Stable identifier.
    fn id(&self) -> EntityId;

    /// Visibility flags, force-set by subset caches on admission.
    fn visibility(&self) -> &VisibilityFlags;

    /// Snapshot of the assigned groups of `kind`, in assignment order.
    fn assigned_groups(&self, kind: GroupKind) -> Vec<GroupId>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_select_by_visibility() {
        let flags = VisibilityFlags::default();
        assert!(!flags.get(Visibility::Current));
        flags.set(Visibility::Current, true);
        assert!(flags.is_current());
        assert!(!flags.is_recent());
        flags.set(Visibility::Recent, true);
        assert!(flags.get(Visibility::Recent));
    }

    #[test]
    fn flags_clone_copies_state() {
        let flags = VisibilityFlags::new(true, false);
        let copy = flags.clone();
        flags.set_current(false);
        assert!(copy.is_current());
    }

    #[test]
    fn group_kind_display() {
        assert_eq!(GroupKind::Category.to_string(), "category");
        assert_eq!(GroupKind::Tag.to_string(), "tag");
    }
}
