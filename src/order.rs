//! Runtime-swappable total orders over tracked entities.
//!
//! An [`EntityOrder`] is an injected comparison strategy. Order indexes are
//! parameterized over one, and `resort` swaps it for another and rebuilds.
//!
//! ## Example Usage
//!
//! ```
//! use std::cmp::Ordering;
//!
//! use rosterkit::entity::Player;
//! use rosterkit::order::EntityOrder;
//!
//! let by_name = EntityOrder::<Player>::new("name", |a, b| a.name().cmp(b.name()));
//! let a = Player::new(1, "Alys", 1);
//! let b = Player::new(2, "Bran", 1);
//! assert_eq!(by_name.compare(&a, &b), Ordering::Less);
//! assert_eq!(by_name.reversed().compare(&a, &b), Ordering::Greater);
//! ```
//!
//! Comparators must be total: consistent, and never `Equal` for two distinct
//! ids if callers want a deterministic order. [`EntityOrder::then_by_id`]
//! turns any partial key into a total one.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::entity::{GroupId, Player, TrackedEntity, UNGROUPED};

type CompareFn<P> = dyn Fn(&P, &P) -> Ordering + Send + Sync;

/// Rank given to categories the rank table does not mention.
pub const DEFAULT_CATEGORY_RANK: i32 = 99;

/// A named, cheaply clonable comparison strategy.
pub struct EntityOrder<P> {
    name: Arc<str>,
    compare: Arc<CompareFn<P>>,
}

impl<P> EntityOrder<P> {
    /// Wraps a comparison function.
    pub fn new<F>(name: impl Into<Arc<str>>, compare: F) -> Self
    where
        F: Fn(&P, &P) -> Ordering + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            compare: Arc::new(compare),
        }
    }

    #[inline]
    pub fn compare(&self, a: &P, b: &P) -> Ordering {
        (self.compare)(a, b)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<P: 'static> EntityOrder<P> {
    /// Same strategy, opposite direction.
    pub fn reversed(&self) -> Self {
        let inner = Arc::clone(&self.compare);
        Self {
            name: format!("{}.rev", self.name).into(),
            compare: Arc::new(move |a: &P, b: &P| inner(b, a)),
        }
    }
}

impl<P: TrackedEntity + 'static> EntityOrder<P> {
    /// Ascending by id.
    pub fn by_id() -> Self {
        Self::new("id", |a: &P, b: &P| a.id().cmp(&b.id()))
    }

    /// Breaks ties of this strategy by ascending id.
    pub fn then_by_id(&self) -> Self {
        let inner = Arc::clone(&self.compare);
        Self {
            name: format!("{}+id", self.name).into(),
            compare: Arc::new(move |a: &P, b: &P| inner(a, b).then_with(|| a.id().cmp(&b.id()))),
        }
    }
}

impl<P> Clone for EntityOrder<P> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            compare: Arc::clone(&self.compare),
        }
    }
}

impl<P> fmt::Debug for EntityOrder<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityOrder")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Player list order: category rank, then name (case-insensitive), then
/// world, then id.
///
/// Players whose primary category is [`UNGROUPED`] take `no_category_rank`;
/// categories absent from `ranks` take [`DEFAULT_CATEGORY_RANK`].
pub fn player_order(ranks: &FxHashMap<GroupId, i32>, no_category_rank: i32) -> EntityOrder<Player> {
    let mut ranks = ranks.clone();
    ranks.insert(UNGROUPED, no_category_rank);
    EntityOrder::new("player", move |a: &Player, b: &Player| {
        let rank = |p: &Player| {
            ranks
                .get(&p.primary_category())
                .copied()
                .unwrap_or(DEFAULT_CATEGORY_RANK)
        };
        rank(a)
            .cmp(&rank(b))
            .then_with(|| cmp_ignore_case(a.name(), b.name()))
            .then_with(|| a.world_id().cmp(&b.world_id()))
            .then_with(|| a.id().cmp(&b.id()))
    })
}

fn cmp_ignore_case(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn by_id_and_reversed() {
        let order = EntityOrder::<Player>::by_id();
        let a = Player::new(1, "x", 0);
        let b = Player::new(2, "x", 0);
        assert_eq!(order.compare(&a, &b), Ordering::Less);
        assert_eq!(order.reversed().compare(&a, &b), Ordering::Greater);
        assert_eq!(order.reversed().name(), "id.rev");
    }

    #[test]
    fn then_by_id_breaks_ties() {
        let flat = EntityOrder::<Player>::new("flat", |_, _| Ordering::Equal);
        let a = Player::new(3, "x", 0);
        let b = Player::new(4, "x", 0);
        assert_eq!(flat.compare(&a, &b), Ordering::Equal);
        assert_eq!(flat.then_by_id().compare(&a, &b), Ordering::Less);
    }

    #[test]
    fn player_order_ranks_then_name_then_world() {
        let ranks: FxHashMap<GroupId, i32> = [(10, 1), (20, 2)].into_iter().collect();
        let order = player_order(&ranks, 50);

        let friend = Player::new(1, "zed", 1).with_categories([10]);
        friend.refresh_primary_category(&ranks);
        let guild = Player::new(2, "amy", 1).with_categories([20]);
        guild.refresh_primary_category(&ranks);
        let stranger = Player::new(3, "Abe", 1);

        assert_eq!(order.compare(&friend, &guild), Ordering::Less);
        assert_eq!(order.compare(&guild, &stranger), Ordering::Less);

        let abe_low = Player::new(4, "abe", 1);
        let abe_high = Player::new(5, "ABE", 2);
        assert_eq!(order.compare(&abe_low, &abe_high), Ordering::Less);
        assert_eq!(order.compare(&stranger, &abe_low), Ordering::Less);
    }

    #[test]
    fn player_order_unranked_category_uses_default_rank() {
        let ranks: FxHashMap<GroupId, i32> = FxHashMap::default();
        let order = player_order(&ranks, 0);
        let ungrouped = Player::new(1, "b", 1);
        let orphan = Player::new(2, "a", 1).with_categories([42]);
        let stale: FxHashMap<GroupId, i32> = [(42, 1)].into_iter().collect();
        orphan.refresh_primary_category(&stale);
        assert_eq!(order.compare(&ungrouped, &orphan), Ordering::Less);
    }
}
