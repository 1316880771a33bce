//! The four entity caches.
//!
//! | Cache            | Membership                                   | Extra state            |
//! |------------------|----------------------------------------------|------------------------|
//! | [`PrimaryCache`] | every entity added                           | none                   |
//! | [`CurrentCache`] | allow-listed or `is_current`                 | allow-list             |
//! | [`RecentCache`]  | allow-listed or `is_recent`                  | allow-list, countdowns |
//! | [`GroupCache`]   | fan-out over assigned categories or tags     | one index per group    |
//!
//! The caches are independent: nothing propagates a write from one to
//! another. [`PlayerCacheService`](crate::service::PlayerCacheService) drives
//! all of them for the shipped [`Player`](crate::entity::Player) record.

mod allow_list;
pub mod current;
pub mod group;
pub mod primary;
pub mod recent;

pub use allow_list::AllowListCache;
pub use current::CurrentCache;
pub use group::{GroupCache, StaticGroups};
pub use primary::PrimaryCache;
pub use recent::{RecencyState, RecentCache, RecentIndex};
