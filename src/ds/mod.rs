pub mod arena;
pub mod indexed_set;
pub mod order_index;

pub use arena::EntityArena;
pub use indexed_set::{IndexedSet, OrderedView};
pub use order_index::OrderIndex;
