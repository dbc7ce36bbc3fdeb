//! Ordered containers backed by an AVL tree.
//!
//! [`AvlTreeMap`], [`AvlTreeSet`] and [`AvlTreeMultiset`] share one balanced tree
//! engine, [`tree::AvlTree`]. Besides the usual iterators, every container hands
//! out cursors: positions that can step in both directions, including back from
//! the past-the-end position.
//!
//! ```
//! use avl_containers::{AvlTreeMap, AvlTreeMultiset};
//!
//! let mut map = AvlTreeMap::new();
//! *map.get_or_insert_default("apples") += 3;
//! *map.get_or_insert_default("pears") += 1;
//! assert_eq!(map.at("apples"), Ok(&3));
//!
//! let mut end = map.end();
//! end.move_prev();
//! assert_eq!(end.key(), Ok(&"pears"));
//!
//! let bag = AvlTreeMultiset::from([10, 20, 20, 30]);
//! let (first, last) = bag.equal_range(&20);
//! assert_eq!(first.until(last).count(), bag.count(&20));
//! ```

pub mod error;
pub mod map;
pub mod multiset;
pub mod set;
pub mod tree;

pub use error::{OutOfRange, Result};
pub use map::AvlTreeMap;
pub use multiset::AvlTreeMultiset;
pub use set::AvlTreeSet;
pub use tree::Duplicates;

#[cfg(test)]
mod tests;
