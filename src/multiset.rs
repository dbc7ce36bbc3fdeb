//! An ordered multiset implemented with an AVL tree.
//!
//! Equal values are kept side by side in iteration order, the most recently
//! inserted one first.

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::iter::FromIterator;

use crate::set::{Cursor, CursorMut, IntoIter, Iter};
use crate::tree::{AvlTree, Duplicates};

/// An ordered multiset implemented with an AVL tree.
///
/// ```
/// use avl_containers::AvlTreeMultiset;
/// let set = AvlTreeMultiset::from([10, 20, 20, 30]);
/// assert_eq!(set.count(&20), 2);
/// assert_eq!(set.lower_bound(&20).get(), Ok(&20));
/// assert_eq!(set.upper_bound(&20).get(), Ok(&30));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct AvlTreeMultiset<T> {
    tree: AvlTree<T, ()>,
}

impl<T> AvlTreeMultiset<T> {
    /// Creates an empty multiset.
    /// No memory is allocated until the first item is inserted.
    pub fn new() -> Self {
        Self {
            tree: AvlTree::new(),
        }
    }

    /// Returns true if the multiset contains no elements.
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Returns the number of elements in the multiset, counting duplicates.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns the largest number of elements the multiset could address.
    pub fn max_size(&self) -> usize {
        self.tree.max_size()
    }

    /// Clears the multiset, deallocating all memory.
    pub fn clear(&mut self) {
        self.tree.clear();
    }

    /// Exchanges the contents of two multisets.
    pub fn swap(&mut self, other: &mut Self) {
        self.tree.swap(&mut other.tree);
    }

    /// Returns a cursor at the first value.
    pub fn begin(&self) -> Cursor<'_, T> {
        Cursor::wrap(self.tree.begin())
    }

    /// Returns the past-the-end cursor.
    pub fn end(&self) -> Cursor<'_, T> {
        Cursor::wrap(self.tree.end())
    }

    /// Returns a mutable cursor at the first value.
    pub fn begin_mut(&mut self) -> CursorMut<'_, T> {
        CursorMut::wrap(self.tree.begin_mut())
    }

    /// Gets an iterator over the values in sorted order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::wrap(self.tree.iter())
    }
}

impl<T: Ord> AvlTreeMultiset<T> {
    /// Inserts a value, even if equal values are already present.
    ///
    /// The new value is placed in front of the values equal to it.
    /// Returns a cursor at the new value.
    pub fn insert(&mut self, value: T) -> Cursor<'_, T> {
        Cursor::wrap(self.tree.insert(value, (), Duplicates::Allow).0)
    }

    /// Inserts all values in order. Every value is inserted.
    pub fn insert_many<I>(&mut self, values: I) -> Vec<bool>
    where
        I: IntoIterator<Item = T>,
    {
        values
            .into_iter()
            .map(|value| {
                self.insert(value);
                true
            })
            .collect()
    }

    /// Returns true if the multiset contains at least one value equal to `value`.
    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.contains(value)
    }

    /// Returns the number of values equal to `value`.
    pub fn count<Q>(&self, value: &Q) -> usize
    where
        T: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let (first, last) = self.equal_range(value);
        first.distance_to(&last)
    }

    /// Returns cursors delimiting the values equal to `value`,
    /// `[lower_bound(value), upper_bound(value))`.
    pub fn equal_range<Q>(&self, value: &Q) -> (Cursor<'_, T>, Cursor<'_, T>)
    where
        T: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        (self.lower_bound(value), self.upper_bound(value))
    }

    /// Returns a cursor at one of the values equal to `value`, or past-the-end.
    pub fn find<Q>(&self, value: &Q) -> Cursor<'_, T>
    where
        T: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        Cursor::wrap(self.tree.find(value))
    }

    /// Returns a mutable cursor at one of the values equal to `value`, or past-the-end.
    pub fn find_mut<Q>(&mut self, value: &Q) -> CursorMut<'_, T>
    where
        T: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        CursorMut::wrap(self.tree.find_mut(value))
    }

    /// Returns a cursor at the first value not less than `value`.
    pub fn lower_bound<Q>(&self, value: &Q) -> Cursor<'_, T>
    where
        T: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        Cursor::wrap(self.tree.lower_bound(value))
    }

    /// Returns a mutable cursor at the first value not less than `value`.
    pub fn lower_bound_mut<Q>(&mut self, value: &Q) -> CursorMut<'_, T>
    where
        T: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        CursorMut::wrap(self.tree.lower_bound_mut(value))
    }

    /// Returns a cursor at the first value greater than `value`.
    pub fn upper_bound<Q>(&self, value: &Q) -> Cursor<'_, T>
    where
        T: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        Cursor::wrap(self.tree.upper_bound(value))
    }

    /// Removes one value equal to `value`.
    /// Returns whether such a value was present.
    pub fn remove_one<Q>(&mut self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.remove(value).is_some()
    }

    /// Removes every value equal to `value` and returns how many were removed.
    pub fn remove_all<Q>(&mut self, value: &Q) -> usize
    where
        T: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut cursor = self.lower_bound_mut(value);
        let mut removed = 0;
        while matches!(cursor.get(), Ok(stored) if value.cmp(stored.borrow()) == Ordering::Equal) {
            cursor.remove_current();
            removed += 1;
        }
        removed
    }

    /// Moves every value of `other` into `self`, leaving `other` empty.
    pub fn merge(&mut self, other: &mut Self) {
        self.tree.merge(&mut other.tree, Duplicates::Allow);
    }

    /// Asserts that the internal tree structure is consistent.
    #[cfg(any(test, feature = "consistency_check"))]
    pub fn check_consistency(&self) {
        self.tree.check_consistency();
    }
}

impl<T> Default for AvlTreeMultiset<T> {
    /// Creates an empty multiset.
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord> FromIterator<T> for AvlTreeMultiset<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<T: Ord, const N: usize> From<[T; N]> for AvlTreeMultiset<T> {
    fn from(values: [T; N]) -> Self {
        values.into_iter().collect()
    }
}

impl<T: Ord> Extend<T> for AvlTreeMultiset<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        iter.into_iter().for_each(move |value| {
            self.insert(value);
        });
    }
}

impl<T: fmt::Debug> fmt::Debug for AvlTreeMultiset<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<'a, T> IntoIterator for &'a AvlTreeMultiset<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T> IntoIterator for AvlTreeMultiset<T> {
    type Item = T;
    type IntoIter = IntoIter<T>;
    fn into_iter(self) -> Self::IntoIter {
        IntoIter::wrap(self.tree.into_iter())
    }
}
