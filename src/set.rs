//! An ordered set implemented with an AVL tree.

use std::borrow::Borrow;
use std::fmt;
use std::iter::{FromIterator, FusedIterator};

use crate::error::Result;
use crate::tree::{self, AvlTree, Duplicates};

/// An ordered set implemented with an AVL tree.
///
/// ```
/// use avl_containers::AvlTreeSet;
/// let mut set = AvlTreeSet::new();
/// set.insert(0);
/// set.insert(1);
/// set.insert(2);
/// assert_eq!(set.get(&1), Some(&1));
/// set.remove(&1);
/// assert!(set.get(&1).is_none());
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct AvlTreeSet<T> {
    tree: AvlTree<T, ()>,
}

/// A read-only position in an [`AvlTreeSet`] or an
/// [`AvlTreeMultiset`](crate::AvlTreeMultiset).
pub struct Cursor<'a, T> {
    inner: tree::Cursor<'a, T, ()>,
}

/// A position in a set or multiset that allows removing values.
pub struct CursorMut<'a, T> {
    inner: tree::CursorMut<'a, T, ()>,
}

/// An iterator over the values of a set.
pub struct Iter<'a, T> {
    inner: tree::Iter<'a, T, ()>,
}

/// An owning iterator over the values of a set.
pub struct IntoIter<T> {
    inner: tree::IntoIter<T, ()>,
}

impl<T> AvlTreeSet<T> {
    /// Creates an empty set.
    /// No memory is allocated until the first item is inserted.
    pub fn new() -> Self {
        Self {
            tree: AvlTree::new(),
        }
    }

    /// Returns true if the set contains no elements.
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Returns the number of elements in the set.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns the largest number of elements the set could address.
    pub fn max_size(&self) -> usize {
        self.tree.max_size()
    }

    /// Clears the set, deallocating all memory.
    pub fn clear(&mut self) {
        self.tree.clear();
    }

    /// Exchanges the contents of two sets.
    pub fn swap(&mut self, other: &mut Self) {
        self.tree.swap(&mut other.tree);
    }

    /// Returns a cursor at the smallest value.
    pub fn begin(&self) -> Cursor<'_, T> {
        Cursor::wrap(self.tree.begin())
    }

    /// Returns the past-the-end cursor.
    pub fn end(&self) -> Cursor<'_, T> {
        Cursor::wrap(self.tree.end())
    }

    /// Returns a mutable cursor at the smallest value.
    pub fn begin_mut(&mut self) -> CursorMut<'_, T> {
        CursorMut::wrap(self.tree.begin_mut())
    }

    /// Gets an iterator over the values of the set in sorted order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::wrap(self.tree.iter())
    }
}

impl<T: Ord> AvlTreeSet<T> {
    /// Returns a reference to the value in the set that is equal to the given value.
    ///
    /// The value may be any borrowed form of the set's value type, but the ordering
    /// on the borrowed form *must* match the ordering on the value type.
    pub fn get<Q>(&self, value: &Q) -> Option<&T>
    where
        T: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.get_key_value(value).map(|kv| kv.0)
    }

    /// Returns true if the set contains a value.
    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.contains(value)
    }

    /// Inserts a value into the set.
    ///
    /// Returns a cursor at the stored value and whether the value was inserted;
    /// a value already in the set is not replaced.
    pub fn insert(&mut self, value: T) -> (Cursor<'_, T>, bool) {
        let (inner, inserted) = self.tree.insert(value, (), Duplicates::Reject);
        (Cursor::wrap(inner), inserted)
    }

    /// Inserts all values in order and reports for each whether it was inserted.
    pub fn insert_many<I>(&mut self, values: I) -> Vec<bool>
    where
        I: IntoIterator<Item = T>,
    {
        values
            .into_iter()
            .map(|value| self.insert(value).1)
            .collect()
    }

    /// Removes a value from the set.
    /// Returns whether the value was previously in the set.
    pub fn remove<Q>(&mut self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.remove(value).is_some()
    }

    /// Removes a value from the set.
    /// Returns the value if it was previously in the set.
    pub fn take<Q>(&mut self, value: &Q) -> Option<T>
    where
        T: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.remove(value).map(|(k, _)| k)
    }

    /// Returns a cursor at the given value, or past-the-end.
    pub fn find<Q>(&self, value: &Q) -> Cursor<'_, T>
    where
        T: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        Cursor::wrap(self.tree.find(value))
    }

    /// Returns a mutable cursor at the given value, or past-the-end.
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

    /// Returns a cursor at the first value greater than `value`.
    pub fn upper_bound<Q>(&self, value: &Q) -> Cursor<'_, T>
    where
        T: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        Cursor::wrap(self.tree.upper_bound(value))
    }

    /// Moves the values of `other` that are not yet in `self` into `self`.
    ///
    /// Values already present in `self` stay in `other`.
    pub fn merge(&mut self, other: &mut Self) {
        self.tree.merge(&mut other.tree, Duplicates::Reject);
    }

    /// Asserts that the internal tree structure is consistent.
    #[cfg(any(test, feature = "consistency_check"))]
    pub fn check_consistency(&self) {
        self.tree.check_consistency();
        let mut values = self.iter();
        if let Some(mut prev) = values.next() {
            for value in values {
                assert!(prev < value);
                prev = value;
            }
        }
    }
}

impl<T> Default for AvlTreeSet<T> {
    /// Creates an empty set.
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord> FromIterator<T> for AvlTreeSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<T: Ord, const N: usize> From<[T; N]> for AvlTreeSet<T> {
    fn from(values: [T; N]) -> Self {
        values.into_iter().collect()
    }
}

impl<T: fmt::Debug> fmt::Debug for AvlTreeSet<T> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_set().entries(self.iter()).finish()
    }
}

impl<'a, T> IntoIterator for &'a AvlTreeSet<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T> IntoIterator for AvlTreeSet<T> {
    type Item = T;
    type IntoIter = IntoIter<T>;
    fn into_iter(self) -> Self::IntoIter {
        IntoIter::wrap(self.tree.into_iter())
    }
}

impl<T: Ord> Extend<T> for AvlTreeSet<T> {
    fn extend<I>(&mut self, iter: I)
    where
        I: IntoIterator<Item = T>,
    {
        iter.into_iter().for_each(move |value| {
            self.insert(value);
        });
    }
}

impl<'a, T> Extend<&'a T> for AvlTreeSet<T>
where
    T: Ord + Copy,
    T: 'a,
{
    fn extend<I>(&mut self, iter: I)
    where
        I: IntoIterator<Item = &'a T>,
    {
        self.extend(iter.into_iter().copied());
    }
}

impl<'a, T> Cursor<'a, T> {
    pub(crate) fn wrap(inner: tree::Cursor<'a, T, ()>) -> Self {
        Self { inner }
    }

    /// Returns true if the cursor is past-the-end.
    pub fn is_end(&self) -> bool {
        self.inner.is_end()
    }

    /// Moves the cursor to the next value. At the end position this does nothing.
    pub fn move_next(&mut self) {
        self.inner.move_next();
    }

    /// Moves the cursor to the previous value.
    /// Moving from the end position reaches the largest value.
    pub fn move_prev(&mut self) {
        self.inner.move_prev();
    }

    /// Returns the value the cursor points to.
    pub fn get(&self) -> Result<&'a T> {
        self.inner.key()
    }

    /// Counts the forward steps needed to reach `other`.
    pub fn distance_to(&self, other: &Self) -> usize {
        self.inner.distance_to(&other.inner)
    }

    /// Gets an iterator over the values from this cursor up to, excluding, `end`.
    pub fn until(self, end: Self) -> Iter<'a, T> {
        Iter::wrap(self.inner.until(end.inner))
    }
}

impl<T> Clone for Cursor<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Cursor<'_, T> {}

impl<T> PartialEq for Cursor<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<T> Eq for Cursor<'_, T> {}

impl<T: fmt::Debug> fmt::Debug for Cursor<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Cursor").field(&self.get().ok()).finish()
    }
}

impl<'a, T> CursorMut<'a, T> {
    pub(crate) fn wrap(inner: tree::CursorMut<'a, T, ()>) -> Self {
        Self { inner }
    }

    /// Returns true if the cursor is past-the-end.
    pub fn is_end(&self) -> bool {
        self.inner.is_end()
    }

    /// Moves the cursor to the next value. At the end position this does nothing.
    pub fn move_next(&mut self) {
        self.inner.move_next();
    }

    /// Moves the cursor to the previous value.
    pub fn move_prev(&mut self) {
        self.inner.move_prev();
    }

    /// Returns the value the cursor points to.
    pub fn get(&self) -> Result<&T> {
        self.inner.key()
    }

    /// Removes the value the cursor points to and moves to the next value.
    /// Does nothing at the end position.
    pub fn remove_current(&mut self) -> Option<T> {
        self.inner.remove_current().map(|(k, _)| k)
    }

    /// Returns a read-only cursor at the same position.
    pub fn as_cursor(&self) -> Cursor<'_, T> {
        Cursor::wrap(self.inner.as_cursor())
    }
}

impl<'a, T> Iter<'a, T> {
    pub(crate) fn wrap(inner: tree::Iter<'a, T, ()>) -> Self {
        Self { inner }
    }
}

// Auto derived clone seems to have an invalid type bound of T: Clone
impl<T> Clone for Iter<'_, T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Iter<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.clone()).finish()
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> DoubleEndedIterator for Iter<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(k, _)| k)
    }
}

impl<T> FusedIterator for Iter<'_, T> {}

impl<T> IntoIter<T> {
    pub(crate) fn wrap(inner: tree::IntoIter<T, ()>) -> Self {
        Self { inner }
    }
}

impl<T: fmt::Debug> fmt::Debug for IntoIter<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let values = self.inner.remaining().iter().map(|(k, _)| k);
        f.debug_list().entries(values).finish()
    }
}

impl<T> Iterator for IntoIter<T> {
    type Item = T;
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> DoubleEndedIterator for IntoIter<T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(k, _)| k)
    }
}

impl<T> ExactSizeIterator for IntoIter<T> {}
impl<T> FusedIterator for IntoIter<T> {}
