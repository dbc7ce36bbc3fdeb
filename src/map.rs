//! An ordered map implemented with an AVL tree.

use std::borrow::Borrow;
use std::fmt;
use std::iter::{FromIterator, FusedIterator};

use crate::error::{OutOfRange, Result};
use crate::tree::{self, AvlTree, Duplicates};

pub use crate::tree::{IntoIter, Iter, IterMut};

/// An ordered map implemented with an AVL tree.
///
/// Inserting a key that is already present keeps the stored value;
/// use [`insert_or_assign`](AvlTreeMap::insert_or_assign) to replace it.
///
/// ```
/// use avl_containers::AvlTreeMap;
/// let mut map = AvlTreeMap::new();
/// map.insert(0, "zero");
/// map.insert(1, "one");
/// map.insert(2, "two");
/// assert_eq!(map.get(&1), Some(&"one"));
/// assert!(map.at(&3).is_err());
/// map.remove(&1);
/// assert!(map.get(&1).is_none());
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct AvlTreeMap<K, V> {
    tree: AvlTree<K, V>,
}

/// A read-only position in an [`AvlTreeMap`].
pub struct Cursor<'a, K, V> {
    inner: tree::Cursor<'a, K, V>,
}

/// A position in an [`AvlTreeMap`] that allows removing entries and changing values.
pub struct CursorMut<'a, K, V> {
    inner: tree::CursorMut<'a, K, V>,
}

/// An iterator over the keys of a map.
pub struct Keys<'a, K, V> {
    iter: Iter<'a, K, V>,
}

/// An iterator over the values of a map.
pub struct Values<'a, K, V> {
    iter: Iter<'a, K, V>,
}

impl<K, V> AvlTreeMap<K, V> {
    /// Creates an empty map.
    /// No memory is allocated until the first item is inserted.
    pub fn new() -> Self {
        Self {
            tree: AvlTree::new(),
        }
    }

    /// Returns true if the map contains no elements.
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Returns the number of elements in the map.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns the largest number of elements the map could address.
    pub fn max_size(&self) -> usize {
        self.tree.max_size()
    }

    #[cfg(test)]
    pub(crate) fn height(&self) -> usize {
        self.tree.height()
    }

    /// Clears the map, deallocating all memory.
    pub fn clear(&mut self) {
        self.tree.clear();
    }

    /// Exchanges the contents of two maps.
    pub fn swap(&mut self, other: &mut Self) {
        self.tree.swap(&mut other.tree);
    }

    /// Returns a cursor at the first entry.
    pub fn begin(&self) -> Cursor<'_, K, V> {
        Cursor {
            inner: self.tree.begin(),
        }
    }

    /// Returns the past-the-end cursor.
    pub fn end(&self) -> Cursor<'_, K, V> {
        Cursor {
            inner: self.tree.end(),
        }
    }

    /// Returns a mutable cursor at the first entry.
    pub fn begin_mut(&mut self) -> CursorMut<'_, K, V> {
        CursorMut {
            inner: self.tree.begin_mut(),
        }
    }

    /// Removes and returns the entry with the smallest key.
    pub fn pop_first(&mut self) -> Option<(K, V)> {
        self.tree.pop_first()
    }

    /// Removes and returns the entry with the largest key.
    pub fn pop_last(&mut self) -> Option<(K, V)> {
        self.tree.pop_last()
    }

    /// Gets an iterator over the entries of the map in sorted order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        self.tree.iter()
    }

    /// Gets a mutable iterator over the entries of the map in sorted order.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        self.tree.iter_mut()
    }

    /// Gets an iterator over the keys of the map in sorted order.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { iter: self.iter() }
    }

    /// Gets an iterator over the values of the map, ordered by key.
    pub fn values(&self) -> Values<'_, K, V> {
        Values { iter: self.iter() }
    }
}

impl<K: Ord, V> AvlTreeMap<K, V> {
    /// Returns a reference to the value corresponding to the key.
    ///
    /// The key may be any borrowed form of the map's key type, but the ordering
    /// on the borrowed form *must* match the ordering on the key type.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.get(key)
    }

    /// Returns references to the key-value pair corresponding to the key.
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.get_key_value(key)
    }

    /// Returns a mutable reference to the value corresponding to the key.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.get_mut(key)
    }

    /// Returns a reference to the value corresponding to the key.
    ///
    /// Fails with [`OutOfRange::MissingKey`] if the key is absent. Never inserts.
    pub fn at<Q>(&self, key: &Q) -> Result<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.get(key).ok_or(OutOfRange::MissingKey)
    }

    /// Returns a mutable reference to the value corresponding to the key.
    ///
    /// Fails with [`OutOfRange::MissingKey`] if the key is absent. Never inserts.
    pub fn at_mut<Q>(&mut self, key: &Q) -> Result<&mut V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.get_mut(key).ok_or(OutOfRange::MissingKey)
    }

    /// Returns a mutable reference to the value corresponding to the key,
    /// inserting `V::default()` first if the key is absent.
    pub fn get_or_insert_default(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        self.tree.get_or_insert_with(key, V::default)
    }

    /// Returns a mutable reference to the value corresponding to the key,
    /// inserting the result of `f` first if the key is absent.
    pub fn get_or_insert_with<F: FnOnce() -> V>(&mut self, key: K, f: F) -> &mut V {
        self.tree.get_or_insert_with(key, f)
    }

    /// Returns true if the map contains a value for the specified key.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.contains(key)
    }

    /// Inserts a key-value pair into the map.
    ///
    /// If the key is already present, the stored value is kept and `value` is dropped.
    /// Returns a cursor at the entry with the key and whether the pair was inserted.
    pub fn insert(&mut self, key: K, value: V) -> (Cursor<'_, K, V>, bool) {
        let (inner, inserted) = self.tree.insert(key, value, Duplicates::Reject);
        (Cursor { inner }, inserted)
    }

    /// Inserts a key-value pair into the map, replacing the value of an existing entry.
    ///
    /// An existing entry is updated in place. Returns a cursor at the entry and
    /// whether a new entry was inserted.
    pub fn insert_or_assign(&mut self, key: K, value: V) -> (Cursor<'_, K, V>, bool) {
        let (inner, inserted) = self.tree.insert_or_assign(key, value);
        (Cursor { inner }, inserted)
    }

    /// Inserts all pairs in order and reports for each whether it was inserted.
    pub fn insert_many<I>(&mut self, pairs: I) -> Vec<bool>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        pairs
            .into_iter()
            .map(|(key, value)| self.insert(key, value).1)
            .collect()
    }

    /// Removes a key from the map.
    /// Returns the value at the key if the key was previously in the map.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.remove(key).map(|(_, v)| v)
    }

    /// Removes a key from the map.
    /// Returns the stored key and value if the key was previously in the map.
    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.remove(key)
    }

    /// Returns a cursor at the entry with the given key, or past-the-end.
    pub fn find<Q>(&self, key: &Q) -> Cursor<'_, K, V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        Cursor {
            inner: self.tree.find(key),
        }
    }

    /// Returns a mutable cursor at the entry with the given key, or past-the-end.
    pub fn find_mut<Q>(&mut self, key: &Q) -> CursorMut<'_, K, V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        CursorMut {
            inner: self.tree.find_mut(key),
        }
    }

    /// Returns a cursor at the first entry whose key is not less than `key`.
    pub fn lower_bound<Q>(&self, key: &Q) -> Cursor<'_, K, V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        Cursor {
            inner: self.tree.lower_bound(key),
        }
    }

    /// Returns a cursor at the first entry whose key is greater than `key`.
    pub fn upper_bound<Q>(&self, key: &Q) -> Cursor<'_, K, V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        Cursor {
            inner: self.tree.upper_bound(key),
        }
    }

    /// Moves the entries of `other` whose keys are not yet in `self` into `self`.
    ///
    /// Entries of `other` with a key already present in `self` stay in `other`.
    pub fn merge(&mut self, other: &mut Self) {
        self.tree.merge(&mut other.tree, Duplicates::Reject);
    }

    /// Asserts that the internal tree structure is consistent.
    #[cfg(any(test, feature = "consistency_check"))]
    pub fn check_consistency(&self) {
        self.tree.check_consistency();
        let mut keys = self.keys();
        if let Some(mut prev) = keys.next() {
            for key in keys {
                assert!(prev < key);
                prev = key;
            }
        }
    }
}

impl<K, V> Default for AvlTreeMap<K, V> {
    /// Creates an empty map.
    fn default() -> Self {
        Self::new()
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for AvlTreeMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Ord, V> FromIterator<(K, V)> for AvlTreeMap<K, V> {
    /// Builds a map from pairs; the first pair for a key wins.
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<K: Ord, V, const N: usize> From<[(K, V); N]> for AvlTreeMap<K, V> {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl<K: Ord, V> Extend<(K, V)> for AvlTreeMap<K, V> {
    /// Inserts all pairs; pairs with a key already present are dropped.
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        iter.into_iter().for_each(move |(key, value)| {
            self.insert(key, value);
        });
    }
}

impl<'a, K, V> IntoIterator for &'a AvlTreeMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V> IntoIterator for &'a mut AvlTreeMap<K, V> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<K, V> IntoIterator for AvlTreeMap<K, V> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;
    fn into_iter(self) -> Self::IntoIter {
        self.tree.into_iter()
    }
}

impl<'a, K, V> Cursor<'a, K, V> {
    /// Returns true if the cursor is past-the-end.
    pub fn is_end(&self) -> bool {
        self.inner.is_end()
    }

    /// Moves the cursor to the next entry. At the end position this does nothing.
    pub fn move_next(&mut self) {
        self.inner.move_next();
    }

    /// Moves the cursor to the previous entry.
    /// Moving from the end position reaches the last entry.
    pub fn move_prev(&mut self) {
        self.inner.move_prev();
    }

    /// Returns the key and value the cursor points to.
    pub fn get(&self) -> Result<(&'a K, &'a V)> {
        self.inner.get()
    }

    /// Returns the key the cursor points to.
    pub fn key(&self) -> Result<&'a K> {
        self.inner.key()
    }

    /// Returns the value the cursor points to.
    pub fn value(&self) -> Result<&'a V> {
        self.inner.value()
    }

    /// Counts the forward steps needed to reach `other`.
    pub fn distance_to(&self, other: &Self) -> usize {
        self.inner.distance_to(&other.inner)
    }

    /// Gets an iterator over the entries from this cursor up to, excluding, `end`.
    pub fn until(self, end: Self) -> Iter<'a, K, V> {
        self.inner.until(end.inner)
    }
}

impl<K, V> Clone for Cursor<'_, K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for Cursor<'_, K, V> {}

impl<K, V> PartialEq for Cursor<'_, K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<K, V> Eq for Cursor<'_, K, V> {}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Cursor<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Cursor").field(&self.get().ok()).finish()
    }
}

impl<'a, K, V> CursorMut<'a, K, V> {
    /// Returns true if the cursor is past-the-end.
    pub fn is_end(&self) -> bool {
        self.inner.is_end()
    }

    /// Moves the cursor to the next entry. At the end position this does nothing.
    pub fn move_next(&mut self) {
        self.inner.move_next();
    }

    /// Moves the cursor to the previous entry.
    pub fn move_prev(&mut self) {
        self.inner.move_prev();
    }

    /// Returns the key and value the cursor points to.
    pub fn get(&self) -> Result<(&K, &V)> {
        self.inner.get()
    }

    /// Returns a mutable reference to the value the cursor points to.
    pub fn value_mut(&mut self) -> Result<&mut V> {
        self.inner.value_mut()
    }

    /// Removes the entry the cursor points to and moves to the next entry.
    /// Does nothing at the end position.
    pub fn remove_current(&mut self) -> Option<(K, V)> {
        self.inner.remove_current()
    }

    /// Returns a read-only cursor at the same position.
    pub fn as_cursor(&self) -> Cursor<'_, K, V> {
        Cursor {
            inner: self.inner.as_cursor(),
        }
    }
}

// Auto derived clone seems to have an invalid type bound of K: Clone
impl<K, V> Clone for Keys<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            iter: self.iter.clone(),
        }
    }
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;
    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

impl<K, V> DoubleEndedIterator for Keys<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.iter.next_back().map(|(k, _)| k)
    }
}

impl<K, V> FusedIterator for Keys<'_, K, V> {}

impl<K, V> Clone for Values<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            iter: self.iter.clone(),
        }
    }
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;
    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

impl<K, V> DoubleEndedIterator for Values<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.iter.next_back().map(|(_, v)| v)
    }
}

impl<K, V> FusedIterator for Values<'_, K, V> {}
