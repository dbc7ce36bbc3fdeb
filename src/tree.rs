//! The AVL tree engine shared by the map, set and multiset containers.
//!
//! Nodes are heap allocated and linked by raw pointers. A parent owns its children,
//! the parent link of a child is only ever used for navigation.

use std::borrow::Borrow;
use std::cmp::{self, Ordering};
use std::fmt;
use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::mem;
use std::ptr::NonNull;

use tracing::{debug, trace};

use crate::error::{OutOfRange, Result};

/// An ordered tree of key-value entries, kept height balanced with AVL rotations.
///
/// Whether equal keys may coexist is decided per insertion with [`Duplicates`].
/// Equal keys are routed to the left subtree, so the most recently inserted
/// duplicate is always the first entry of its run in iteration order.
///
/// ```
/// use avl_containers::tree::{AvlTree, Duplicates};
/// let mut tree = AvlTree::new();
/// tree.insert(2, 'b', Duplicates::Reject);
/// tree.insert(1, 'a', Duplicates::Reject);
/// let (_, inserted) = tree.insert(2, 'x', Duplicates::Reject);
/// assert!(!inserted);
/// assert_eq!(tree.iter().collect::<Vec<_>>(), [(&1, &'a'), (&2, &'b')]);
/// ```
pub struct AvlTree<K, V> {
    root: Link<K, V>,
    num_nodes: usize,
    marker: PhantomData<Box<Node<K, V>>>,
}

/// Insertion policy for keys that compare equal to a stored key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Duplicates {
    /// Keep the stored entry and do not insert.
    Reject,
    /// Insert a new entry in front of the equal entries.
    Allow,
}

struct Node<K, V> {
    key: K,
    value: V,
    left: Link<K, V>,
    right: Link<K, V>,
    parent: Link<K, V>,
    height: usize,
}

type NodePtr<K, V> = NonNull<Node<K, V>>;
type Link<K, V> = Option<NodePtr<K, V>>;
type LinkPtr<K, V> = NonNull<Link<K, V>>;

#[allow(clippy::enum_variant_names)]
enum Direction {
    FromParent,
    FromLeft,
    FromRight,
}

enum InsertPos<K, V> {
    Vacant(Link<K, V>, LinkPtr<K, V>),
    Occupied(NodePtr<K, V>),
}

/// A read-only position in an [`AvlTree`].
///
/// A cursor either points to an entry or is past-the-end. Stepping back from the
/// end position lands on the last entry, stepping forward from the end position
/// does nothing. Two cursors are equal if they point to the same node.
pub struct Cursor<'a, K, V> {
    tree: &'a AvlTree<K, V>,
    current: Link<K, V>,
    // Last node of the tree, cached while the cursor is past-the-end.
    last: Link<K, V>,
}

/// A position in an [`AvlTree`] that allows removing entries and changing values.
pub struct CursorMut<'a, K, V> {
    tree: &'a mut AvlTree<K, V>,
    current: Link<K, V>,
}

/// An iterator over the entries of a tree, in order.
pub struct Iter<'a, K, V> {
    front: Link<K, V>,
    back: Link<K, V>,
    remaining: Option<usize>,
    marker: PhantomData<&'a Node<K, V>>,
}

/// A mutable iterator over the entries of a tree, in order.
pub struct IterMut<'a, K, V> {
    front: Link<K, V>,
    back: Link<K, V>,
    remaining: usize,
    marker: PhantomData<&'a mut Node<K, V>>,
}

/// An owning iterator over the entries of a tree, in order.
pub struct IntoIter<K, V> {
    tree: AvlTree<K, V>,
}

impl<K, V> AvlTree<K, V> {
    /// Creates an empty tree.
    /// No memory is allocated until the first entry is inserted.
    pub fn new() -> Self {
        Self {
            root: None,
            num_nodes: 0,
            marker: PhantomData,
        }
    }

    /// Returns true if the tree contains no entries.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Returns the number of entries in the tree.
    pub fn len(&self) -> usize {
        self.num_nodes
    }

    /// Returns the largest number of entries the tree could address.
    pub fn max_size(&self) -> usize {
        isize::MAX as usize / cmp::max(mem::size_of::<Node<K, V>>(), 1)
    }

    #[cfg(test)]
    pub(crate) fn height(&self) -> usize {
        match self.root {
            None => 0,
            Some(root_ptr) => unsafe { root_ptr.as_ref().height },
        }
    }

    /// Key, height and parent key of every node, in preorder.
    #[cfg(test)]
    pub(crate) fn shape(&self) -> Vec<(K, usize, Option<K>)>
    where
        K: Clone,
    {
        let mut nodes = Vec::with_capacity(self.num_nodes);
        Self::preorder(self.root, |node_ptr| {
            let node = unsafe { node_ptr.as_ref() };
            let parent_key = node
                .parent
                .map(|parent_ptr| unsafe { parent_ptr.as_ref() }.key.clone());
            nodes.push((node.key.clone(), node.height, parent_key));
        });
        nodes
    }

    /// Clears the tree, deallocating all nodes.
    pub fn clear(&mut self) {
        let root = self.root.take();
        if root.is_some() {
            trace!(nodes = self.num_nodes, "clearing tree");
        }
        self.num_nodes = 0;
        Self::postorder(root, |node_ptr| unsafe { Node::destroy(node_ptr) });
    }

    /// Returns a cursor at the first entry, or past-the-end if the tree is empty.
    pub fn begin(&self) -> Cursor<'_, K, V> {
        Cursor::new(self, self.first_node())
    }

    /// Returns the past-the-end cursor.
    pub fn end(&self) -> Cursor<'_, K, V> {
        Cursor::new(self, None)
    }

    /// Returns a mutable cursor at the first entry.
    pub fn begin_mut(&mut self) -> CursorMut<'_, K, V> {
        let current = self.first_node();
        CursorMut {
            tree: self,
            current,
        }
    }

    /// Returns the past-the-end mutable cursor.
    pub fn end_mut(&mut self) -> CursorMut<'_, K, V> {
        CursorMut {
            tree: self,
            current: None,
        }
    }

    /// Removes and returns the first entry.
    pub fn pop_first(&mut self) -> Option<(K, V)> {
        let node_ptr = self.first_node()?;
        Some(unsafe { self.erase_node(node_ptr) }.0)
    }

    /// Removes and returns the last entry.
    pub fn pop_last(&mut self) -> Option<(K, V)> {
        let node_ptr = self.last_node()?;
        Some(unsafe { self.erase_node(node_ptr) }.0)
    }

    /// Exchanges the contents of two trees.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    /// Gets an iterator over the entries of the tree in order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            front: self.first_node(),
            back: self.last_node(),
            remaining: Some(self.num_nodes),
            marker: PhantomData,
        }
    }

    /// Gets a mutable iterator over the entries of the tree in order.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            front: self.first_node(),
            back: self.last_node(),
            remaining: self.num_nodes,
            marker: PhantomData,
        }
    }

    fn first_node(&self) -> Link<K, V> {
        self.root.map(|root_ptr| unsafe { Node::leftmost(root_ptr) })
    }

    fn last_node(&self) -> Link<K, V> {
        self.root.map(|root_ptr| unsafe { Node::rightmost(root_ptr) })
    }

    /// Unlinks and frees a node, returning its entry and the node now holding the
    /// next entry in order.
    ///
    /// A node with two children swaps entries with its in-order successor, and the
    /// successor node is freed instead.
    unsafe fn erase_node(&mut self, mut node_ptr: NodePtr<K, V>) -> ((K, V), Link<K, V>) {
        debug_assert!(self.num_nodes >= 1);
        let (unlinked_ptr, next) = match (node_ptr.as_ref().left, node_ptr.as_ref().right) {
            (Some(_), Some(right_ptr)) => {
                let mut successor_ptr = Node::leftmost(right_ptr);
                mem::swap(&mut node_ptr.as_mut().key, &mut successor_ptr.as_mut().key);
                mem::swap(&mut node_ptr.as_mut().value, &mut successor_ptr.as_mut().value);
                (successor_ptr, Some(node_ptr))
            }
            _ => (node_ptr, Node::successor(node_ptr)),
        };
        self.unlink_stem(unlinked_ptr);
        self.num_nodes -= 1;
        (Node::into_entry(unlinked_ptr), next)
    }

    /// Replaces a node with at most one child by that child.
    unsafe fn unlink_stem(&mut self, node_ptr: NodePtr<K, V>) {
        let parent = node_ptr.as_ref().parent;
        let child = match (node_ptr.as_ref().left, node_ptr.as_ref().right) {
            (Some(_), Some(_)) => unreachable!("node to unlink has two children"),
            (left, None) => left,
            (None, right) => right,
        };
        if let Some(mut child_ptr) = child {
            child_ptr.as_mut().parent = parent;
        }
        match parent {
            None => self.root = child,
            Some(mut parent_ptr) => {
                if parent_ptr.as_ref().left == Some(node_ptr) {
                    parent_ptr.as_mut().left = child;
                } else {
                    parent_ptr.as_mut().right = child;
                }
                // Parent node might be out of balance now
                self.rebalance(Some(parent_ptr));
            }
        }
    }

    fn left_height(node_ptr: NodePtr<K, V>) -> usize {
        unsafe {
            match node_ptr.as_ref().left {
                None => 0,
                Some(left_ptr) => left_ptr.as_ref().height + 1,
            }
        }
    }

    fn right_height(node_ptr: NodePtr<K, V>) -> usize {
        unsafe {
            match node_ptr.as_ref().right {
                None => 0,
                Some(right_ptr) => right_ptr.as_ref().height + 1,
            }
        }
    }

    /// Height of the right subtree minus height of the left subtree.
    fn balance_factor(node_ptr: NodePtr<K, V>) -> isize {
        Self::right_height(node_ptr) as isize - Self::left_height(node_ptr) as isize
    }

    fn adjust_height(mut node_ptr: NodePtr<K, V>) {
        let height = cmp::max(Self::left_height(node_ptr), Self::right_height(node_ptr));
        unsafe { node_ptr.as_mut().height = height };
    }

    fn rotate_left(&mut self, mut node_ptr: NodePtr<K, V>) {
        unsafe {
            if let Some(mut right_ptr) = node_ptr.as_ref().right {
                node_ptr.as_mut().right = right_ptr.as_ref().left;
                if let Some(mut right_left_ptr) = right_ptr.as_ref().left {
                    right_left_ptr.as_mut().parent = Some(node_ptr);
                }

                right_ptr.as_mut().parent = node_ptr.as_ref().parent;
                self.replace_child(node_ptr, right_ptr);

                right_ptr.as_mut().left = Some(node_ptr);
                node_ptr.as_mut().parent = Some(right_ptr);

                Self::adjust_height(node_ptr);
                Self::adjust_height(right_ptr);
            }
        }
    }

    fn rotate_right(&mut self, mut node_ptr: NodePtr<K, V>) {
        unsafe {
            if let Some(mut left_ptr) = node_ptr.as_ref().left {
                node_ptr.as_mut().left = left_ptr.as_ref().right;
                if let Some(mut left_right_ptr) = left_ptr.as_ref().right {
                    left_right_ptr.as_mut().parent = Some(node_ptr);
                }

                left_ptr.as_mut().parent = node_ptr.as_ref().parent;
                self.replace_child(node_ptr, left_ptr);

                left_ptr.as_mut().right = Some(node_ptr);
                node_ptr.as_mut().parent = Some(left_ptr);

                Self::adjust_height(node_ptr);
                Self::adjust_height(left_ptr);
            }
        }
    }

    /// Points the link that referred to `old_ptr` (parent link or root) at `new_ptr`.
    unsafe fn replace_child(&mut self, old_ptr: NodePtr<K, V>, new_ptr: NodePtr<K, V>) {
        match old_ptr.as_ref().parent {
            None => self.root = Some(new_ptr),
            Some(mut parent_ptr) => {
                if parent_ptr.as_ref().left == Some(old_ptr) {
                    parent_ptr.as_mut().left = Some(new_ptr);
                } else {
                    parent_ptr.as_mut().right = Some(new_ptr);
                }
            }
        }
    }

    /// Rebalances nodes starting from given position up to the root node.
    fn rebalance(&mut self, start_from: Link<K, V>) {
        let mut current = start_from;
        while let Some(node_ptr) = current {
            let parent = unsafe { node_ptr.as_ref().parent };
            self.rebalance_node(node_ptr);
            current = parent;
        }
    }

    /// Rebalances nodes starting from given position up to the root node.
    /// Stops after first rebalance operation.
    /// This is enough to restore balance after a single insert operation.
    fn rebalance_once(&mut self, start_from: Link<K, V>) {
        let mut current = start_from;
        while let Some(node_ptr) = current {
            let parent = unsafe { node_ptr.as_ref().parent };
            if self.rebalance_node(node_ptr) {
                break;
            }
            current = parent;
        }
    }

    /// Restores AVL condition (balance) at given node if necessary and adjusts height.
    /// Initial balance must not exceed +2 or -2, which always holds after a single update.
    /// Returns whether a rotation had been necessary.
    fn rebalance_node(&mut self, node_ptr: NodePtr<K, V>) -> bool {
        let balance = Self::balance_factor(node_ptr);
        debug_assert!((-2..=2).contains(&balance));
        match balance {
            -2 => {
                // Left-right case: straighten the left child first
                if let Some(left_ptr) = unsafe { node_ptr.as_ref().left } {
                    if Self::balance_factor(left_ptr) > 0 {
                        self.rotate_left(left_ptr);
                    }
                }
                self.rotate_right(node_ptr);
                trace!(balance, "rotated right");
                true
            }
            2 => {
                // Right-left case: straighten the right child first
                if let Some(right_ptr) = unsafe { node_ptr.as_ref().right } {
                    if Self::balance_factor(right_ptr) < 0 {
                        self.rotate_right(right_ptr);
                    }
                }
                self.rotate_left(node_ptr);
                trace!(balance, "rotated left");
                true
            }
            _ => {
                Self::adjust_height(node_ptr);
                false
            }
        }
    }

    #[cfg(any(test, feature = "consistency_check"))]
    fn preorder<F: FnMut(NodePtr<K, V>)>(root: Link<K, V>, f: F) {
        Self::traverse(root, f, |_| {}, |_| {});
    }

    fn postorder<F: FnMut(NodePtr<K, V>)>(root: Link<K, V>, f: F) {
        Self::traverse(root, |_| {}, |_| {}, f);
    }

    fn traverse<Pre, In, Post>(
        root: Link<K, V>,
        mut preorder: Pre,
        mut inorder: In,
        mut postorder: Post,
    ) where
        Pre: FnMut(NodePtr<K, V>),
        In: FnMut(NodePtr<K, V>),
        Post: FnMut(NodePtr<K, V>),
    {
        if let Some(mut node_ptr) = root {
            let mut dir = Direction::FromParent;
            loop {
                match dir {
                    Direction::FromParent => {
                        preorder(node_ptr);
                        if let Some(left_ptr) = unsafe { node_ptr.as_ref().left } {
                            node_ptr = left_ptr;
                        } else {
                            dir = Direction::FromLeft;
                        }
                    }
                    Direction::FromLeft => {
                        inorder(node_ptr);
                        if let Some(right_ptr) = unsafe { node_ptr.as_ref().right } {
                            node_ptr = right_ptr;
                            dir = Direction::FromParent;
                        } else {
                            dir = Direction::FromRight;
                        }
                    }
                    Direction::FromRight => {
                        // Post order traversal is used for node deletion,
                        // so make sure not to use node pointer after postorder call.
                        if let Some(parent_ptr) = unsafe { node_ptr.as_ref().parent } {
                            if Some(node_ptr) == unsafe { parent_ptr.as_ref().left } {
                                dir = Direction::FromLeft;
                            } else {
                                dir = Direction::FromRight;
                            }
                            postorder(node_ptr);
                            node_ptr = parent_ptr;
                        } else {
                            postorder(node_ptr);
                            break;
                        }
                    }
                }
            }
        }
    }
}

impl<K: Ord, V> AvlTree<K, V> {
    /// Returns a cursor at an entry with the given key, or past-the-end if there is none.
    ///
    /// If several entries share the key, any one of them may be returned.
    pub fn find<Q>(&self, key: &Q) -> Cursor<'_, K, V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        Cursor::new(self, self.find_node(key))
    }

    /// Returns a mutable cursor at an entry with the given key.
    pub fn find_mut<Q>(&mut self, key: &Q) -> CursorMut<'_, K, V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let current = self.find_node(key);
        CursorMut {
            tree: self,
            current,
        }
    }

    /// Returns true if the tree contains an entry with the given key.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.find_node(key).is_some()
    }

    /// Returns a reference to the value of an entry with the given key.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.find_node(key)
            .map(|node_ptr| &unsafe { &*node_ptr.as_ptr() }.value)
    }

    /// Returns references to the key and value of an entry with the given key.
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.find_node(key).map(|node_ptr| {
            let node = unsafe { &*node_ptr.as_ptr() };
            (&node.key, &node.value)
        })
    }

    /// Returns a mutable reference to the value of an entry with the given key.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.find_node(key)
            .map(|node_ptr| &mut unsafe { &mut *node_ptr.as_ptr() }.value)
    }

    /// Returns a cursor at the first entry whose key is not less than `key`.
    pub fn lower_bound<Q>(&self, key: &Q) -> Cursor<'_, K, V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        Cursor::new(self, self.lower_bound_node(key))
    }

    /// Returns a mutable cursor at the first entry whose key is not less than `key`.
    pub fn lower_bound_mut<Q>(&mut self, key: &Q) -> CursorMut<'_, K, V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let current = self.lower_bound_node(key);
        CursorMut {
            tree: self,
            current,
        }
    }

    /// Returns a cursor at the first entry whose key is greater than `key`.
    pub fn upper_bound<Q>(&self, key: &Q) -> Cursor<'_, K, V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        Cursor::new(self, self.upper_bound_node(key))
    }

    /// Inserts an entry.
    ///
    /// Returns a cursor at the new entry and `true`, or, if duplicates are rejected
    /// and the key is already present, a cursor at the stored entry and `false`.
    pub fn insert(&mut self, key: K, value: V, duplicates: Duplicates) -> (Cursor<'_, K, V>, bool) {
        let (node_ptr, inserted) = self.insert_node(key, value, duplicates);
        (Cursor::new(self, Some(node_ptr)), inserted)
    }

    /// Inserts an entry, or replaces the value of the stored entry with an equal key.
    ///
    /// The stored entry keeps its node and key; only the value is replaced.
    /// Returns whether a new entry was inserted.
    pub fn insert_or_assign(&mut self, key: K, value: V) -> (Cursor<'_, K, V>, bool) {
        match self.find_node(&key) {
            Some(mut node_ptr) => {
                unsafe { node_ptr.as_mut().value = value };
                (Cursor::new(self, Some(node_ptr)), false)
            }
            None => self.insert(key, value, Duplicates::Reject),
        }
    }

    /// Returns the value stored for `key`, inserting the result of `f` first if absent.
    pub fn get_or_insert_with<F: FnOnce() -> V>(&mut self, key: K, f: F) -> &mut V {
        let node_ptr = match self.find_node(&key) {
            Some(node_ptr) => node_ptr,
            None => self.insert_node(key, f(), Duplicates::Reject).0,
        };
        &mut unsafe { &mut *node_ptr.as_ptr() }.value
    }

    /// Removes an entry with the given key and returns it.
    ///
    /// If several entries share the key, only one of them is removed.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let node_ptr = self.find_node(key)?;
        let entry = unsafe { self.erase_node(node_ptr) }.0;
        Some(entry)
    }

    /// Moves entries of `other` into `self`.
    ///
    /// With [`Duplicates::Reject`], only entries whose key is not yet present in
    /// `self` are moved; the others stay in `other` untouched. With
    /// [`Duplicates::Allow`], every entry is moved and `other` ends up empty.
    pub fn merge(&mut self, other: &mut Self, duplicates: Duplicates) {
        let mut moved = 0usize;
        let mut kept = 0usize;
        let mut cursor = other.begin_mut();
        while let Ok(key) = cursor.key() {
            if duplicates == Duplicates::Reject && self.contains(key) {
                kept += 1;
                cursor.move_next();
            } else if let Some((key, value)) = cursor.remove_current() {
                self.insert_node(key, value, duplicates);
                moved += 1;
            }
        }
        debug!(moved, kept, "merged trees");
    }

    /// Asserts that the internal tree structure is consistent.
    #[cfg(any(test, feature = "consistency_check"))]
    pub fn check_consistency(&self) {
        unsafe {
            // Check root link
            if let Some(root_node_ptr) = self.root {
                assert!(root_node_ptr.as_ref().parent.is_none());
            }

            // Check tree nodes
            let mut num_nodes = 0;
            Self::preorder(self.root, |node_ptr| {
                let mut height = 0;
                let mut left_height = 0;
                let mut right_height = 0;

                // Check link for left child node
                if let Some(left_ptr) = node_ptr.as_ref().left {
                    assert!(left_ptr.as_ref().parent == Some(node_ptr));
                    left_height = left_ptr.as_ref().height + 1;
                    height = cmp::max(height, left_height);
                }

                // Check link for right child node
                if let Some(right_ptr) = node_ptr.as_ref().right {
                    assert!(right_ptr.as_ref().parent == Some(node_ptr));
                    right_height = right_ptr.as_ref().height + 1;
                    height = cmp::max(height, right_height);
                }

                // Check height
                assert_eq!(node_ptr.as_ref().height, height);

                // Check AVL condition (nearly balance)
                assert!(left_height <= right_height + 1);
                assert!(right_height <= left_height + 1);

                num_nodes += 1;
            });

            // Check number of nodes
            assert_eq!(num_nodes, self.num_nodes);

            // Check order, equal keys are allowed next to each other
            let mut prev: Option<&K> = None;
            Self::traverse(
                self.root,
                |_| {},
                |node_ptr| {
                    let key = &(*node_ptr.as_ptr()).key;
                    if let Some(prev) = prev {
                        assert!(prev <= key);
                    }
                    prev = Some(key);
                },
                |_| {},
            );
        }
    }

    fn find_node<Q>(&self, key: &Q) -> Link<K, V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut current = self.root;
        while let Some(node_ptr) = current {
            current = unsafe {
                match key.cmp(node_ptr.as_ref().key.borrow()) {
                    Ordering::Equal => break,
                    Ordering::Less => node_ptr.as_ref().left,
                    Ordering::Greater => node_ptr.as_ref().right,
                }
            }
        }
        current
    }

    fn lower_bound_node<Q>(&self, key: &Q) -> Link<K, V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut current = self.root;
        let mut candidate = None;
        while let Some(node_ptr) = current {
            let node = unsafe { node_ptr.as_ref() };
            match key.cmp(node.key.borrow()) {
                Ordering::Greater => current = node.right,
                _ => {
                    candidate = current;
                    current = node.left;
                }
            }
        }
        candidate
    }

    fn upper_bound_node<Q>(&self, key: &Q) -> Link<K, V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut current = self.root;
        let mut candidate = None;
        while let Some(node_ptr) = current {
            let node = unsafe { node_ptr.as_ref() };
            match key.cmp(node.key.borrow()) {
                Ordering::Less => {
                    candidate = current;
                    current = node.left;
                }
                _ => current = node.right,
            }
        }
        candidate
    }

    fn insert_node(
        &mut self,
        key: K,
        value: V,
        duplicates: Duplicates,
    ) -> (NodePtr<K, V>, bool) {
        match self.find_insert_pos(&key, duplicates) {
            InsertPos::Occupied(node_ptr) => (node_ptr, false),
            InsertPos::Vacant(parent, mut link_ptr) => {
                let node_ptr = Node::create(parent, key, value);
                unsafe {
                    *link_ptr.as_mut() = Some(node_ptr);
                }
                self.num_nodes += 1;
                self.rebalance_once(parent);
                (node_ptr, true)
            }
        }
    }

    fn find_insert_pos(&mut self, key: &K, duplicates: Duplicates) -> InsertPos<K, V> {
        let mut parent: Link<K, V> = None;
        let mut link_ptr: LinkPtr<K, V> = NonNull::from(&mut self.root);
        unsafe {
            while let Some(mut node_ptr) = *link_ptr.as_ref() {
                let go_left = match key.cmp(&node_ptr.as_ref().key) {
                    Ordering::Less => true,
                    Ordering::Greater => false,
                    Ordering::Equal => match duplicates {
                        Duplicates::Allow => true,
                        Duplicates::Reject => return InsertPos::Occupied(node_ptr),
                    },
                };
                parent = Some(node_ptr);
                link_ptr = if go_left {
                    NonNull::from(&mut node_ptr.as_mut().left)
                } else {
                    NonNull::from(&mut node_ptr.as_mut().right)
                };
            }
        }
        InsertPos::Vacant(parent, link_ptr)
    }
}

impl<K, V> Drop for AvlTree<K, V> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<K, V> Default for AvlTree<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone, V: Clone> Clone for AvlTree<K, V> {
    /// Copies every node, keeping the exact shape of the source tree.
    fn clone(&self) -> Self {
        let mut tree = Self::new();
        if let Some(src_root_ptr) = self.root {
            unsafe {
                let dst_root_ptr = Node::duplicate(src_root_ptr, None);
                // Every copy is linked right away, so a panicking clone is cleaned up by drop.
                tree.root = Some(dst_root_ptr);
                Node::clone_children(src_root_ptr, dst_root_ptr);
            }
        }
        tree.num_nodes = self.num_nodes;
        tree
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for AvlTree<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: PartialEq, V: PartialEq> PartialEq for AvlTree<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<K: Eq, V: Eq> Eq for AvlTree<K, V> {}

unsafe impl<K: Send, V: Send> Send for AvlTree<K, V> {}
unsafe impl<K: Sync, V: Sync> Sync for AvlTree<K, V> {}

impl<'a, K, V> IntoIterator for &'a AvlTree<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V> IntoIterator for &'a mut AvlTree<K, V> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<K, V> IntoIterator for AvlTree<K, V> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;
    fn into_iter(self) -> Self::IntoIter {
        IntoIter { tree: self }
    }
}

impl<K, V> Node<K, V> {
    fn create(parent: Link<K, V>, key: K, value: V) -> NodePtr<K, V> {
        let boxed = Box::new(Node {
            key,
            value,
            parent,
            left: None,
            right: None,
            height: 0,
        });
        NonNull::from(Box::leak(boxed))
    }

    unsafe fn destroy(node_ptr: NodePtr<K, V>) {
        drop(Box::from_raw(node_ptr.as_ptr()));
    }

    unsafe fn into_entry(node_ptr: NodePtr<K, V>) -> (K, V) {
        let node = Box::from_raw(node_ptr.as_ptr());
        (node.key, node.value)
    }

    unsafe fn leftmost(mut node_ptr: NodePtr<K, V>) -> NodePtr<K, V> {
        while let Some(left_ptr) = node_ptr.as_ref().left {
            node_ptr = left_ptr;
        }
        node_ptr
    }

    unsafe fn rightmost(mut node_ptr: NodePtr<K, V>) -> NodePtr<K, V> {
        while let Some(right_ptr) = node_ptr.as_ref().right {
            node_ptr = right_ptr;
        }
        node_ptr
    }

    /// Next node in order, `None` after the last node.
    unsafe fn successor(node_ptr: NodePtr<K, V>) -> Link<K, V> {
        if let Some(right_ptr) = node_ptr.as_ref().right {
            return Some(Self::leftmost(right_ptr));
        }
        let mut child_ptr = node_ptr;
        let mut parent = node_ptr.as_ref().parent;
        while let Some(parent_ptr) = parent {
            if parent_ptr.as_ref().right != Some(child_ptr) {
                break;
            }
            child_ptr = parent_ptr;
            parent = parent_ptr.as_ref().parent;
        }
        parent
    }

    /// Previous node in order, `None` before the first node.
    unsafe fn predecessor(node_ptr: NodePtr<K, V>) -> Link<K, V> {
        if let Some(left_ptr) = node_ptr.as_ref().left {
            return Some(Self::rightmost(left_ptr));
        }
        let mut child_ptr = node_ptr;
        let mut parent = node_ptr.as_ref().parent;
        while let Some(parent_ptr) = parent {
            if parent_ptr.as_ref().left != Some(child_ptr) {
                break;
            }
            child_ptr = parent_ptr;
            parent = parent_ptr.as_ref().parent;
        }
        parent
    }

    unsafe fn entry<'a>(node_ptr: NodePtr<K, V>) -> (&'a K, &'a V) {
        let node = &*node_ptr.as_ptr();
        (&node.key, &node.value)
    }

    unsafe fn entry_mut<'a>(node_ptr: NodePtr<K, V>) -> (&'a K, &'a mut V) {
        let node = &mut *node_ptr.as_ptr();
        (&node.key, &mut node.value)
    }
}

impl<K: Clone, V: Clone> Node<K, V> {
    unsafe fn duplicate(src_ptr: NodePtr<K, V>, parent: Link<K, V>) -> NodePtr<K, V> {
        let src = src_ptr.as_ref();
        let mut node_ptr = Self::create(parent, src.key.clone(), src.value.clone());
        node_ptr.as_mut().height = src.height;
        node_ptr
    }

    /// Copies the subtrees below `src_root_ptr` under `dst_root_ptr`, walking both trees in step.
    unsafe fn clone_children(src_root_ptr: NodePtr<K, V>, dst_root_ptr: NodePtr<K, V>) {
        let mut src_ptr = src_root_ptr;
        let mut dst_ptr = dst_root_ptr;
        let mut dir = Direction::FromParent;
        loop {
            match dir {
                Direction::FromParent => {
                    if let Some(left_ptr) = src_ptr.as_ref().left {
                        let copy_ptr = Self::duplicate(left_ptr, Some(dst_ptr));
                        dst_ptr.as_mut().left = Some(copy_ptr);
                        src_ptr = left_ptr;
                        dst_ptr = copy_ptr;
                    } else {
                        dir = Direction::FromLeft;
                    }
                }
                Direction::FromLeft => {
                    if let Some(right_ptr) = src_ptr.as_ref().right {
                        let copy_ptr = Self::duplicate(right_ptr, Some(dst_ptr));
                        dst_ptr.as_mut().right = Some(copy_ptr);
                        src_ptr = right_ptr;
                        dst_ptr = copy_ptr;
                        dir = Direction::FromParent;
                    } else {
                        dir = Direction::FromRight;
                    }
                }
                Direction::FromRight => {
                    if src_ptr == src_root_ptr {
                        break;
                    }
                    match (src_ptr.as_ref().parent, dst_ptr.as_ref().parent) {
                        (Some(src_parent_ptr), Some(dst_parent_ptr)) => {
                            if src_parent_ptr.as_ref().left == Some(src_ptr) {
                                dir = Direction::FromLeft;
                            } else {
                                dir = Direction::FromRight;
                            }
                            src_ptr = src_parent_ptr;
                            dst_ptr = dst_parent_ptr;
                        }
                        _ => break,
                    }
                }
            }
        }
    }
}

impl<'a, K, V> Cursor<'a, K, V> {
    fn new(tree: &'a AvlTree<K, V>, current: Link<K, V>) -> Self {
        let last = match current {
            None => tree.last_node(),
            Some(_) => None,
        };
        Self {
            tree,
            current,
            last,
        }
    }

    /// Returns true if the cursor is past-the-end.
    pub fn is_end(&self) -> bool {
        self.current.is_none()
    }

    /// Moves the cursor to the next entry.
    ///
    /// Moving from the last entry reaches the end position. At the end position
    /// this does nothing.
    pub fn move_next(&mut self) {
        if let Some(node_ptr) = self.current {
            self.current = unsafe { Node::successor(node_ptr) };
            if self.current.is_none() {
                self.last = Some(node_ptr);
            }
        }
    }

    /// Moves the cursor to the previous entry.
    ///
    /// Moving from the end position reaches the last entry. Moving from the
    /// first entry reaches the end position.
    pub fn move_prev(&mut self) {
        match self.current {
            Some(node_ptr) => {
                self.current = unsafe { Node::predecessor(node_ptr) };
                if self.current.is_none() {
                    self.last = self.tree.last_node();
                }
            }
            None => self.current = self.last,
        }
    }

    /// Returns the entry the cursor points to.
    pub fn get(&self) -> Result<(&'a K, &'a V)> {
        match self.current {
            Some(node_ptr) => Ok(unsafe { Node::entry(node_ptr) }),
            None => Err(OutOfRange::PastTheEnd),
        }
    }

    /// Returns the key of the entry the cursor points to.
    pub fn key(&self) -> Result<&'a K> {
        self.get().map(|(k, _)| k)
    }

    /// Returns the value of the entry the cursor points to.
    pub fn value(&self) -> Result<&'a V> {
        self.get().map(|(_, v)| v)
    }

    /// Counts the forward steps needed to reach `other`.
    ///
    /// Stops at the end position if `other` is never reached.
    pub fn distance_to(&self, other: &Self) -> usize {
        let mut cursor = *self;
        let mut distance = 0;
        while cursor != *other && !cursor.is_end() {
            cursor.move_next();
            distance += 1;
        }
        distance
    }

    /// Gets an iterator over the entries from this cursor up to, excluding, `end`.
    ///
    /// `end` must not be positioned before this cursor.
    pub fn until(self, end: Self) -> Iter<'a, K, V> {
        if self == end || self.is_end() {
            return Iter {
                front: None,
                back: None,
                remaining: Some(0),
                marker: PhantomData,
            };
        }
        debug_assert!(
            {
                let mut cursor = self;
                while cursor != end && !cursor.is_end() {
                    cursor.move_next();
                }
                cursor == end
            },
            "end cursor is positioned before the start cursor"
        );
        let mut back = end;
        back.move_prev();
        Iter {
            front: self.current,
            back: back.current,
            remaining: None,
            marker: PhantomData,
        }
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
        self.current == other.current
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
        self.current.is_none()
    }

    /// Moves the cursor to the next entry. At the end position this does nothing.
    pub fn move_next(&mut self) {
        if let Some(node_ptr) = self.current {
            self.current = unsafe { Node::successor(node_ptr) };
        }
    }

    /// Moves the cursor to the previous entry.
    /// Moving from the end position reaches the last entry.
    pub fn move_prev(&mut self) {
        self.current = match self.current {
            Some(node_ptr) => unsafe { Node::predecessor(node_ptr) },
            None => self.tree.last_node(),
        };
    }

    /// Returns the entry the cursor points to.
    pub fn get(&self) -> Result<(&K, &V)> {
        match self.current {
            Some(node_ptr) => Ok(unsafe { Node::entry(node_ptr) }),
            None => Err(OutOfRange::PastTheEnd),
        }
    }

    /// Returns the key of the entry the cursor points to.
    pub fn key(&self) -> Result<&K> {
        self.get().map(|(k, _)| k)
    }

    /// Returns a mutable reference to the value of the entry the cursor points to.
    pub fn value_mut(&mut self) -> Result<&mut V> {
        match self.current {
            Some(node_ptr) => Ok(unsafe { Node::entry_mut(node_ptr) }.1),
            None => Err(OutOfRange::PastTheEnd),
        }
    }

    /// Removes the entry the cursor points to and moves the cursor to the next entry.
    ///
    /// Returns `None` and leaves the tree unchanged at the end position.
    pub fn remove_current(&mut self) -> Option<(K, V)> {
        let node_ptr = self.current?;
        let (entry, next) = unsafe { self.tree.erase_node(node_ptr) };
        self.current = next;
        Some(entry)
    }

    /// Returns a read-only cursor at the same position.
    pub fn as_cursor(&self) -> Cursor<'_, K, V> {
        Cursor::new(&*self.tree, self.current)
    }
}

impl<K, V> Iter<'_, K, V> {
    fn take_front(&mut self) -> Link<K, V> {
        let node_ptr = self.front?;
        if self.front == self.back {
            self.front = None;
            self.back = None;
        } else {
            self.front = unsafe { Node::successor(node_ptr) };
        }
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= 1;
        }
        Some(node_ptr)
    }

    fn take_back(&mut self) -> Link<K, V> {
        let node_ptr = self.back?;
        if self.front == self.back {
            self.front = None;
            self.back = None;
        } else {
            self.back = unsafe { Node::predecessor(node_ptr) };
        }
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= 1;
        }
        Some(node_ptr)
    }
}

// Auto derived clone seems to have an invalid type bound of K: Clone
impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            front: self.front,
            back: self.back,
            remaining: self.remaining,
            marker: PhantomData,
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);
    fn next(&mut self) -> Option<Self::Item> {
        self.take_front().map(|node_ptr| unsafe { Node::entry(node_ptr) })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match (self.remaining, self.front) {
            (Some(remaining), _) => (remaining, Some(remaining)),
            (None, Some(_)) => (1, None),
            (None, None) => (0, Some(0)),
        }
    }
}

impl<K, V> DoubleEndedIterator for Iter<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.take_back().map(|node_ptr| unsafe { Node::entry(node_ptr) })
    }
}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Iter<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.clone()).finish()
    }
}

unsafe impl<K: Sync, V: Sync> Send for Iter<'_, K, V> {}
unsafe impl<K: Sync, V: Sync> Sync for Iter<'_, K, V> {}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);
    fn next(&mut self) -> Option<Self::Item> {
        let node_ptr = self.front?;
        if self.front == self.back {
            self.front = None;
            self.back = None;
        } else {
            self.front = unsafe { Node::successor(node_ptr) };
        }
        self.remaining -= 1;
        Some(unsafe { Node::entry_mut(node_ptr) })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> DoubleEndedIterator for IterMut<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let node_ptr = self.back?;
        if self.front == self.back {
            self.front = None;
            self.back = None;
        } else {
            self.back = unsafe { Node::predecessor(node_ptr) };
        }
        self.remaining -= 1;
        Some(unsafe { Node::entry_mut(node_ptr) })
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}
impl<K, V> FusedIterator for IterMut<'_, K, V> {}

impl<K, V> IntoIter<K, V> {
    /// The entries not yet yielded.
    pub(crate) fn remaining(&self) -> &AvlTree<K, V> {
        &self.tree
    }
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);
    fn next(&mut self) -> Option<Self::Item> {
        self.tree.pop_first()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.tree.len(), Some(self.tree.len()))
    }
}

impl<K, V> DoubleEndedIterator for IntoIter<K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.tree.pop_last()
    }
}

impl<K, V> ExactSizeIterator for IntoIter<K, V> {}
impl<K, V> FusedIterator for IntoIter<K, V> {}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for IntoIter<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.tree.iter()).finish()
    }
}
