use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;

use super::tree::{AvlTree, Duplicates};
use super::{AvlTreeMap, AvlTreeMultiset, AvlTreeSet, OutOfRange};

const N: i32 = 1_000;
const LARGE_N: i32 = 10_000_000;

#[test]
fn test_new() {
    let map_i32 = AvlTreeMap::<i32, ()>::new();
    assert!(map_i32.is_empty());
    map_i32.check_consistency();

    let map_i8 = AvlTreeMap::<i8, ()>::new();
    assert!(map_i8.is_empty());
    map_i8.check_consistency();

    let map_string = AvlTreeMap::<String, String>::new();
    assert!(map_string.is_empty());
    map_string.check_consistency();

    let set = AvlTreeSet::<u64>::new();
    assert!(set.is_empty());
    assert!(set.max_size() > 0);
    assert_eq!(set.begin(), set.end());

    let bag = AvlTreeMultiset::<u64>::default();
    assert_eq!(bag.len(), 0);
    assert!(bag.max_size() > 0);
}

#[test]
fn test_rebalance() {
    {
        //     3 ->   2
        //    /      / \
        //   2      1   3
        //  /
        // 1
        let mut map = AvlTreeMap::new();
        map.insert(3, ());
        map.insert(2, ());
        map.insert(1, ());
        map.check_consistency();
        assert_eq!(map.height(), 1);
    }
    {
        //     3   ->     3 ->   2
        //    / \        /      / \
        //   2   4      2      1   3
        //  /          /
        // 1          1
        let mut map = AvlTreeMap::new();
        map.insert(3, ());
        map.insert(2, ());
        map.insert(4, ());
        map.insert(1, ());
        map.check_consistency();
        assert_eq!(map.height(), 2);
        map.remove(&4);
        map.check_consistency();
        assert_eq!(map.height(), 1);
    }
    {
        //   3  ->   2
        //  /       / \
        // 1       1   3
        //  \
        //   2
        let mut map = AvlTreeMap::new();
        map.insert(3, ());
        map.insert(1, ());
        map.insert(2, ());
        map.check_consistency();
        assert_eq!(map.height(), 1);
    }
    {
        //   3   ->   3  ->   2
        //  / \      /       / \
        // 1   4    1       1   3
        //  \        \
        //   2        2
        let mut map = AvlTreeMap::new();
        map.insert(3, ());
        map.insert(1, ());
        map.insert(4, ());
        map.insert(2, ());
        map.check_consistency();
        assert_eq!(map.height(), 2);
        map.remove(&4);
        map.check_consistency();
        assert_eq!(map.height(), 1);
    }
    {
        // 1 ->    2
        //  \     / \
        //   2   1   3
        //    \
        //     3
        let mut map = AvlTreeMap::new();
        map.insert(1, ());
        map.insert(2, ());
        map.insert(3, ());
        map.check_consistency();
        assert_eq!(map.height(), 1);
    }
    {
        //   1     -> 1     ->    2
        //  / \        \         / \
        // 0   2        2       1   3
        //      \        \
        //       3        3
        let mut map = AvlTreeMap::new();
        map.insert(1, ());
        map.insert(0, ());
        map.insert(2, ());
        map.insert(3, ());
        map.check_consistency();
        assert_eq!(map.height(), 2);
        map.remove(&0);
        map.check_consistency();
        assert_eq!(map.height(), 1);
    }
    {
        // 1   ->  2
        //  \     / \
        //   3   1   3
        //  /
        // 2
        let mut map = AvlTreeMap::new();
        map.insert(1, ());
        map.insert(3, ());
        map.insert(2, ());
        map.check_consistency();
        assert_eq!(map.height(), 1);
    }
    {
        //   1   ->  1   ->  2
        //  / \       \     / \
        // 0   3       3   1   3
        //    /       /
        //   2       2
        let mut map = AvlTreeMap::new();
        map.insert(1, ());
        map.insert(0, ());
        map.insert(3, ());
        map.insert(2, ());
        map.check_consistency();
        assert_eq!(map.height(), 2);
        map.remove(&0);
        map.check_consistency();
        assert_eq!(map.height(), 1);
    }
}

#[test]
fn test_remove_two_children() {
    //     2
    //    / \
    //   1   4
    //      / \
    //     3   5
    let mut map = AvlTreeMap::new();
    for key in [2, 1, 4, 3, 5] {
        map.insert(key, key * 10);
    }
    map.check_consistency();

    assert_eq!(map.remove(&2), Some(20));
    map.check_consistency();
    assert_eq!(map.keys().copied().collect::<Vec<_>>(), [1, 3, 4, 5]);
    assert_eq!(map.values().copied().collect::<Vec<_>>(), [10, 30, 40, 50]);

    assert_eq!(map.remove(&4), Some(40));
    map.check_consistency();
    assert_eq!(map.keys().copied().collect::<Vec<_>>(), [1, 3, 5]);
    assert_eq!(map.remove(&4), None);
}

#[test]
fn test_insert() {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    let mut rng = StdRng::seed_from_u64(0);
    let mut values: Vec<i32> = (0..N).map(|_| rng.gen()).collect();
    values.sort();
    values.dedup();

    let mut map = AvlTreeMap::new();
    for value in &values {
        assert!(map.insert(*value, *value).1);
        map.check_consistency();
    }
    assert!(map.len() == values.len());

    for value in &values {
        assert!(!map.insert(*value, *value).1);
    }
    assert!(map.len() == values.len());
}

#[test]
fn test_insert_returns_cursor() {
    let mut map = AvlTreeMap::new();
    map.insert(1, "one");
    map.insert(3, "three");

    let (cursor, inserted) = map.insert(2, "two");
    assert!(inserted);
    assert_eq!(cursor.get(), Ok((&2, &"two")));
    let mut next = cursor;
    next.move_next();
    assert_eq!(next.key(), Ok(&3));

    let (cursor, inserted) = map.insert(2, "deux");
    assert!(!inserted);
    assert_eq!(cursor.value(), Ok(&"two"));
    assert_eq!(map.get(&2), Some(&"two"));
}

#[test]
fn test_insert_sorted_range() {
    let mut map = AvlTreeMap::new();
    for value in 0..N {
        assert!(map.insert(value, value).1);
        map.check_consistency();
    }
    assert!(map.len() == N as usize);
    assert!(map.height() > 0);
    assert!(map.height() < N as usize / 2);
    assert!(map.get(&-42).is_none());
}

#[test]
fn test_insert_shuffled_range() {
    use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

    let mut values: Vec<i32> = (0..N).collect();
    let mut rng = StdRng::seed_from_u64(0);
    values.shuffle(&mut rng);

    let mut map = AvlTreeMap::new();
    for value in &values {
        assert!(map.insert(*value, "foo").1);
        map.check_consistency();
    }
    assert!(map.len() == values.len());

    for value in &values {
        assert!(!map.insert(*value, "bar").1);
    }
    assert!(map.len() == values.len());
    assert!(map.get(&-42).is_none());
}

#[test]
fn test_insert_or_assign() {
    let mut map = AvlTreeMap::new();
    assert!(map.insert_or_assign(1, String::from("a")).1);

    let (cursor, inserted) = map.insert_or_assign(1, String::from("b"));
    assert!(!inserted);
    assert_eq!(cursor.value().map(String::as_str), Ok("b"));

    assert!(!map.insert(1, String::from("c")).1);
    assert_eq!(map.at(&1).map(String::as_str), Ok("b"));
    assert_eq!(map.len(), 1);
}

#[test]
fn test_insert_many() {
    let mut map = AvlTreeMap::new();
    let inserted = map.insert_many([(3, 'c'), (1, 'a'), (3, 'x'), (2, 'b')]);
    assert_eq!(inserted, [true, true, false, true]);
    assert_eq!(map.get(&3), Some(&'c'));
    map.check_consistency();

    let mut set = AvlTreeSet::new();
    assert_eq!(set.insert_many([3, 1, 3]), [true, true, false]);
    assert_eq!(set.len(), 2);

    let mut bag = AvlTreeMultiset::new();
    assert_eq!(bag.insert_many([3, 1, 3]), [true, true, true]);
    assert_eq!(bag.len(), 3);
    assert!(bag.insert_many(Vec::new()).is_empty());
}

#[test]
fn test_get() {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    let mut rng = StdRng::seed_from_u64(0);
    let values: Vec<i32> = (0..N).map(|_| rng.gen()).collect();

    let mut map = AvlTreeMap::new();
    assert!(map.get(&42).is_none());
    for value in &values {
        map.insert(*value, value.wrapping_add(1));
    }

    for value in &values {
        let got = map.get(value);
        assert_eq!(got, Some(&(value.wrapping_add(1))));
        let got = map.get_key_value(value);
        assert_eq!(got, Some((value, &(value.wrapping_add(1)))));
        assert_eq!(map.at(value), Ok(&(value.wrapping_add(1))));
    }
}

#[test]
fn test_at() {
    let mut map = AvlTreeMap::from([(1, 10), (2, 20)]);
    assert_eq!(map.at(&1), Ok(&10));
    assert_eq!(map.at(&9), Err(OutOfRange::MissingKey));

    *map.at_mut(&2).unwrap() += 1;
    assert_eq!(map.get(&2), Some(&21));
    assert_eq!(map.at_mut(&9), Err(OutOfRange::MissingKey));
    assert_eq!(map.len(), 2);

    assert_eq!(
        OutOfRange::MissingKey.to_string(),
        "key is not present in the container"
    );
    assert_eq!(
        OutOfRange::PastTheEnd.to_string(),
        "cannot dereference a past-the-end cursor"
    );
}

#[test]
fn test_get_or_insert() {
    let mut map: AvlTreeMap<&str, i32> = AvlTreeMap::new();
    *map.get_or_insert_default("a") += 1;
    *map.get_or_insert_default("a") += 1;
    *map.get_or_insert_default("b") += 1;
    assert_eq!(map.get("a"), Some(&2));
    assert_eq!(map.get("b"), Some(&1));

    let mut calls = 0;
    *map.get_or_insert_with("a", || {
        calls += 1;
        100
    }) += 1;
    assert_eq!(calls, 0);
    assert_eq!(map.get("a"), Some(&3));
    assert_eq!(*map.get_or_insert_with("c", || 7), 7);
    assert_eq!(map.len(), 3);
    map.check_consistency();
}

#[test]
fn test_clear() {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    let mut rng = StdRng::seed_from_u64(0);
    let mut values: Vec<i32> = (0..N).map(|_| rng.gen()).collect();
    values.sort();
    values.dedup();

    let mut map = AvlTreeMap::new();
    for value in &values {
        map.insert(*value, String::from("foo"));
    }
    assert!(!map.is_empty());
    assert!(map.len() == values.len());

    map.clear();
    assert!(map.is_empty());
    assert!(map.len() == 0);
    assert!(map.begin().is_end());

    for value in &values {
        assert!(map.insert(*value, String::from("bar")).1);
    }
    assert!(!map.is_empty());
    assert!(map.len() == values.len());
    map.check_consistency();
}

#[test]
fn test_remove() {
    use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};

    let mut rng = StdRng::seed_from_u64(0);
    let mut values: Vec<i32> = (0..N).map(|_| rng.gen()).collect();
    values.sort();
    values.dedup();

    let mut map = AvlTreeMap::new();
    for value in &values {
        map.insert(*value, 42);
    }

    values.shuffle(&mut rng);
    for value in &values {
        assert!(map.get(value).is_some());
        assert_eq!(map.remove(value), Some(42));
        assert!(map.get(value).is_none());
        map.check_consistency();
    }
    assert!(map.is_empty());
    assert!(map.len() == 0);
}

#[test]
fn test_remove_current() {
    let mut map: AvlTreeMap<i32, i32> = (1..=5).map(|k| (k, k * k)).collect();

    let mut cursor = map.find_mut(&3);
    assert_eq!(cursor.remove_current(), Some((3, 9)));
    assert_eq!(cursor.get(), Ok((&4, &16)));
    assert_eq!(map.find(&3), map.end());
    assert_eq!(map.len(), 4);
    map.check_consistency();

    let mut cursor = map.find_mut(&42);
    assert!(cursor.is_end());
    assert_eq!(cursor.remove_current(), None);
    assert_eq!(map.len(), 4);

    let mut cursor = map.begin_mut();
    while cursor.remove_current().is_some() {}
    assert!(map.is_empty());
    map.check_consistency();
}

#[test]
fn test_cursor_value_mut() {
    let mut map = AvlTreeMap::from([(1, 'a'), (2, 'b'), (3, 'c')]);

    let mut cursor = map.find_mut(&2);
    *cursor.value_mut().unwrap() = 'x';
    assert_eq!(cursor.as_cursor().value(), Ok(&'x'));
    cursor.move_next();
    cursor.move_next();
    assert!(cursor.is_end());
    assert_eq!(cursor.value_mut(), Err(OutOfRange::PastTheEnd));
    cursor.move_prev();
    assert_eq!(cursor.get(), Ok((&3, &'c')));

    assert_eq!(map.get(&2), Some(&'x'));
}

#[test]
fn test_cursor_navigation() {
    let map: AvlTreeMap<i32, ()> = (0..10).map(|k| (k, ())).collect();

    let mut cursor = map.end();
    assert!(cursor.is_end());
    assert_eq!(cursor.get(), Err(OutOfRange::PastTheEnd));
    assert_eq!(cursor.key(), Err(OutOfRange::PastTheEnd));

    cursor.move_next();
    assert!(cursor.is_end());

    cursor.move_prev();
    assert_eq!(cursor.key(), Ok(&9));

    let mut cursor = map.begin();
    assert_eq!(cursor.key(), Ok(&0));
    cursor.move_prev();
    assert_eq!(cursor, map.end());
    cursor.move_prev();
    assert_eq!(cursor.key(), Ok(&9));

    let mut cursor = map.begin();
    let mut keys = Vec::new();
    while let Ok(key) = cursor.key() {
        keys.push(*key);
        cursor.move_next();
    }
    assert_eq!(keys, (0..10).collect::<Vec<_>>());
    assert_eq!(cursor, map.end());

    let mut keys = Vec::new();
    loop {
        cursor.move_prev();
        match cursor.key() {
            Ok(key) => keys.push(*key),
            Err(_) => break,
        }
    }
    assert_eq!(keys, (0..10).rev().collect::<Vec<_>>());
}

#[test]
fn test_cursor_empty() {
    let map = AvlTreeMap::<i32, i32>::new();
    let mut cursor = map.begin();
    assert_eq!(cursor, map.end());
    cursor.move_prev();
    assert!(cursor.is_end());
    cursor.move_next();
    assert!(cursor.is_end());
    assert_eq!(cursor.until(map.end()).count(), 0);
}

#[test]
fn test_bounds() {
    let map: AvlTreeMap<i32, i32> = (0..10).map(|k| (k * 2, k)).collect();

    assert_eq!(map.lower_bound(&4).key(), Ok(&4));
    assert_eq!(map.lower_bound(&5).key(), Ok(&6));
    assert_eq!(map.upper_bound(&4).key(), Ok(&6));
    assert_eq!(map.lower_bound(&-1).key(), Ok(&0));
    assert!(map.lower_bound(&19).is_end());
    assert!(map.upper_bound(&18).is_end());

    let first = map.lower_bound(&3);
    let last = map.upper_bound(&9);
    assert_eq!(first.distance_to(&last), 3);
    let keys: Vec<i32> = first.until(last).map(|(k, _)| *k).collect();
    assert_eq!(keys, [4, 6, 8]);
    let keys: Vec<i32> = first.until(last).rev().map(|(k, _)| *k).collect();
    assert_eq!(keys, [8, 6, 4]);

    assert_eq!(map.begin().until(map.end()).count(), map.len());
    assert_eq!(map.begin().distance_to(&map.end()), map.len());
    assert_eq!(map.end().distance_to(&map.begin()), 0);
}

#[test]
fn test_pop() {
    let mut map: AvlTreeMap<i32, char> = [(2, 'b'), (1, 'a'), (3, 'c')].into_iter().collect();
    assert_eq!(map.pop_first(), Some((1, 'a')));
    assert_eq!(map.pop_last(), Some((3, 'c')));
    assert_eq!(map.pop_last(), Some((2, 'b')));
    assert_eq!(map.pop_first(), None);
    assert_eq!(map.pop_last(), None);
    map.check_consistency();
}

#[test]
fn test_swap() {
    let mut a = AvlTreeSet::from([1, 2, 3]);
    let mut b = AvlTreeSet::from([7]);
    a.swap(&mut b);
    assert_eq!(a.iter().copied().collect::<Vec<_>>(), [7]);
    assert_eq!(b.iter().copied().collect::<Vec<_>>(), [1, 2, 3]);
    a.check_consistency();
    b.check_consistency();

    let mut m = AvlTreeMap::from([(1, 1)]);
    let mut n = AvlTreeMap::new();
    m.swap(&mut n);
    assert!(m.is_empty());
    assert_eq!(n.len(), 1);
}

#[test]
fn test_clone() {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    let mut rng = StdRng::seed_from_u64(0);
    let mut map = AvlTreeMap::new();
    for _ in 0..N {
        let key: i32 = rng.gen_range(0..N);
        map.insert(key, key.to_string());
    }

    let mut copy = map.clone();
    copy.check_consistency();
    assert_eq!(copy.height(), map.height());
    assert_eq!(copy.len(), map.len());
    assert!(copy.iter().eq(map.iter()));
    assert_eq!(copy, map);

    let first = *copy.begin().key().unwrap();
    copy.remove(&first);
    assert_ne!(copy, map);
    assert!(map.contains_key(&first));
    map.check_consistency();

    let empty = AvlTreeMap::<i32, i32>::new();
    assert!(empty.clone().is_empty());
}

#[test]
fn test_clone_shape() {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    let mut rng = StdRng::seed_from_u64(0);
    let mut tree = AvlTree::new();
    for _ in 0..N {
        let key: i32 = rng.gen_range(0..N);
        if rng.gen_range(0..3) == 0 {
            tree.remove(&key);
        } else {
            tree.insert(key, key * 2, Duplicates::Allow);
        }
    }
    tree.check_consistency();

    let copy = tree.clone();
    copy.check_consistency();
    assert_eq!(copy.shape(), tree.shape());
    assert_eq!(copy.shape().len(), tree.len());

    // Same entries inserted in another order give a differently shaped tree
    let mut other = AvlTree::new();
    for (key, value) in tree.iter().rev() {
        other.insert(*key, *value, Duplicates::Allow);
    }
    assert!(other.iter().eq(tree.iter()));
    assert_ne!(other.shape(), tree.shape());
}

#[test]
fn test_until() {
    let set = AvlTreeSet::from([1, 2, 3]);
    let values: Vec<i32> = set.find(&1).until(set.find(&3)).copied().collect();
    assert_eq!(values, [1, 2]);
    assert_eq!(set.find(&2).until(set.find(&2)).count(), 0);
    assert_eq!(set.find(&3).until(set.end()).count(), 1);
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "end cursor is positioned before the start cursor")]
fn test_until_reversed_bounds() {
    let set = AvlTreeSet::from([1, 2, 3]);
    set.find(&3).until(set.find(&1)).count();
}

#[test]
fn test_insert_or_assign_keeps_position() {
    let mut tree = AvlTree::new();
    for (key, tag) in [(1, 'a'), (2, 'b'), (2, 'c'), (3, 'e'), (2, 'd')] {
        tree.insert(key, tag, Duplicates::Allow);
    }
    let before: Vec<(i32, char)> = tree.iter().map(|(k, v)| (*k, *v)).collect();
    assert_eq!(before, [(1, 'a'), (2, 'd'), (2, 'c'), (2, 'b'), (3, 'e')]);
    let shape = tree.shape();

    let found = tree.find(&2);
    let index = tree.begin().distance_to(&found);

    let (cursor, inserted) = tree.insert_or_assign(2, 'x');
    assert!(!inserted);
    assert_eq!(cursor.value(), Ok(&'x'));

    let found = tree.find(&2);
    assert_eq!(found.value(), Ok(&'x'));
    assert_eq!(tree.begin().distance_to(&found), index);

    let after: Vec<(i32, char)> = tree.iter().map(|(k, v)| (*k, *v)).collect();
    for (i, (old, new)) in before.iter().zip(&after).enumerate() {
        if i == index {
            assert_eq!(*new, (2, 'x'));
        } else {
            assert_eq!(old, new);
        }
    }
    assert_eq!(tree.len(), 5);
    assert_eq!(tree.shape(), shape);
    tree.check_consistency();
}

#[test]
fn test_merge() {
    let mut a = AvlTreeSet::from([1, 2, 3]);
    let mut b = AvlTreeSet::from([2, 3, 4]);
    a.merge(&mut b);
    assert_eq!(a.iter().copied().collect::<Vec<_>>(), [1, 2, 3, 4]);
    assert_eq!(b.iter().copied().collect::<Vec<_>>(), [2, 3]);
    a.check_consistency();
    b.check_consistency();

    let mut m = AvlTreeMap::from([(1, 'a'), (2, 'b')]);
    let mut n = AvlTreeMap::from([(2, 'x'), (5, 'e')]);
    m.merge(&mut n);
    assert_eq!(m.get(&2), Some(&'b'));
    assert_eq!(m.get(&5), Some(&'e'));
    assert_eq!(n.iter().collect::<Vec<_>>(), [(&2, &'x')]);

    let mut x = AvlTreeMultiset::from([1, 2, 3]);
    let mut y = AvlTreeMultiset::from([2, 3, 4]);
    x.merge(&mut y);
    assert_eq!(x.iter().copied().collect::<Vec<_>>(), [1, 2, 2, 3, 3, 4]);
    assert!(y.is_empty());
    x.check_consistency();
}

#[test]
fn test_set() {
    use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};

    let mut rng = StdRng::seed_from_u64(0);
    let mut values: Vec<i32> = (0..N).map(|_| rng.gen_range(0..N)).collect();

    let mut set = AvlTreeSet::new();
    for value in &values {
        set.insert(*value);
    }
    set.check_consistency();

    for value in &values {
        let got = set.get(value);
        assert_eq!(got, Some(value));
        assert_eq!(set.find(value).get(), Ok(value));
    }

    values.shuffle(&mut rng);
    values.resize(values.len() / 2, 0);
    for value in &values {
        set.remove(value);
        assert!(!set.contains(value));
    }
    set.check_consistency();
}

#[test]
fn test_set_take() {
    let mut set: AvlTreeSet<String> = ["b", "a", "c"].iter().map(|s| s.to_string()).collect();
    assert_eq!(set.take("a"), Some(String::from("a")));
    assert_eq!(set.take("a"), None);
    assert!(set.remove("c"));
    assert!(!set.remove("c"));
    assert_eq!(set.len(), 1);

    let mut cursor = set.find_mut("b");
    assert_eq!(cursor.remove_current(), Some(String::from("b")));
    assert!(cursor.is_end());
    assert!(set.is_empty());
}

#[test]
fn test_multiset() {
    let bag = AvlTreeMultiset::from([10, 20, 20, 30]);
    bag.check_consistency();
    assert_eq!(bag.len(), 4);
    assert_eq!(bag.count(&20), 2);
    assert_eq!(bag.count(&25), 0);
    assert!(bag.contains(&30));
    assert!(!bag.contains(&25));

    assert_eq!(bag.lower_bound(&20).get(), Ok(&20));
    assert_eq!(bag.upper_bound(&20).get(), Ok(&30));
    assert!(bag.upper_bound(&30).is_end());

    let (first, last) = bag.equal_range(&20);
    assert_eq!(first.until(last).copied().collect::<Vec<_>>(), [20, 20]);
    let mut before = first;
    before.move_prev();
    assert_eq!(before.get(), Ok(&10));

    let (first, last) = bag.equal_range(&15);
    assert_eq!(first, last);
    assert_eq!(first.get(), Ok(&20));

    assert_eq!(
        bag.into_iter().rev().collect::<Vec<_>>(),
        [30, 20, 20, 10]
    );
}

#[test]
fn test_multiset_remove() {
    let mut bag: AvlTreeMultiset<i32> = [5, 1, 5, 3, 5, 7, 5].into_iter().collect();
    assert_eq!(bag.count(&5), 4);

    assert!(bag.remove_one(&5));
    assert_eq!(bag.count(&5), 3);
    bag.check_consistency();

    assert_eq!(bag.remove_all(&5), 3);
    assert_eq!(bag.count(&5), 0);
    assert_eq!(bag.remove_all(&5), 0);
    assert!(!bag.remove_one(&5));
    assert_eq!(bag.iter().copied().collect::<Vec<_>>(), [1, 3, 7]);
    bag.check_consistency();

    let mut cursor = bag.lower_bound_mut(&2);
    assert_eq!(cursor.remove_current(), Some(3));
    assert_eq!(cursor.get(), Ok(&7));
    assert_eq!(bag.len(), 2);
}

#[test]
fn test_duplicates_newest_first() {
    let mut tree = AvlTree::new();
    for (key, tag) in [(20, 'a'), (10, 'x'), (20, 'b'), (30, 'y'), (20, 'c'), (20, 'd')] {
        assert!(tree.insert(key, tag, Duplicates::Allow).1);
        tree.check_consistency();
    }
    let tags: Vec<char> = tree.iter().map(|(_, tag)| *tag).collect();
    assert_eq!(tags, ['x', 'd', 'c', 'b', 'a', 'y']);

    assert_eq!(tree.lower_bound(&20).value(), Ok(&'d'));
    let mut last = tree.upper_bound(&20);
    last.move_prev();
    assert_eq!(last.value(), Ok(&'a'));

    let mut cursor = tree.end_mut();
    cursor.move_prev();
    assert_eq!(cursor.get(), Ok((&30, &'y')));

    assert_eq!(tree.remove(&20).map(|(k, _)| k), Some(20));
    assert_eq!(tree.len(), 5);
    tree.check_consistency();

    let (cursor, inserted) = tree.insert(20, 'z', Duplicates::Reject);
    assert!(!inserted);
    assert_eq!(cursor.key(), Ok(&20));
    assert_eq!(tree.len(), 5);
}

#[test]
fn test_tree_into_iter() {
    let mut tree = AvlTree::new();
    for key in (0..100).rev() {
        tree.insert(key, key.to_string(), Duplicates::Reject);
    }
    let mut into_iter = tree.into_iter();
    assert_eq!(into_iter.len(), 100);
    assert_eq!(into_iter.next(), Some((0, String::from("0"))));
    assert_eq!(into_iter.next_back(), Some((99, String::from("99"))));
    assert_eq!(into_iter.len(), 98);
    assert_eq!(into_iter.map(|(k, _)| k).sum::<i32>(), (1..99).sum());
}

#[test]
fn test_map_iter() {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    let mut rng = StdRng::seed_from_u64(0);
    let mut values: Vec<i32> = (0..N).map(|_| rng.gen()).collect();

    let mut map = AvlTreeMap::new();
    for value in &values {
        map.insert(*value, value.wrapping_add(42));
    }

    values.sort();
    values.dedup();

    let mut map_iter = map.iter();
    for value in &values {
        let kv = map_iter.next();
        assert!(kv.is_some());
        let (&key, &mapped) = kv.unwrap();
        assert_eq!(key, *value);
        assert_eq!(mapped, value.wrapping_add(42));
    }
    assert!(map_iter.next().is_none());

    let mut value_iter = values.iter();
    for (&key, &mapped) in &map {
        let value = value_iter.next();
        assert!(value.is_some());
        let value = value.unwrap();
        assert_eq!(key, *value);
        assert_eq!(mapped, value.wrapping_add(42));
    }
    assert!(value_iter.next().is_none());

    let mut map_iter_mut = map.iter_mut();
    for value in &values {
        let kv = map_iter_mut.next();
        assert!(kv.is_some());
        let (&key, mapped_mut) = kv.unwrap();
        assert_eq!(key, *value);
        assert_eq!(*mapped_mut, value.wrapping_add(42));
        *mapped_mut = value.wrapping_sub(42);
    }
    assert!(map_iter_mut.next().is_none());

    let mut value_iter = values.iter();
    for (&key, mapped_mut) in &mut map {
        let value = value_iter.next();
        assert!(value.is_some());
        let value = value.unwrap();
        assert_eq!(key, *value);
        assert_eq!(*mapped_mut, value.wrapping_sub(42));
        *mapped_mut = 42;
    }
    assert!(value_iter.next().is_none());

    assert!(map.values().all(|mapped| *mapped == 42));
    assert!(map.keys().rev().eq(values.iter().rev()));
    assert_eq!(map.into_iter().map(|(k, _)| k).collect::<Vec<_>>(), values);
}

#[test]
fn test_set_iter() {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    let mut rng = StdRng::seed_from_u64(0);
    let mut values: Vec<i32> = (0..N).map(|_| rng.gen()).collect();

    let mut set = AvlTreeSet::new();
    for value in &values {
        set.insert(*value);
    }

    values.sort();
    values.dedup();

    let mut set_iter = set.iter();
    for value in &values {
        let value_in_set = set_iter.next();
        assert!(value_in_set.is_some());
        let &value_in_set = value_in_set.unwrap();
        assert_eq!(value_in_set, *value);
    }
    assert!(set_iter.next().is_none());

    let mut value_iter = values.iter();
    for &value_in_set in &set {
        let value = value_iter.next();
        assert!(value.is_some());
        let value = value.unwrap();
        assert_eq!(value_in_set, *value);
    }
    assert!(value_iter.next().is_none());

    assert!(set.iter().rev().eq(values.iter().rev()));
    assert_eq!(set.into_iter().collect::<Vec<_>>(), values);
}

#[test]
fn test_debug() {
    let map = AvlTreeMap::from([(2, "b"), (1, "a")]);
    assert_eq!(format!("{map:?}"), r#"{1: "a", 2: "b"}"#);

    let set = AvlTreeSet::from([3, 1, 2]);
    assert_eq!(format!("{set:?}"), "{1, 2, 3}");

    let bag = AvlTreeMultiset::from([2, 1, 2]);
    assert_eq!(format!("{bag:?}"), "[1, 2, 2]");
}

#[test]
#[ignore]
fn test_large() {
    use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};

    let mut rng = StdRng::seed_from_u64(0);
    let mut values: Vec<i32> = (0..LARGE_N).map(|_| rng.gen_range(0..LARGE_N)).collect();

    let mut map = AvlTreeMap::new();
    for value in &values {
        map.insert(*value, *value);
    }
    map.check_consistency();

    values.shuffle(&mut rng);
    values.resize(values.len() / 2, 0);
    for value in &values {
        map.remove(value);
    }
    map.check_consistency();
}

#[derive(Clone, Copy, Debug)]
enum Op {
    Insert(u8),
    Remove(u8),
    Find(u8),
    LowerBound(u8),
    UpperBound(u8),
    PopFirst,
    PopLast,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    // Small keys, so that collisions are common
    let key = 0u8..48;
    prop_oneof![
        3 => key.clone().prop_map(Op::Insert),
        2 => key.clone().prop_map(Op::Remove),
        1 => key.clone().prop_map(Op::Find),
        1 => key.clone().prop_map(Op::LowerBound),
        1 => key.prop_map(Op::UpperBound),
        1 => Just(Op::PopFirst),
        1 => Just(Op::PopLast),
    ]
}

fn run_map_equivalence(ops: &[Op]) {
    let mut map = AvlTreeMap::new();
    let mut model = BTreeMap::new();
    for (step, op) in ops.iter().enumerate() {
        match *op {
            Op::Insert(key) => {
                let inserted = map.insert(key, step).1;
                let expected = !model.contains_key(&key);
                model.entry(key).or_insert(step);
                assert_eq!(inserted, expected);
            }
            Op::Remove(key) => assert_eq!(map.remove(&key), model.remove(&key)),
            Op::Find(key) => assert_eq!(map.find(&key).get().ok(), model.get_key_value(&key)),
            Op::LowerBound(key) => {
                assert_eq!(map.lower_bound(&key).get().ok(), model.range(key..).next())
            }
            Op::UpperBound(key) => {
                let expected = model.range(key..).find(|(k, _)| **k > key);
                assert_eq!(map.upper_bound(&key).get().ok(), expected);
            }
            Op::PopFirst => assert_eq!(map.pop_first(), model.pop_first()),
            Op::PopLast => assert_eq!(map.pop_last(), model.pop_last()),
        }
        map.check_consistency();
    }
    assert_eq!(map.len(), model.len());
    assert!(map.iter().eq(model.iter()));
    assert!(map.iter().rev().eq(model.iter().rev()));
}

fn run_set_equivalence(ops: &[Op]) {
    let mut set = AvlTreeSet::new();
    let mut model = BTreeSet::new();
    for op in ops {
        match *op {
            Op::Insert(key) => assert_eq!(set.insert(key).1, model.insert(key)),
            Op::Remove(key) => assert_eq!(set.remove(&key), model.remove(&key)),
            Op::Find(key) => assert_eq!(set.contains(&key), model.contains(&key)),
            Op::LowerBound(key) => {
                assert_eq!(set.lower_bound(&key).get().ok(), model.range(key..).next())
            }
            Op::UpperBound(key) => {
                let expected = model.range(key..).find(|k| **k > key);
                assert_eq!(set.upper_bound(&key).get().ok(), expected);
            }
            Op::PopFirst => {
                let mut cursor = set.begin_mut();
                assert_eq!(cursor.remove_current(), model.pop_first());
            }
            Op::PopLast => {
                let expected = model.pop_last();
                if let Some(key) = expected {
                    assert!(set.remove(&key));
                } else {
                    assert!(set.is_empty());
                }
            }
        }
        set.check_consistency();
    }
    assert!(set.iter().eq(model.iter()));
}

fn run_multiset_equivalence(ops: &[Op]) {
    let mut bag = AvlTreeMultiset::new();
    // Sorted vector standing in for a multiset
    let mut model: Vec<u8> = Vec::new();
    for op in ops {
        match *op {
            Op::Insert(key) => {
                assert_eq!(bag.insert(key).get(), Ok(&key));
                let pos = model.partition_point(|k| *k < key);
                model.insert(pos, key);
            }
            Op::Remove(key) => {
                let expected = match model.binary_search(&key) {
                    Ok(pos) => {
                        model.remove(pos);
                        true
                    }
                    Err(_) => false,
                };
                assert_eq!(bag.remove_one(&key), expected);
            }
            Op::Find(key) => {
                let expected = model.iter().filter(|k| **k == key).count();
                assert_eq!(bag.count(&key), expected);
            }
            Op::LowerBound(key) => {
                let expected = model.iter().find(|k| **k >= key);
                assert_eq!(bag.lower_bound(&key).get().ok(), expected);
            }
            Op::UpperBound(key) => {
                let expected = model.iter().find(|k| **k > key);
                assert_eq!(bag.upper_bound(&key).get().ok(), expected);
            }
            Op::PopFirst => {
                if model.is_empty() {
                    assert!(bag.is_empty());
                } else {
                    let key = model.remove(0);
                    assert_eq!(bag.begin().get(), Ok(&key));
                    assert!(bag.remove_one(&key));
                }
            }
            Op::PopLast => {
                let mut last = bag.end();
                last.move_prev();
                assert_eq!(last.get().ok(), model.last());
                if let Some(key) = model.pop() {
                    assert!(bag.remove_one(&key));
                }
            }
        }
        bag.check_consistency();
    }
    assert_eq!(bag.len(), model.len());
    assert!(bag.iter().eq(model.iter()));
}

proptest! {
    #[test]
    fn map_equivalence(ops in proptest::collection::vec(op_strategy(), 0..256)) {
        run_map_equivalence(&ops);
    }

    #[test]
    fn set_equivalence(ops in proptest::collection::vec(op_strategy(), 0..256)) {
        run_set_equivalence(&ops);
    }

    #[test]
    fn multiset_equivalence(ops in proptest::collection::vec(op_strategy(), 0..256)) {
        run_multiset_equivalence(&ops);
    }

    #[test]
    fn cursor_walk_matches_iter(keys in proptest::collection::vec(any::<i16>(), 0..128)) {
        let set: AvlTreeSet<i16> = keys.iter().copied().collect();
        let mut forward = Vec::new();
        let mut cursor = set.begin();
        while let Ok(key) = cursor.get() {
            forward.push(*key);
            cursor.move_next();
        }
        let mut backward = Vec::new();
        loop {
            cursor.move_prev();
            match cursor.get() {
                Ok(key) => backward.push(*key),
                Err(_) => break,
            }
        }
        backward.reverse();
        prop_assert_eq!(&forward, &backward);
        prop_assert!(set.iter().eq(forward.iter()));
        prop_assert_eq!(set.clone(), set);
    }
}
