use avl_containers::{AvlTreeMap, AvlTreeMultiset, AvlTreeSet};

fn main() {
    let mut map = AvlTreeMap::new();
    map.insert(0, "zero");
    map.insert(1, "one");
    map.insert(2, "two");
    map.insert(2, "deux");
    map.insert(3, "three");
    map.insert(4, "four");
    map.insert(5, "five");
    assert_eq!(map.get(&2), Some(&"two"));
    map.insert_or_assign(2, "deux");
    assert_eq!(map.at(&2), Ok(&"deux"));
    map.remove(&1);
    assert!(map.get(&1).is_none());

    for (k, v) in &map {
        println!("{k} => {v}");
    }

    // Walk backwards from the past-the-end position
    let mut cursor = map.end();
    cursor.move_prev();
    while let Ok((k, v)) = cursor.get() {
        println!("{k} <= {v}");
        cursor.move_prev();
    }

    let mut set = AvlTreeSet::new();
    for x in 0..5 {
        set.insert(x);
    }
    assert!(set.contains(&1));
    set.remove(&1);
    assert!(!set.contains(&1));

    print!("{{ ");
    for x in &set {
        print!("{x}, ");
    }
    println!("}}");

    let words = AvlTreeMultiset::from(["b", "a", "b", "c", "b"]);
    let (first, last) = words.equal_range("b");
    println!("{} x b: {:?}", words.count("b"), first.until(last).collect::<Vec<_>>());
}
