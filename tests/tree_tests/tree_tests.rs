//! Complete Binary Tree Tests
//!
//! Tests verify:
//! - Level-order placement on insert
//! - Last-node splice on delete
//! - Sequence, parent and child lookups
//! - Completeness under random insert/delete sequences
//! - Uniform random sampling and skipping of inactive items

use std::collections::HashMap;

use benchtable::{CompleteBinaryTree, Config, HashTable, Item, ItemRef, KeyMatch};
use proptest::prelude::*;

fn item(name: &str) -> ItemRef {
    ItemRef::new(Item::new(name.as_bytes(), b"v").unwrap())
}

fn key_of(item: &ItemRef) -> String {
    String::from_utf8(item.key().to_vec()).unwrap()
}

fn seven() -> (CompleteBinaryTree, Vec<ItemRef>) {
    let tree = CompleteBinaryTree::with_seed(1);
    let items: Vec<ItemRef> = ["A", "B", "C", "D", "E", "F", "G"]
        .iter()
        .map(|n| item(n))
        .collect();
    for it in &items {
        assert!(tree.insert(it));
    }
    (tree, items)
}

// =============================================================================
// Insert Tests
// =============================================================================

#[test]
fn test_new_tree_is_empty() {
    let tree = CompleteBinaryTree::new();
    assert!(tree.is_empty());
    assert_eq!(tree.len(), 0);
    assert!(tree.search_by_sequence(1).is_none());
    assert!(tree.pick_random_live_item().is_none());
    assert!(tree.check_invariants().is_ok());
}

#[test]
fn test_insert_assigns_level_order_sequences() {
    let (tree, items) = seven();

    assert_eq!(tree.len(), 7);
    for (i, it) in items.iter().enumerate() {
        assert_eq!(tree.sequence_of(it), Some(i as u64 + 1));
        assert!(tree.search_by_sequence(i as u64 + 1).unwrap().ptr_eq(it));
    }
    assert!(tree.check_invariants().is_ok());
}

#[test]
fn test_insert_links_parent_and_children() {
    let (tree, items) = seven();
    let a = &items[0];
    let b = &items[1];

    assert!(tree.parent_of(a).is_none());
    assert!(tree.parent_of(b).unwrap().ptr_eq(a));

    let (left, right) = tree.children_of(b);
    assert_eq!(key_of(&left.unwrap()), "D");
    assert_eq!(key_of(&right.unwrap()), "E");

    let (left, right) = tree.children_of(&items[3]);
    assert!(left.is_none());
    assert!(right.is_none());
}

#[test]
fn test_insert_same_item_twice_is_refused() {
    let tree = CompleteBinaryTree::new();
    let a = item("A");

    assert!(tree.insert(&a));
    assert!(!tree.insert(&a));
    assert_eq!(tree.len(), 1);
}

#[test]
fn test_search_out_of_range() {
    let (tree, _items) = seven();
    assert!(tree.search_by_sequence(0).is_none());
    assert!(tree.search_by_sequence(8).is_none());
}

// =============================================================================
// Delete Tests
// =============================================================================

#[test]
fn test_delete_moves_last_node_into_slot() {
    let (tree, items) = seven();
    let a = &items[0];
    let b = &items[1];
    let g = &items[6];

    assert!(tree.delete(b));

    assert_eq!(tree.len(), 6);
    assert_eq!(tree.sequence_of(g), Some(2));
    assert!(tree.parent_of(g).unwrap().ptr_eq(a));

    let (left, right) = tree.children_of(g);
    assert_eq!(key_of(&left.unwrap()), "D");
    assert_eq!(key_of(&right.unwrap()), "E");

    // C keeps F and loses its right child
    let (left, right) = tree.children_of(&items[2]);
    assert_eq!(key_of(&left.unwrap()), "F");
    assert!(right.is_none());

    assert!(tree.sequence_of(b).is_none());
    assert!(tree.check_invariants().is_ok());
}

#[test]
fn test_delete_last_node() {
    let (tree, items) = seven();

    assert!(tree.delete(&items[6]));
    assert_eq!(tree.len(), 6);
    for (i, it) in items.iter().take(6).enumerate() {
        assert_eq!(tree.sequence_of(it), Some(i as u64 + 1));
    }
    assert!(tree.check_invariants().is_ok());
}

#[test]
fn test_delete_root() {
    let (tree, items) = seven();

    assert!(tree.delete(&items[0]));
    assert_eq!(tree.sequence_of(&items[6]), Some(1));
    assert!(tree.parent_of(&items[6]).is_none());
    assert!(tree.check_invariants().is_ok());
}

#[test]
fn test_delete_parent_of_last_node() {
    let (tree, items) = seven();

    // G is C's right child; deleting C moves G into C's own slot
    assert!(tree.delete(&items[2]));
    assert_eq!(tree.sequence_of(&items[6]), Some(3));
    let (left, right) = tree.children_of(&items[6]);
    assert_eq!(key_of(&left.unwrap()), "F");
    assert!(right.is_none());
    assert!(tree.check_invariants().is_ok());
}

#[test]
fn test_delete_only_item() {
    let tree = CompleteBinaryTree::new();
    let a = item("A");

    tree.insert(&a);
    assert!(tree.delete(&a));
    assert!(tree.is_empty());
    assert!(tree.check_invariants().is_ok());

    // A deleted item can be inserted again
    assert!(tree.insert(&a));
    assert_eq!(tree.sequence_of(&a), Some(1));
}

#[test]
fn test_delete_foreign_item() {
    let (tree, _items) = seven();
    let other = item("Z");

    assert!(!tree.delete(&other));
    assert_eq!(tree.len(), 7);
}

#[test]
fn test_clear_unlinks_everything() {
    let (tree, items) = seven();

    tree.clear();
    assert!(tree.is_empty());
    assert!(tree.sequence_of(&items[0]).is_none());
    assert!(tree.insert(&items[0]));
}

// =============================================================================
// Sampling Tests
// =============================================================================

#[test]
fn test_pick_random_single_item() {
    let tree = CompleteBinaryTree::with_seed(3);
    let a = item("A");
    tree.insert(&a);

    for _ in 0..100 {
        assert!(tree.pick_random_live_item().unwrap().ptr_eq(&a));
    }
}

#[test]
fn test_pick_random_is_roughly_uniform() {
    let tree = CompleteBinaryTree::with_seed(42);
    let items: Vec<ItemRef> = (0..10).map(|i| item(&format!("k{}", i))).collect();
    for it in &items {
        tree.insert(it);
    }

    let draws = 100_000;
    let mut counts: HashMap<String, u32> = HashMap::new();
    for _ in 0..draws {
        let picked = tree.pick_random_live_item().unwrap();
        *counts.entry(key_of(&picked)).or_default() += 1;
    }

    assert_eq!(counts.len(), 10);
    for (key, count) in counts {
        assert!(
            (9_000..=11_000).contains(&count),
            "{} picked {} times",
            key,
            count
        );
    }
}

#[test]
fn test_pick_random_skips_retiring_items() {
    let config = Config::builder()
        .hash_power(8)
        .key_match(KeyMatch::Exact)
        .sampler_seed(11)
        .build();
    let table = HashTable::new(config).unwrap();
    table.put(b"stay", b"1").unwrap();
    table.put(b"go", b"2").unwrap();

    // Hold "go" in the tree while it is inactive: a reader pins it and a
    // concurrent update retires it.
    let guard = table.start_access(b"go").unwrap();
    std::thread::scope(|s| {
        let updater = s.spawn(|| table.put(b"go", b"22").unwrap());

        while table.lookup(b"go").unwrap().is_active() {
            std::thread::yield_now();
        }
        for _ in 0..200 {
            let picked = table.pick_random_live_item().unwrap();
            assert_eq!(&picked.key()[..], b"stay");
        }

        drop(guard);
        updater.join().unwrap();
    });

    assert_eq!(&table.lookup(b"go").unwrap().value()[..], b"22");
}

#[test]
fn test_seeded_trees_sample_identically() {
    let first = CompleteBinaryTree::with_seed(9);
    let second = CompleteBinaryTree::with_seed(9);
    let items: Vec<ItemRef> = (0..32).map(|i| item(&format!("k{}", i))).collect();
    for it in &items {
        first.insert(it);
    }
    let copies: Vec<ItemRef> = (0..32).map(|i| item(&format!("k{}", i))).collect();
    for it in &copies {
        second.insert(it);
    }

    for _ in 0..100 {
        let a = first.pick_random_live_item().unwrap();
        let b = second.pick_random_live_item().unwrap();
        assert_eq!(key_of(&a), key_of(&b));
    }
}

// =============================================================================
// Property Tests
// =============================================================================

proptest! {
    #[test]
    fn prop_random_insert_delete_keeps_tree_complete(
        ops in prop::collection::vec((any::<bool>(), 0usize..64), 1..200)
    ) {
        let tree = CompleteBinaryTree::with_seed(0);
        let pool: Vec<ItemRef> = (0..64).map(|i| item(&format!("p{}", i))).collect();
        let mut linked = vec![false; pool.len()];

        for (insert, idx) in ops {
            if insert {
                prop_assert_eq!(tree.insert(&pool[idx]), !linked[idx]);
                linked[idx] = true;
            } else {
                prop_assert_eq!(tree.delete(&pool[idx]), linked[idx]);
                linked[idx] = false;
            }

            prop_assert_eq!(tree.len(), linked.iter().filter(|l| **l).count() as u64);
            prop_assert!(tree.check_invariants().is_ok());
        }

        // Every non-root item sits under the item at floor(k / 2)
        for (idx, it) in pool.iter().enumerate() {
            match tree.sequence_of(it) {
                Some(1) => prop_assert!(tree.parent_of(it).is_none()),
                Some(k) => {
                    let parent = tree.parent_of(it).unwrap();
                    prop_assert_eq!(tree.sequence_of(&parent), Some(k / 2));
                }
                None => prop_assert!(!linked[idx]),
            }
        }
    }
}
