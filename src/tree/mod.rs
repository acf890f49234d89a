//! Complete Binary Tree Index
//!
//! Secondary index over the live items of a table, used to pick a uniformly
//! random live item in O(log n) without scanning buckets.
//!
//! ## Addressing
//! Items are numbered 1..=n in level order. The path to item `seq` is the
//! binary representation of `seq` below its leading one bit, read from the
//! most significant end: 1 goes right, 0 goes left.
//!
//! ```text
//!              1
//!          /       \
//!        2           3
//!      /   \       /   \
//!     4     5     6     7        7 = 0b111 -> right, right
//! ```
//!
//! Deleting an item moves the last item (sequence n) into the freed slot,
//! so the tree stays complete with no rebalancing.
//!
//! ## Concurrency
//! One mutex guards every structural operation and sampling. Callers may
//! hold a bucket lock while calling in; the tree never calls back into the
//! table.

mod arena;

use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::item::{Item, ItemRef};

use arena::TreeArena;

struct TreeState {
    arena: TreeArena,
    rng: StdRng,
}

/// Level-ordered complete binary tree over shared items
pub struct CompleteBinaryTree {
    state: Mutex<TreeState>,
}

impl CompleteBinaryTree {
    /// Create an empty tree sampling from an entropy-seeded RNG
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Create an empty tree with a reproducible sampling sequence
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            state: Mutex::new(TreeState {
                arena: TreeArena::new(),
                rng,
            }),
        }
    }

    /// Append an item at sequence `n + 1`.
    ///
    /// Returns false if the item is already in a tree.
    pub fn insert(&self, item: &ItemRef) -> bool {
        self.state.lock().arena.insert(Arc::clone(item.arc())).is_some()
    }

    /// Remove an item, moving the last item into its slot.
    ///
    /// Returns false if the item is not in this tree.
    pub fn delete(&self, item: &Item) -> bool {
        self.state.lock().arena.delete(item).is_some()
    }

    /// Item at 1-based level-order position `seq`
    pub fn search_by_sequence(&self, seq: u64) -> Option<ItemRef> {
        self.state
            .lock()
            .arena
            .item_at(seq)
            .map(|item| ItemRef::from(Arc::clone(item)))
    }

    /// Pick a uniformly random active item.
    ///
    /// Inactive items (mid-update) are skipped by redrawing. The lock is held
    /// across all draws. Returns `None` on an empty tree.
    pub fn pick_random_live_item(&self) -> Option<ItemRef> {
        let mut state = self.state.lock();
        let TreeState { arena, rng } = &mut *state;

        let n = arena.len();
        if n == 0 {
            return None;
        }

        loop {
            let seq = rng.gen_range(0..n) + 1;
            if let Some(item) = arena.item_at(seq) {
                if item.is_active() {
                    return Some(ItemRef::from(Arc::clone(item)));
                }
            }
        }
    }

    pub fn len(&self) -> u64 {
        self.state.lock().arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().arena.is_empty()
    }

    /// Current level-order position of `item`, if it is in the tree
    pub fn sequence_of(&self, item: &Item) -> Option<u64> {
        self.state.lock().arena.sequence_of(item)
    }

    pub fn parent_of(&self, item: &Item) -> Option<ItemRef> {
        self.state
            .lock()
            .arena
            .parent_of(item)
            .map(|p| ItemRef::from(Arc::clone(p)))
    }

    /// `(left, right)` children of `item`
    pub fn children_of(&self, item: &Item) -> (Option<ItemRef>, Option<ItemRef>) {
        let state = self.state.lock();
        let (left, right) = state.arena.children_of(item);
        (
            left.map(|c| ItemRef::from(Arc::clone(c))),
            right.map(|c| ItemRef::from(Arc::clone(c))),
        )
    }

    /// Unlink every item
    pub fn clear(&self) {
        self.state.lock().arena.clear();
    }

    /// Verify completeness and parent/child consistency
    pub fn check_invariants(&self) -> Result<(), String> {
        self.state.lock().arena.check_invariants()
    }
}

impl Default for CompleteBinaryTree {
    fn default() -> Self {
        Self::new()
    }
}
