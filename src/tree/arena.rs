//! Node arena for the complete binary tree
//!
//! Nodes live in a slab addressed by stable [`NodeId`]s. A node keeps its id
//! for as long as its item is in the tree, even when a delete moves it to a
//! different level-order position. Absent links are `None`.

use std::sync::Arc;

use crate::item::{Item, NO_NODE};

/// Stable index of a node in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(usize);

struct Node {
    item: Arc<Item>,
    parent: Option<NodeId>,
    left: Option<NodeId>,
    right: Option<NodeId>,
}

/// Complete binary tree over arena nodes. Not synchronized.
#[derive(Default)]
pub struct TreeArena {
    slots: Vec<Option<Node>>,
    free: Vec<NodeId>,
    root: Option<NodeId>,
    len: u64,
}

/// floor(log2(seq)) for seq >= 1
#[inline]
fn depth_of(seq: u64) -> u32 {
    63 - seq.leading_zeros()
}

impl TreeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    // =========================================================================
    // Structural Operations
    // =========================================================================

    /// Append `item` at level-order position `len + 1`.
    ///
    /// Returns `None` if the item is already linked into a tree.
    pub fn insert(&mut self, item: Arc<Item>) -> Option<NodeId> {
        if item.node() != NO_NODE {
            return None;
        }

        let seq = self.len + 1;
        let id = self.alloc(Node {
            item,
            parent: None,
            left: None,
            right: None,
        });

        if self.root.is_none() {
            self.root = Some(id);
        } else {
            // Bits e-1 ..= 1 of seq lead to the parent; bit 0 picks the side.
            let parent = self.walk(seq, 1);
            let parent_node = self.node_mut(parent);
            if seq & 1 == 1 {
                parent_node.right = Some(id);
            } else {
                parent_node.left = Some(id);
            }
            self.node_mut(id).parent = Some(parent);
        }

        self.len += 1;
        Some(id)
    }

    /// Remove `item` by moving the last node in level order into its slot.
    ///
    /// Returns the removed item, or `None` if it is not in this tree.
    pub fn delete(&mut self, item: &Item) -> Option<Arc<Item>> {
        let id = self.id_of(item)?;
        let last = self.walk(self.len, 0);

        if last == id {
            self.detach(id);
        } else {
            // `last` is a leaf and never the root here.
            self.detach(last);

            // Read links only after detaching `last`; it may have been a child of `id`.
            let (parent, left, right) = {
                let node = self.node(id);
                (node.parent, node.left, node.right)
            };

            match parent {
                Some(p) => {
                    let parent_node = self.node_mut(p);
                    if parent_node.left == Some(id) {
                        parent_node.left = Some(last);
                    } else {
                        parent_node.right = Some(last);
                    }
                }
                None => self.root = Some(last),
            }

            let moved = self.node_mut(last);
            moved.parent = parent;
            moved.left = left;
            moved.right = right;

            for child in [left, right].into_iter().flatten() {
                self.node_mut(child).parent = Some(last);
            }
        }

        self.len -= 1;
        let node = self.release(id);
        Some(node.item)
    }

    /// Node at 1-based level-order position `seq`
    pub fn search(&self, seq: u64) -> Option<NodeId> {
        if seq == 0 || seq > self.len {
            return None;
        }
        Some(self.walk(seq, 0))
    }

    /// Item at 1-based level-order position `seq`
    pub fn item_at(&self, seq: u64) -> Option<&Arc<Item>> {
        self.search(seq).map(|id| &self.node(id).item)
    }

    /// Current level-order position of `item`
    pub fn sequence_of(&self, item: &Item) -> Option<u64> {
        let id = self.id_of(item)?;
        Some(self.sequence_of_node(id))
    }

    pub fn parent_of(&self, item: &Item) -> Option<&Arc<Item>> {
        let id = self.id_of(item)?;
        self.node(id).parent.map(|p| &self.node(p).item)
    }

    pub fn children_of(&self, item: &Item) -> (Option<&Arc<Item>>, Option<&Arc<Item>>) {
        match self.id_of(item) {
            Some(id) => {
                let node = self.node(id);
                (
                    node.left.map(|c| &self.node(c).item),
                    node.right.map(|c| &self.node(c).item),
                )
            }
            None => (None, None),
        }
    }

    /// Drop every node and unlink all items
    pub fn clear(&mut self) {
        for node in self.slots.drain(..).flatten() {
            node.item.set_node(NO_NODE);
        }
        self.free.clear();
        self.root = None;
        self.len = 0;
    }

    /// Verify completeness and link consistency
    pub fn check_invariants(&self) -> Result<(), String> {
        let root = match self.root {
            Some(root) => root,
            None if self.len == 0 => return Ok(()),
            None => return Err(format!("no root but len is {}", self.len)),
        };
        if self.node(root).parent.is_some() {
            return Err("root has a parent".to_string());
        }

        // Breadth-first over (node, expected sequence)
        let mut queue = std::collections::VecDeque::from([(root, 1u64)]);
        let mut seen = 0u64;
        while let Some((id, seq)) = queue.pop_front() {
            seen += 1;
            let node = self.node(id);

            if node.item.node() != self.index_of(id) {
                return Err(format!("item at sequence {} points at another node", seq));
            }
            if self.search(seq) != Some(id) {
                return Err(format!("bit path for sequence {} does not reach its node", seq));
            }

            for (child, child_seq) in [(node.left, 2 * seq), (node.right, 2 * seq + 1)] {
                match child {
                    Some(c) => {
                        if child_seq > self.len {
                            return Err(format!("sequence {} beyond len {}", child_seq, self.len));
                        }
                        if self.node(c).parent != Some(id) {
                            return Err(format!("child {} has wrong parent", child_seq));
                        }
                        queue.push_back((c, child_seq));
                    }
                    None if child_seq <= self.len => {
                        return Err(format!("gap at sequence {}", child_seq));
                    }
                    None => {}
                }
            }
        }

        if seen != self.len {
            return Err(format!("reached {} nodes but len is {}", seen, self.len));
        }
        Ok(())
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Follow the bits of `seq` from `floor(log2(seq)) - 1` down to `stop`
    /// starting at the root: 1 goes right, 0 goes left.
    fn walk(&self, seq: u64, stop: u32) -> NodeId {
        let mut cur = self.root.expect("walk on empty tree");
        let depth = depth_of(seq);
        for bit in (stop..depth).rev() {
            let node = self.node(cur);
            let next = if (seq >> bit) & 1 == 1 {
                node.right
            } else {
                node.left
            };
            cur = next.expect("complete tree has no gaps below len");
        }
        cur
    }

    fn sequence_of_node(&self, id: NodeId) -> u64 {
        let mut bits = Vec::new();
        let mut cur = id;
        while let Some(parent) = self.node(cur).parent {
            bits.push(self.node(parent).right == Some(cur));
            cur = parent;
        }
        bits.iter()
            .rev()
            .fold(1u64, |seq, &right| (seq << 1) | u64::from(right))
    }

    fn id_of(&self, item: &Item) -> Option<NodeId> {
        let raw = item.node();
        let node = self.slots.get(raw)?.as_ref()?;
        if std::ptr::eq(Arc::as_ptr(&node.item), item) {
            Some(NodeId(raw))
        } else {
            None
        }
    }

    fn index_of(&self, id: NodeId) -> usize {
        id.0
    }

    /// Unlink a node from its parent (or clear the root)
    fn detach(&mut self, id: NodeId) {
        match self.node(id).parent {
            Some(p) => {
                let parent_node = self.node_mut(p);
                if parent_node.left == Some(id) {
                    parent_node.left = None;
                } else {
                    parent_node.right = None;
                }
            }
            None => self.root = None,
        }
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        let id = match self.free.pop() {
            Some(id) => {
                self.slots[id.0] = Some(node);
                id
            }
            None => {
                self.slots.push(Some(node));
                NodeId(self.slots.len() - 1)
            }
        };
        self.node(id).item.set_node(id.0);
        id
    }

    fn release(&mut self, id: NodeId) -> Node {
        let node = self.slots[id.0].take().expect("released node is live");
        node.item.set_node(NO_NODE);
        self.free.push(id);
        node
    }

    fn node(&self, id: NodeId) -> &Node {
        self.slots[id.0].as_ref().expect("dangling node id")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.slots[id.0].as_mut().expect("dangling node id")
    }
}
