//! Helpers for assembling a tree by hand.
//!
//! There is no insertion API; trees come from outside, for instance
//! reconstructed slot by slot from a dump of a live system. The builder
//! keeps back-references consistent as entries are attached.

use crate::arena::NodeArena;
use crate::error::Result;
use crate::node::{Node, Shortcut};
use crate::ptr::{Meta, NodeId, ShortcutId, Slot};
use crate::tree::Tree;

pub struct TreeBuilder<L> {
    arena: NodeArena<L>,
    root: Option<Meta>,
}

impl<L> Default for TreeBuilder<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L> TreeBuilder<L> {
    pub fn new() -> Self {
        Self {
            arena: NodeArena::new(),
            root: None,
        }
    }

    /// Allocate an empty node and make it the root.
    pub fn root_node(&mut self) -> Result<NodeId> {
        let id = self.arena.alloc_node(Node::new(None, 0))?;
        self.root = Some(Meta::Node(id));
        Ok(id)
    }

    /// Make a shortcut the root. Returns the shortcut and the empty node it
    /// leads to.
    pub fn root_shortcut(
        &mut self,
        skip_to_level: u32,
        index_key: &[u64],
    ) -> Result<(ShortcutId, NodeId)> {
        let ids = self.shortcut_chain(None, 0, skip_to_level, index_key)?;
        self.root = Some(Meta::Shortcut(ids.0));
        Ok(ids)
    }

    pub fn set_leaf(&mut self, node: NodeId, slot: usize, leaf: L) {
        self.arena.node_mut(node).slots[slot] = Slot::Leaf(leaf);
    }

    /// Attach an empty child node at `parent[slot]`.
    pub fn set_node(&mut self, parent: NodeId, slot: usize) -> Result<NodeId> {
        let back = Some(Meta::Node(parent));
        let child = self.arena.alloc_node(Node::new(back, slot as u8))?;
        self.arena.node_mut(parent).slots[slot] = Slot::Node(child);
        Ok(child)
    }

    /// Attach a shortcut at `parent[slot]`, together with the empty node it
    /// leads to.
    pub fn set_shortcut(
        &mut self,
        parent: NodeId,
        slot: usize,
        skip_to_level: u32,
        index_key: &[u64],
    ) -> Result<(ShortcutId, NodeId)> {
        let back = Some(Meta::Node(parent));
        let ids = self.shortcut_chain(back, slot as u8, skip_to_level, index_key)?;
        self.arena.node_mut(parent).slots[slot] = Slot::Shortcut(ids.0);
        Ok(ids)
    }

    fn shortcut_chain(
        &mut self,
        back: Option<Meta>,
        slot: u8,
        skip_to_level: u32,
        index_key: &[u64],
    ) -> Result<(ShortcutId, NodeId)> {
        let next = self.arena.alloc_node(Node::new(None, 0))?;
        let shortcut = Shortcut::new(back, slot, skip_to_level, next, index_key);
        let id = self.arena.alloc_shortcut(shortcut)?;
        self.arena.node_mut(next).back_pointer = Some(Meta::Shortcut(id));
        Ok((id, next))
    }

    /// Overwrite a node's recorded parent slot and leaf count.
    pub fn set_data(&mut self, node: NodeId, parent_slot: u8, nr_leaves_on_branch: usize) {
        let n = self.arena.node_mut(node);
        n.parent_slot = parent_slot;
        n.nr_leaves_on_branch = nr_leaves_on_branch;
    }

    /// The child node at `parent[slot]`. Panics if the slot holds anything
    /// else.
    pub fn node(&self, parent: NodeId, slot: usize) -> NodeId {
        match self.arena.node(parent).slots[slot] {
            Slot::Node(id) => id,
            _ => panic!("slot {slot} of {parent:?} is not a node"),
        }
    }

    /// The node directly above `node`. Panics if it is a shortcut or the
    /// root.
    pub fn parent(&self, node: NodeId) -> NodeId {
        match self.arena.node(node).back_pointer {
            Some(Meta::Node(id)) => id,
            other => panic!("{node:?} has no parent node ({other:?})"),
        }
    }

    /// Finish the tree, recomputing every node's leaf count and the tree
    /// total.
    pub fn build(mut self) -> Tree<L> {
        let total = match self.root {
            Some(root) => {
                let node = match root {
                    Meta::Node(id) => id,
                    Meta::Shortcut(id) => self.arena.shortcut(id).next_node,
                };
                recount(&mut self.arena, node)
            }
            None => 0,
        };
        self.build_raw(total)
    }

    /// Finish the tree with the counts exactly as recorded.
    pub fn build_raw(self, nr_leaves_on_tree: usize) -> Tree<L> {
        Tree {
            arena: self.arena,
            root: self.root,
            nr_leaves_on_tree,
        }
    }
}

fn recount<L>(arena: &mut NodeArena<L>, id: NodeId) -> usize {
    let children: Vec<NodeId> = arena
        .node(id)
        .slots
        .iter()
        .filter_map(|slot| match *slot {
            Slot::Node(child) => Some(child),
            Slot::Shortcut(s) => Some(arena.shortcut(s).next_node),
            Slot::Empty | Slot::Leaf(_) => None,
        })
        .collect();
    let mut total = arena.node(id).direct_leaves();
    for child in children {
        total += recount(arena, child);
    }
    arena.node_mut(id).nr_leaves_on_branch = total;
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_back_references() {
        let mut b: TreeBuilder<u64> = TreeBuilder::new();
        let root = b.root_node().unwrap();
        b.set_leaf(root, 0, 1);
        let child = b.set_node(root, 4).unwrap();
        b.set_leaf(child, 2, 2);
        let (s, below) = b.set_shortcut(root, 7, 72, &[0x47, 0]).unwrap();
        b.set_leaf(below, 0, 3);
        b.set_leaf(below, 1, 4);

        assert_eq!(b.node(root, 4), child);
        assert_eq!(b.parent(child), root);

        let tree = b.build();
        assert_eq!(tree.len(), 4);
        assert_eq!(tree.node(root).nr_leaves_on_branch, 4);
        assert_eq!(tree.node(child).nr_leaves_on_branch, 1);
        assert_eq!(tree.node(child).parent_slot, 4);
        assert_eq!(tree.shortcut(s).back_pointer, Some(Meta::Node(root)));
        assert_eq!(tree.shortcut(s).parent_slot, 7);
        assert_eq!(tree.node(below).back_pointer, Some(Meta::Shortcut(s)));
        assert!(crate::verify::verify(&tree).is_empty());
    }

    #[test]
    fn raw_build_keeps_recorded_counts() {
        let mut b: TreeBuilder<u64> = TreeBuilder::new();
        let root = b.root_node().unwrap();
        b.set_leaf(root, 0, 1);
        b.set_data(root, 0, 40);
        let tree = b.build_raw(40);
        assert_eq!(tree.len(), 40);
        assert_eq!(tree.node(root).nr_leaves_on_branch, 40);
        assert_eq!(tree.leaves().count(), 1);
    }

    #[test]
    #[should_panic(expected = "is not a node")]
    fn node_lookup_rejects_leaf() {
        let mut b: TreeBuilder<u64> = TreeBuilder::new();
        let root = b.root_node().unwrap();
        b.set_leaf(root, 3, 9);
        b.node(root, 3);
    }
}
