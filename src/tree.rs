//! Published tree versions and the owning array handle.

use std::sync::Arc;

use crate::arena::NodeArena;
use crate::error::Result;
use crate::gc::{self, GcOptions};
use crate::key::KeyAccess;
use crate::node::{Node, Shortcut};
use crate::ptr::{Meta, NodeId, ShortcutId, Slot};

/// One immutable version of the array: a root, the arena holding every node
/// and shortcut reachable from it, and the tree's leaf count.
///
/// A root is either absent or a meta entry; leaves only ever sit in node
/// slots.
pub struct Tree<L> {
    pub(crate) arena: NodeArena<L>,
    pub(crate) root: Option<Meta>,
    pub(crate) nr_leaves_on_tree: usize,
}

impl<L> Tree<L> {
    pub fn empty() -> Self {
        Self {
            arena: NodeArena::new(),
            root: None,
            nr_leaves_on_tree: 0,
        }
    }

    #[inline]
    pub fn root(&self) -> Option<Meta> {
        self.root
    }

    /// Leaf count recorded for the tree.
    #[inline]
    pub fn len(&self) -> usize {
        self.nr_leaves_on_tree
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nr_leaves_on_tree == 0
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node<L> {
        self.arena.node(id)
    }

    #[inline]
    pub fn shortcut(&self, id: ShortcutId) -> &Shortcut {
        self.arena.shortcut(id)
    }

    #[inline]
    pub fn arena(&self) -> &NodeArena<L> {
        &self.arena
    }

    /// Leaves in pre-order, slot order within each node.
    pub fn leaves(&self) -> Leaves<'_, L> {
        let mut stack = Vec::new();
        if let Some(root) = self.root {
            stack.push((self.land(root), 0));
        }
        Leaves { tree: self, stack }
    }

    /// The node a meta entry leads to, looking through a shortcut.
    #[inline]
    pub(crate) fn land(&self, meta: Meta) -> NodeId {
        match meta {
            Meta::Node(id) => id,
            Meta::Shortcut(id) => self.arena.shortcut(id).next_node,
        }
    }
}

impl<L> Default for Tree<L> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Iterator returned by [`Tree::leaves`].
pub struct Leaves<'a, L> {
    tree: &'a Tree<L>,
    /// (node, next slot to visit)
    stack: Vec<(NodeId, usize)>,
}

impl<'a, L> Iterator for Leaves<'a, L> {
    type Item = &'a L;

    fn next(&mut self) -> Option<&'a L> {
        let tree = self.tree;
        while let Some(top) = self.stack.last_mut() {
            let (id, slot) = *top;
            if slot == crate::FAN_OUT {
                self.stack.pop();
                continue;
            }
            top.1 += 1;
            match &tree.arena.node(id).slots[slot] {
                Slot::Empty => {}
                Slot::Leaf(leaf) => return Some(leaf),
                Slot::Node(child) => self.stack.push((*child, 0)),
                Slot::Shortcut(s) => self.stack.push((tree.arena.shortcut(*s).next_node, 0)),
            }
        }
        None
    }
}

/// An associative array whose current version is published through an
/// `Arc`.
///
/// Readers take a [`snapshot`](AssocArray::snapshot) and keep reading that
/// version for as long as they hold it, whatever GC does meanwhile. An old
/// version is reclaimed once its last snapshot is dropped.
pub struct AssocArray<L> {
    current: Arc<Tree<L>>,
}

impl<L> AssocArray<L> {
    pub fn new() -> Self {
        Self::from_tree(Tree::empty())
    }

    pub fn from_tree(tree: Tree<L>) -> Self {
        Self {
            current: Arc::new(tree),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.current.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    pub fn snapshot(&self) -> Arc<Tree<L>> {
        Arc::clone(&self.current)
    }

    /// Collect garbage: keep the leaves `retain` accepts and compact the
    /// structure around them.
    ///
    /// On error the array is exactly as it was before the call.
    pub fn gc<K, F>(&mut self, ops: &K, retain: F) -> Result<()>
    where
        L: Clone,
        K: KeyAccess<L>,
        F: FnMut(&L) -> bool,
    {
        self.gc_with_options(ops, retain, &GcOptions::default())
    }

    pub fn gc_with_options<K, F>(&mut self, ops: &K, retain: F, options: &GcOptions) -> Result<()>
    where
        L: Clone,
        K: KeyAccess<L>,
        F: FnMut(&L) -> bool,
    {
        if let Some(edit) = gc::collect(&self.current, ops, retain, options)? {
            // The excised version lives on until its last snapshot drops.
            drop(edit.apply(&mut self.current));
        }
        Ok(())
    }
}

impl<L> Default for AssocArray<L> {
    fn default() -> Self {
        Self::new()
    }
}
