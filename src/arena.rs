//! Arena storage for nodes and shortcuts.
//!
//! One arena backs exactly one tree version. A GC pass builds its shadow
//! tree into a fresh arena, so tearing a failed pass down is a matter of
//! dropping that arena, and the published version is never written to.

use crate::error::{Error, MetaKind, Result};
use crate::node::{Node, Shortcut};
use crate::ptr::{NodeId, ShortcutId, Slot};

pub struct NodeArena<L> {
    nodes: Vec<Option<Node<L>>>,
    shortcuts: Vec<Option<Shortcut>>,
    free_nodes: Vec<u32>,
    free_shortcuts: Vec<u32>,
    /// Successful allocations so far.
    allocations: usize,
    /// Allocations permitted before `alloc_*` starts failing.
    limit: Option<usize>,
}

impl<L> Default for NodeArena<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L> NodeArena<L> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            shortcuts: Vec::new(),
            free_nodes: Vec::new(),
            free_shortcuts: Vec::new(),
            allocations: 0,
            limit: None,
        }
    }

    /// An arena that refuses every allocation past the first `limit`.
    pub fn with_limit(limit: Option<usize>) -> Self {
        Self {
            limit,
            ..Self::new()
        }
    }

    #[inline]
    pub fn allocations(&self) -> usize {
        self.allocations
    }

    pub fn live_nodes(&self) -> usize {
        self.nodes.len() - self.free_nodes.len()
    }

    pub fn live_shortcuts(&self) -> usize {
        self.shortcuts.len() - self.free_shortcuts.len()
    }

    fn charge(&mut self, kind: MetaKind) -> Result<()> {
        if self.limit.is_some_and(|limit| self.allocations >= limit) {
            return Err(Error::OutOfMemory(kind));
        }
        self.allocations += 1;
        Ok(())
    }

    pub fn alloc_node(&mut self, node: Node<L>) -> Result<NodeId> {
        if let Some(idx) = self.free_nodes.last().copied() {
            self.charge(MetaKind::Node)?;
            self.free_nodes.pop();
            self.nodes[idx as usize] = Some(node);
            return Ok(NodeId(idx));
        }
        self.nodes
            .try_reserve(1)
            .map_err(|_| Error::OutOfMemory(MetaKind::Node))?;
        self.charge(MetaKind::Node)?;
        let idx = self.nodes.len() as u32;
        self.nodes.push(Some(node));
        Ok(NodeId(idx))
    }

    pub fn alloc_shortcut(&mut self, shortcut: Shortcut) -> Result<ShortcutId> {
        if let Some(idx) = self.free_shortcuts.last().copied() {
            self.charge(MetaKind::Shortcut)?;
            self.free_shortcuts.pop();
            self.shortcuts[idx as usize] = Some(shortcut);
            return Ok(ShortcutId(idx));
        }
        self.shortcuts
            .try_reserve(1)
            .map_err(|_| Error::OutOfMemory(MetaKind::Shortcut))?;
        self.charge(MetaKind::Shortcut)?;
        let idx = self.shortcuts.len() as u32;
        self.shortcuts.push(Some(shortcut));
        Ok(ShortcutId(idx))
    }

    /// Release a node, handing its contents back to the caller.
    pub fn free_node(&mut self, id: NodeId) -> Node<L> {
        let node = self.nodes[id.index()]
            .take()
            .unwrap_or_else(|| panic!("double free of node {id:?}"));
        self.free_nodes.push(id.0);
        node
    }

    pub fn free_shortcut(&mut self, id: ShortcutId) -> Shortcut {
        let shortcut = self.shortcuts[id.index()]
            .take()
            .unwrap_or_else(|| panic!("double free of shortcut {id:?}"));
        self.free_shortcuts.push(id.0);
        shortcut
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node<L> {
        match self.nodes.get(id.index()) {
            Some(Some(node)) => node,
            _ => panic!("dangling node reference {id:?}"),
        }
    }

    #[inline]
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node<L> {
        match self.nodes.get_mut(id.index()) {
            Some(Some(node)) => node,
            _ => panic!("dangling node reference {id:?}"),
        }
    }

    #[inline]
    pub fn shortcut(&self, id: ShortcutId) -> &Shortcut {
        match self.shortcuts.get(id.index()) {
            Some(Some(shortcut)) => shortcut,
            _ => panic!("dangling shortcut reference {id:?}"),
        }
    }

    #[inline]
    pub fn shortcut_mut(&mut self, id: ShortcutId) -> &mut Shortcut {
        match self.shortcuts.get_mut(id.index()) {
            Some(Some(shortcut)) => shortcut,
            _ => panic!("dangling shortcut reference {id:?}"),
        }
    }

    /// Tear the arena down, passing every leaf still held by a live node to
    /// `release`.
    pub fn destroy(self, mut release: impl FnMut(L)) {
        for node in self.nodes.into_iter().flatten() {
            for slot in node.slots {
                if let Slot::Leaf(leaf) = slot {
                    release(leaf);
                }
            }
        }
    }
}
