//! Garbage collection and compaction.
//!
//! A pass rebuilds the whole tree into a fresh arena (the shadow tree),
//! leaving the published version untouched:
//!
//! - **Descend** duplicates a shortcut verbatim together with the node it
//!   leads to, and links the copies into the shadow tree.
//! - **ContinueNode** scans the old node's slots, copying the handles of
//!   leaves the caller wants to keep and descending into the first meta
//!   entry it meets.
//! - **Compress** runs once every child of the new node is finished: children
//!   small enough to fit in the free slots are folded into the node, a node
//!   left holding a single shortcut is excised, and a shortcut above a node
//!   that fits within one node's capacity is excised.
//! - **AscendOldTree** follows the old tree's back-references to find where
//!   to resume scanning.
//!
//! No call stack is used; back-references carry the return path. A failed
//! allocation tears the shadow tree down and reports the error.

use std::sync::Arc;

use crate::arena::NodeArena;
use crate::edit::Edit;
use crate::error::Result;
use crate::key::KeyAccess;
use crate::node::Node;
use crate::ptr::{Meta, NodeId, ShortcutId, Slot};
use crate::tracing_helpers::{debug_log, trace_log, warn_log};
use crate::tree::Tree;
use crate::FAN_OUT;

/// Per-pass settings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GcOptions {
    /// Maximum number of nodes and shortcuts the shadow tree may allocate.
    /// `None` leaves allocation bounded only by the system allocator.
    pub allocation_limit: Option<usize>,
}

impl GcOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocation_limit(mut self, limit: usize) -> Self {
        self.allocation_limit = Some(limit);
        self
    }
}

/// Where a freshly duplicated meta entry gets linked in the shadow tree.
#[derive(Clone, Copy, Debug)]
enum Link {
    Root,
    Slot(NodeId, usize),
    Next(ShortcutId),
}

enum State {
    Descend {
        cursor: Meta,
        new_parent: Option<Meta>,
        link: Link,
    },
    ContinueNode {
        node: NodeId,
        new_n: NodeId,
        slot: usize,
    },
    Compress {
        node: NodeId,
        new_n: NodeId,
    },
    /// `new_n` is the shadow node to continue into, if any remains.
    AscendOldTree {
        node: NodeId,
        new_n: Option<NodeId>,
    },
}

struct Pass<'a, L> {
    old: &'a Tree<L>,
    new: NodeArena<L>,
    new_root: Option<Meta>,
    nr_leaves_on_tree: usize,
}

/// Run one GC pass over `base`.
///
/// Returns `None` when there is nothing to collect (empty root), otherwise
/// the edit that publishes the compacted tree. On error every leaf held by
/// the partial shadow tree is handed to [`KeyAccess::free_object`] and `base`
/// is left as it was.
pub(crate) fn collect<L, K, F>(
    base: &Arc<Tree<L>>,
    ops: &K,
    mut retain: F,
    options: &GcOptions,
) -> Result<Option<Edit<L>>>
where
    L: Clone,
    K: KeyAccess<L>,
    F: FnMut(&L) -> bool,
{
    let Some(root) = base.root else {
        return Ok(None);
    };
    debug_log!(leaves = base.len(), "gc start");

    let mut pass = Pass {
        old: base,
        new: NodeArena::with_limit(options.allocation_limit),
        new_root: None,
        nr_leaves_on_tree: 0,
    };
    match pass.run(root, &mut retain) {
        Ok(()) => {
            debug_log!(
                leaves = pass.nr_leaves_on_tree,
                nodes = pass.new.live_nodes(),
                shortcuts = pass.new.live_shortcuts(),
                "gc complete"
            );
            let tree = Tree {
                arena: pass.new,
                root: pass.new_root,
                nr_leaves_on_tree: pass.nr_leaves_on_tree,
            };
            Ok(Some(Edit::new(Arc::clone(base), tree)))
        }
        Err(err) => {
            warn_log!(%err, allocations = pass.new.allocations(), "gc aborted");
            pass.new.destroy(|leaf| ops.free_object(leaf));
            Err(err)
        }
    }
}

impl<'a, L: Clone> Pass<'a, L> {
    fn run<F: FnMut(&L) -> bool>(&mut self, root: Meta, retain: &mut F) -> Result<()> {
        let mut state = State::Descend {
            cursor: root,
            new_parent: None,
            link: Link::Root,
        };
        loop {
            state = match state {
                State::Descend {
                    cursor,
                    new_parent,
                    link,
                } => self.descend(cursor, new_parent, link)?,
                State::ContinueNode { node, new_n, slot } => {
                    self.continue_node(node, new_n, slot, retain)
                }
                State::Compress { node, new_n } => match self.compress(node, new_n) {
                    Some(next) => next,
                    None => return Ok(()),
                },
                State::AscendOldTree { node, new_n } => match self.ascend_old_tree(node, new_n) {
                    Some(next) => next,
                    None => return Ok(()),
                },
            };
        }
    }

    fn link(&mut self, link: Link, meta: Meta) {
        match link {
            Link::Root => self.new_root = Some(meta),
            Link::Slot(parent, slot) => self.new.node_mut(parent).slots[slot] = meta.into(),
            Link::Next(shortcut) => match meta {
                Meta::Node(id) => self.new.shortcut_mut(shortcut).next_node = id,
                Meta::Shortcut(id) => {
                    panic!("shortcut {id:?} linked directly below shortcut {shortcut:?}")
                }
            },
        }
    }

    fn descend(
        &mut self,
        mut cursor: Meta,
        mut new_parent: Option<Meta>,
        mut link: Link,
    ) -> Result<State> {
        let old = self.old;

        // A shortcut is never visited on its own: duplicate it and carry on
        // straight to the node it leads to.
        if let Meta::Shortcut(id) = cursor {
            let shortcut = old.shortcut(id);
            let mut dup = shortcut.clone();
            dup.back_pointer = new_parent;
            let new_s = self.new.alloc_shortcut(dup)?;
            debug_log!(old = ?id, new = ?new_s, "dup shortcut");
            self.link(link, Meta::Shortcut(new_s));
            new_parent = Some(Meta::Shortcut(new_s));
            link = Link::Next(new_s);
            cursor = Meta::Node(shortcut.next_node);
        }

        let Meta::Node(node) = cursor else {
            unreachable!("cursor resolved to a node above")
        };
        let new_n = self
            .new
            .alloc_node(Node::new(new_parent, old.node(node).parent_slot))?;
        debug_log!(old = ?node, new = ?new_n, "dup node");
        self.link(link, Meta::Node(new_n));

        Ok(State::ContinueNode {
            node,
            new_n,
            slot: 0,
        })
    }

    fn continue_node<F: FnMut(&L) -> bool>(
        &mut self,
        node: NodeId,
        new_n: NodeId,
        start: usize,
        retain: &mut F,
    ) -> State {
        let old_tree = self.old;
        let old = old_tree.node(node);
        for slot in start..FAN_OUT {
            let cursor = match &old.slots[slot] {
                Slot::Empty => continue,
                Slot::Leaf(leaf) => {
                    if retain(leaf) {
                        self.new.node_mut(new_n).slots[slot] = Slot::Leaf(leaf.clone());
                    } else {
                        trace_log!(node = ?node, slot, "drop leaf");
                    }
                    continue;
                }
                Slot::Node(id) => Meta::Node(*id),
                Slot::Shortcut(id) => Meta::Shortcut(*id),
            };
            return State::Descend {
                cursor,
                new_parent: Some(Meta::Node(new_n)),
                link: Link::Slot(new_n, slot),
            };
        }
        State::Compress { node, new_n }
    }

    /// Fold what fits into `new_n`, then excise redundant structure around
    /// it. Returns `None` once the shadow root is final.
    fn compress(&mut self, node: NodeId, new_n: NodeId) -> Option<State> {
        let nr_free = self.fold_children(new_n);

        let n = self.new.node(new_n);
        self.nr_leaves_on_tree = n.nr_leaves_on_branch;
        debug_log!(node = ?new_n, leaves = n.nr_leaves_on_branch, "after compress");

        if nr_free == FAN_OUT - 1 {
            let only = match n.slots.iter().find(|s| !s.is_empty()) {
                Some(Slot::Shortcut(id)) => Some(*id),
                _ => None,
            };
            if let Some(new_s) = only {
                return self.excise_node(node, new_n, new_s);
            }
        }

        self.excise_preceding_shortcut(node, new_n)
    }

    /// Recount `new_n` and fold every child whose leaves fit into its free
    /// slots. Returns the number of free slots left.
    fn fold_children(&mut self, new_n: NodeId) -> usize {
        loop {
            let n = self.new.node_mut(new_n);
            let mut nr_free = n.slots.iter().filter(|s| s.is_empty()).count();
            n.nr_leaves_on_branch = n.direct_leaves();
            trace_log!(node = ?new_n, free = nr_free, leaves = n.nr_leaves_on_branch, "compress");

            let mut next_slot = 0;
            let mut retained = false;
            for slot in 0..FAN_OUT {
                let (child_id, via) = match self.new.node(new_n).slots[slot] {
                    Slot::Node(id) => (id, None),
                    Slot::Shortcut(id) => (self.new.shortcut(id).next_node, Some(id)),
                    Slot::Empty | Slot::Leaf(_) => continue,
                };

                let child_leaves = self.new.node(child_id).nr_leaves_on_branch;
                self.new.node_mut(new_n).nr_leaves_on_branch += child_leaves;

                if child_leaves > nr_free + 1 {
                    debug_log!(slot, child_leaves, room = nr_free + 1, next_slot, "retain node");
                    retained = true;
                    continue;
                }

                debug_log!(slot, child_leaves, room = nr_free + 1, next_slot, "fold node");
                // Any shortcut above a node this small was excised on the
                // way back up.
                assert!(
                    via.is_none(),
                    "shortcut {via:?} still above fold candidate {child_id:?}"
                );

                let child = self.new.free_node(child_id);
                let parent = self.new.node_mut(new_n);
                parent.slots[slot] = Slot::Empty;
                nr_free += 1;
                next_slot = next_slot.min(slot);
                for entry in child.slots {
                    let leaf = match entry {
                        Slot::Empty => continue,
                        Slot::Leaf(leaf) => leaf,
                        meta => panic!(
                            "fold candidate {child_id:?} holds meta entry {:?}",
                            meta.as_meta()
                        ),
                    };
                    while next_slot < FAN_OUT && !parent.slots[next_slot].is_empty() {
                        next_slot += 1;
                    }
                    assert!(next_slot < FAN_OUT, "no free slot in {new_n:?} to fold into");
                    parent.slots[next_slot] = Slot::Leaf(leaf);
                    next_slot += 1;
                    nr_free -= 1;
                }
            }

            // A fold may have freed enough room for a child passed over
            // earlier in the scan.
            if retained && self.new.node(new_n).nr_leaves_on_branch < FAN_OUT {
                debug_log!(node = ?new_n, "internal nodes remain despite enough space, retrying");
                continue;
            }
            return nr_free;
        }
    }

    /// `new_n` holds nothing but `new_s`: splice the shortcut into the slot
    /// the node occupied, merging it with a shortcut directly above.
    fn excise_node(&mut self, node: NodeId, new_n: NodeId, new_s: ShortcutId) -> Option<State> {
        debug_log!(node = ?new_n, shortcut = ?new_s, "excise node with 1 shortcut");
        let excised = self.new.free_node(new_n);
        let mut new_parent = excised.back_pointer;
        let mut slot = excised.parent_slot;

        if let Some(Meta::Shortcut(above)) = new_parent {
            debug_log!(shortcut = ?above, "excise preceding shortcut");
            let above = self.new.free_shortcut(above);
            new_parent = above.back_pointer;
            slot = above.parent_slot;
        }

        let shortcut = self.new.shortcut_mut(new_s);
        match new_parent {
            None => {
                shortcut.back_pointer = None;
                shortcut.parent_slot = 0;
                self.new_root = Some(Meta::Shortcut(new_s));
                None
            }
            Some(Meta::Node(parent)) => {
                shortcut.back_pointer = new_parent;
                shortcut.parent_slot = slot;
                self.new.node_mut(parent).slots[slot as usize] = Slot::Shortcut(new_s);
                Some(State::AscendOldTree {
                    node,
                    new_n: Some(parent),
                })
            }
            Some(Meta::Shortcut(id)) => panic!("adjacent shortcuts above {id:?}"),
        }
    }

    /// Drop the shortcut above `new_n` if the node's leaves fit in one node,
    /// then step up to the shadow parent.
    fn excise_preceding_shortcut(&mut self, node: NodeId, new_n: NodeId) -> Option<State> {
        let n = self.new.node(new_n);
        let leaves = n.nr_leaves_on_branch;
        let back_pointer = n.back_pointer;
        let parent = match back_pointer {
            None => return None,
            Some(Meta::Node(parent)) => Some(parent),
            Some(Meta::Shortcut(new_s)) => {
                let s = self.new.shortcut(new_s);
                let slot = s.parent_slot;
                let grandparent = match s.back_pointer {
                    None => None,
                    Some(Meta::Node(id)) => Some(id),
                    Some(Meta::Shortcut(id)) => panic!("adjacent shortcuts {id:?} and {new_s:?}"),
                };

                if leaves <= FAN_OUT {
                    debug_log!(shortcut = ?new_s, node = ?new_n, "excise shortcut");
                    self.new.free_shortcut(new_s);
                    let n = self.new.node_mut(new_n);
                    n.back_pointer = grandparent.map(Meta::Node);
                    n.parent_slot = slot;
                    match grandparent {
                        None => {
                            self.new_root = Some(Meta::Node(new_n));
                            return None;
                        }
                        Some(gp) => {
                            self.new.node_mut(gp).slots[slot as usize] = Slot::Node(new_n);
                        }
                    }
                }
                grandparent
            }
        };

        Some(State::AscendOldTree { node, new_n: parent })
    }

    /// Find where to resume in the old tree: one slot past the entry that led
    /// to `node`. Returns `None` when `node` was the last thing below the old
    /// root.
    fn ascend_old_tree(&self, node: NodeId, new_n: Option<NodeId>) -> Option<State> {
        let old = self.old;
        let n = old.node(node);
        let (slot, cursor) = match n.back_pointer {
            Some(Meta::Shortcut(id)) => {
                let shortcut = old.shortcut(id);
                match shortcut.back_pointer {
                    None => return None,
                    Some(cursor) => (shortcut.parent_slot, cursor),
                }
            }
            Some(cursor) => (n.parent_slot, cursor),
            None => panic!("old node {node:?} has no parent to ascend to"),
        };

        let Meta::Node(parent) = cursor else {
            panic!("old tree has adjacent shortcuts above {node:?}")
        };
        let new_n =
            new_n.unwrap_or_else(|| panic!("shadow tree ended before old node {parent:?}"));
        Some(State::ContinueNode {
            node: parent,
            new_n,
            slot: slot as usize + 1,
        })
    }
}
