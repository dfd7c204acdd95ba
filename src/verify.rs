//! Consistency checks over a tree version.
//!
//! None of these are needed by GC itself; they exist so that a tree built
//! from outside, or produced by a pass, can be inspected for the structural
//! properties the rest of the crate relies on.

use thiserror::Error;

use crate::key::{slot_at_level, KeyAccess};
use crate::ptr::{Meta, NodeId, ShortcutId, Slot};
use crate::tree::Tree;
use crate::{FAN_OUT, KEY_CHUNK_MASK, KEY_CHUNK_SHIFT, KEY_CHUNK_SIZE, LEVEL_STEP};

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("{entry:?} points back at {found:?}, expected {expected:?}")]
    BackPointer {
        entry: Meta,
        expected: Option<Meta>,
        found: Option<Meta>,
    },
    #[error("{entry:?} records parent slot {found}, but sits in slot {expected}")]
    ParentSlot { entry: Meta, expected: u8, found: u8 },
    #[error("shortcut {inner:?} sits directly below shortcut {outer:?}")]
    AdjacentShortcuts { outer: ShortcutId, inner: ShortcutId },
    #[error("{node:?} records {recorded} leaves on its branch, found {actual}")]
    BranchCount {
        node: NodeId,
        recorded: usize,
        actual: usize,
    },
    #[error("tree records {recorded} leaves, found {actual}")]
    TreeCount { recorded: usize, actual: usize },
    #[error("{node:?} holds nothing but shortcut {shortcut:?}")]
    SingleShortcutNode { node: NodeId, shortcut: ShortcutId },
    #[error("shortcut {shortcut:?} leads to only {leaves} leaves")]
    NeedlessShortcut { shortcut: ShortcutId, leaves: usize },
    #[error("{entry:?} in slot {slot:x} at level {level} leads to a leaf keyed for slot {expected:x}")]
    Misplaced {
        entry: Meta,
        level: u32,
        slot: usize,
        expected: usize,
    },
    #[error("leaf below shortcut {shortcut:?} does not match its key segment")]
    ShortcutKeyMismatch { shortcut: ShortcutId },
}

/// Check back-references, parent slots, shortcut adjacency and leaf counts.
pub fn verify<L>(tree: &Tree<L>) -> Vec<Violation> {
    let mut out = Vec::new();
    let actual = match tree.root {
        None => 0,
        Some(root) => walk(tree, root, None, None, &mut out),
    };
    if actual != tree.len() {
        out.push(Violation::TreeCount {
            recorded: tree.len(),
            actual,
        });
    }
    out
}

/// Returns the number of leaves reachable through `entry`.
fn walk<L>(
    tree: &Tree<L>,
    entry: Meta,
    parent: Option<Meta>,
    slot: Option<u8>,
    out: &mut Vec<Violation>,
) -> usize {
    let (back_pointer, parent_slot) = match entry {
        Meta::Node(id) => (tree.node(id).back_pointer, tree.node(id).parent_slot),
        Meta::Shortcut(id) => (tree.shortcut(id).back_pointer, tree.shortcut(id).parent_slot),
    };
    if back_pointer != parent {
        out.push(Violation::BackPointer {
            entry,
            expected: parent,
            found: back_pointer,
        });
    }
    // Below a shortcut there is only one place to be.
    if let (Some(Meta::Node(_)), Some(expected)) = (parent, slot) {
        if parent_slot != expected {
            out.push(Violation::ParentSlot {
                entry,
                expected,
                found: parent_slot,
            });
        }
    }

    match entry {
        Meta::Shortcut(id) => {
            if let Some(Meta::Shortcut(outer)) = parent {
                out.push(Violation::AdjacentShortcuts { outer, inner: id });
            }
            let next = tree.shortcut(id).next_node;
            walk(tree, Meta::Node(next), Some(entry), None, out)
        }
        Meta::Node(id) => {
            let node = tree.node(id);
            let mut actual = 0;
            for (i, s) in node.slots.iter().enumerate() {
                match s {
                    Slot::Empty => {}
                    Slot::Leaf(_) => actual += 1,
                    Slot::Node(_) | Slot::Shortcut(_) => {
                        if let Some(child) = s.as_meta() {
                            actual += walk(tree, child, Some(entry), Some(i as u8), out);
                        }
                    }
                }
            }
            if node.nr_leaves_on_branch != actual {
                out.push(Violation::BranchCount {
                    node: id,
                    recorded: node.nr_leaves_on_branch,
                    actual,
                });
            }
            actual
        }
    }
}

/// Check that no further excision is possible: no node is left holding a
/// lone shortcut and no shortcut leads to a node that would fit in one node.
pub fn check_compacted<L>(tree: &Tree<L>) -> Vec<Violation> {
    let mut out = Vec::new();
    let mut stack: Vec<Meta> = tree.root.into_iter().collect();
    while let Some(entry) = stack.pop() {
        match entry {
            Meta::Shortcut(id) => {
                let next = tree.shortcut(id).next_node;
                let leaves = tree.node(next).nr_leaves_on_branch;
                if leaves <= FAN_OUT {
                    out.push(Violation::NeedlessShortcut {
                        shortcut: id,
                        leaves,
                    });
                }
                stack.push(Meta::Node(next));
            }
            Meta::Node(id) => {
                let node = tree.node(id);
                if node.occupied() == 1 {
                    if let Some(Slot::Shortcut(s)) = node.slots.iter().find(|s| !s.is_empty()) {
                        out.push(Violation::SingleShortcutNode {
                            node: id,
                            shortcut: *s,
                        });
                    }
                }
                stack.extend(node.slots.iter().filter_map(Slot::as_meta));
            }
        }
    }
    out
}

/// A condition every leaf below some entry has to meet.
enum Constraint {
    Edge { entry: Meta, level: u32, slot: usize },
    Segment { shortcut: ShortcutId, from: u32 },
}

impl Constraint {
    fn check<L, K: KeyAccess<L>>(&self, tree: &Tree<L>, ops: &K, leaf: &L) -> Option<Violation> {
        match *self {
            Constraint::Edge { entry, level, slot } => {
                let expected = slot_at_level(ops, leaf, level);
                (expected != slot).then_some(Violation::Misplaced {
                    entry,
                    level,
                    slot,
                    expected,
                })
            }
            Constraint::Segment { shortcut, from } => {
                let s = tree.shortcut(shortcut);
                let ok = segment_matches(ops, leaf, s.index_key(), from, s.skip_to_level);
                (!ok).then_some(Violation::ShortcutKeyMismatch { shortcut })
            }
        }
    }
}

/// Check that every meta entry only leads to leaves whose keys select it,
/// and that every leaf below a shortcut carries the shortcut's key segment.
///
/// Leaves may sit in any slot of the node that terminates their path; only
/// meta entries are positional.
pub fn check_placement<L, K: KeyAccess<L>>(tree: &Tree<L>, ops: &K) -> Vec<Violation> {
    let mut out = Vec::new();
    let mut path = Vec::new();
    match tree.root {
        None => {}
        Some(Meta::Node(id)) => placement(tree, ops, id, 0, &mut path, &mut out),
        Some(Meta::Shortcut(s)) => {
            let shortcut = tree.shortcut(s);
            path.push(Constraint::Segment { shortcut: s, from: 0 });
            placement(
                tree,
                ops,
                shortcut.next_node,
                shortcut.skip_to_level,
                &mut path,
                &mut out,
            );
        }
    }
    out
}

fn placement<L, K: KeyAccess<L>>(
    tree: &Tree<L>,
    ops: &K,
    id: NodeId,
    level: u32,
    path: &mut Vec<Constraint>,
    out: &mut Vec<Violation>,
) {
    for (slot, entry) in tree.node(id).slots.iter().enumerate() {
        match entry {
            Slot::Empty => {}
            Slot::Leaf(leaf) => {
                if let Some(v) = path.iter().find_map(|c| c.check(tree, ops, leaf)) {
                    out.push(v);
                }
            }
            Slot::Node(child) => {
                path.push(Constraint::Edge {
                    entry: Meta::Node(*child),
                    level,
                    slot,
                });
                placement(tree, ops, *child, level + LEVEL_STEP, path, out);
                path.pop();
            }
            Slot::Shortcut(s) => {
                let shortcut = tree.shortcut(*s);
                path.push(Constraint::Edge {
                    entry: Meta::Shortcut(*s),
                    level,
                    slot,
                });
                path.push(Constraint::Segment {
                    shortcut: *s,
                    from: level + LEVEL_STEP,
                });
                placement(
                    tree,
                    ops,
                    shortcut.next_node,
                    shortcut.skip_to_level,
                    path,
                    out,
                );
                path.pop();
                path.pop();
            }
        }
    }
}

/// Compare key bits `[from, to)` of `leaf` against `key`.
fn segment_matches<L, K: KeyAccess<L>>(ops: &K, leaf: &L, key: &[u64], from: u32, to: u32) -> bool {
    let mut level = from & !KEY_CHUNK_MASK;
    while level < to {
        let lo = from.max(level) - level;
        let hi = to.min(level + KEY_CHUNK_SIZE as u32) - level;
        let width = hi - lo;
        let mask = if width == KEY_CHUNK_SIZE as u32 {
            u64::MAX
        } else {
            ((1u64 << width) - 1) << lo
        };
        let want = key.get((level >> KEY_CHUNK_SHIFT) as usize).copied().unwrap_or(0);
        if (ops.get_object_key_chunk(leaf, level) ^ want) & mask != 0 {
            return false;
        }
        level += KEY_CHUNK_SIZE as u32;
    }
    true
}
