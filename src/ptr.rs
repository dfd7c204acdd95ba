//! Tagged slot references.
//!
//! A slot is polymorphic over four cases: empty, a leaf (caller-owned object
//! handle), a node, or a shortcut. Nodes and shortcuts are collectively
//! "meta" entries and live in a [`NodeArena`](crate::arena::NodeArena); they
//! are referenced by typed index rather than by pointer, so the tag is the
//! enum discriminant instead of stolen low bits.

use std::fmt;

/// Index of a [`Node`](crate::node::Node) in its arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

/// Index of a [`Shortcut`](crate::node::Shortcut) in its arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShortcutId(pub(crate) u32);

impl NodeId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl ShortcutId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl fmt::Debug for ShortcutId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// A reference to a meta entry. Also used for back-references, which never
/// imply ownership.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Meta {
    Node(NodeId),
    Shortcut(ShortcutId),
}

impl Meta {
    #[inline]
    pub fn is_node(self) -> bool {
        matches!(self, Meta::Node(_))
    }

    #[inline]
    pub fn is_shortcut(self) -> bool {
        matches!(self, Meta::Shortcut(_))
    }
}

/// One of the sixteen slots of a node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Slot<L> {
    Empty,
    Leaf(L),
    Node(NodeId),
    Shortcut(ShortcutId),
}

impl<L> Slot<L> {
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, Slot::Empty)
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Slot::Leaf(_))
    }

    #[inline]
    pub fn is_meta(&self) -> bool {
        matches!(self, Slot::Node(_) | Slot::Shortcut(_))
    }

    #[inline]
    pub fn is_node(&self) -> bool {
        matches!(self, Slot::Node(_))
    }

    #[inline]
    pub fn is_shortcut(&self) -> bool {
        matches!(self, Slot::Shortcut(_))
    }

    #[inline]
    pub fn as_meta(&self) -> Option<Meta> {
        match *self {
            Slot::Node(id) => Some(Meta::Node(id)),
            Slot::Shortcut(id) => Some(Meta::Shortcut(id)),
            Slot::Empty | Slot::Leaf(_) => None,
        }
    }

    #[inline]
    pub fn as_leaf(&self) -> Option<&L> {
        match self {
            Slot::Leaf(leaf) => Some(leaf),
            _ => None,
        }
    }
}

impl<L> Default for Slot<L> {
    #[inline]
    fn default() -> Self {
        Slot::Empty
    }
}

impl<L> From<Meta> for Slot<L> {
    #[inline]
    fn from(meta: Meta) -> Self {
        match meta {
            Meta::Node(id) => Slot::Node(id),
            Meta::Shortcut(id) => Slot::Shortcut(id),
        }
    }
}
