//! Node and shortcut layouts.

use smallvec::SmallVec;

use crate::ptr::{Meta, NodeId, Slot};
use crate::{FAN_OUT, KEY_CHUNK_SHIFT, KEY_CHUNK_SIZE};

/// Key segment storage for a shortcut. Two chunks cover skips up to 128 bits
/// without touching the heap.
pub type IndexKey = SmallVec<[u64; 2]>;

/// A fan-out-16 branch of the trie.
///
/// Each occupied slot either refers to a caller-owned leaf or owns a child
/// node/shortcut. `back_pointer` + `parent_slot` identify the slot of the
/// parent that holds this node; they are used for upward navigation only.
#[derive(Clone, Debug)]
pub struct Node<L> {
    pub back_pointer: Option<Meta>,
    pub parent_slot: u8,
    pub slots: [Slot<L>; FAN_OUT],
    /// Leaves reachable through this node. Only guaranteed precise directly
    /// after a GC pass.
    pub nr_leaves_on_branch: usize,
}

impl<L> Node<L> {
    pub fn new(back_pointer: Option<Meta>, parent_slot: u8) -> Self {
        Self {
            back_pointer,
            parent_slot,
            slots: std::array::from_fn(|_| Slot::Empty),
            nr_leaves_on_branch: 0,
        }
    }

    /// Number of occupied slots.
    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_empty()).count()
    }

    /// Leaves held directly in this node's slots.
    pub fn direct_leaves(&self) -> usize {
        self.slots.iter().filter(|s| s.is_leaf()).count()
    }
}

/// A path-compression segment: several trie levels with a single descendant
/// chain, collapsed into one hop that lands on `next_node`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Shortcut {
    pub back_pointer: Option<Meta>,
    pub parent_slot: u8,
    /// Key bit level the shortcut skips to.
    pub skip_to_level: u32,
    pub next_node: NodeId,
    /// `ceil(skip_to_level / 64)` key chunks shared by every descendant.
    index_key: IndexKey,
}

impl Shortcut {
    /// Build a shortcut. `index_key` must hold exactly
    /// [`Shortcut::key_chunks`]`(skip_to_level)` chunks.
    pub fn new(
        back_pointer: Option<Meta>,
        parent_slot: u8,
        skip_to_level: u32,
        next_node: NodeId,
        index_key: &[u64],
    ) -> Self {
        assert_eq!(
            index_key.len(),
            Self::key_chunks(skip_to_level),
            "shortcut key must cover {skip_to_level} bits"
        );
        Self {
            back_pointer,
            parent_slot,
            skip_to_level,
            next_node,
            index_key: SmallVec::from_slice(index_key),
        }
    }

    /// Number of key chunks needed to cover `skip_to_level` bits.
    #[inline]
    pub fn key_chunks(skip_to_level: u32) -> usize {
        let bits = skip_to_level as usize;
        (bits + KEY_CHUNK_SIZE - 1) >> KEY_CHUNK_SHIFT
    }

    #[inline]
    pub fn index_key(&self) -> &[u64] {
        &self.index_key
    }
}
