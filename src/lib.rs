//! # assoc-array
//!
//! A compressed fan-out-16 associative array (key-indexed trie) with
//! copy-on-write garbage collection.
//!
//! Each node has 16 slots addressed by 4 key bits per level. A slot is
//! empty, holds a caller-owned leaf, or owns a child node or a shortcut
//! (a path-compression hop over several levels). GC walks the published
//! version, keeps the leaves a caller predicate accepts, folds children that
//! fit into their parent, excises redundant nodes and shortcuts, and then
//! publishes the rebuilt version in one step. Readers holding a snapshot of
//! the old version keep reading it unchanged.
//!
//! ## Example
//!
//! ```rust
//! use assoc_array::{AssocArray, IdentityKeys, TreeBuilder};
//!
//! let mut b = TreeBuilder::new();
//! let root = b.root_node()?;
//! for slot in 0..4 {
//!     b.set_leaf(root, slot, slot as u64);
//! }
//! let mut array = AssocArray::from_tree(b.build());
//!
//! let before = array.snapshot();
//! array.gc(&IdentityKeys, |leaf| leaf % 2 == 0)?;
//!
//! assert_eq!(array.len(), 2);
//! assert_eq!(before.len(), 4);
//! # Ok::<(), assoc_array::Error>(())
//! ```

#![deny(unsafe_op_in_unsafe_fn)]

mod tracing_helpers;

mod arena;
mod builder;
mod debug;
mod edit;
mod error;
mod gc;
mod key;
mod node;
mod ptr;
mod shared;
mod tree;
mod verify;

pub use arena::NodeArena;
pub use builder::TreeBuilder;
pub use edit::Edit;
pub use error::{Error, MetaKind, Result};
pub use gc::GcOptions;
pub use key::{slot_at_level, IdentityKeys, KeyAccess};
pub use node::{IndexKey, Node, Shortcut};
pub use ptr::{Meta, NodeId, ShortcutId, Slot};
pub use shared::SharedAssocArray;
pub use tree::{AssocArray, Leaves, Tree};
pub use verify::{check_compacted, check_placement, verify, Violation};

// =============================================================================
// Geometry
// =============================================================================

/// Slots per node.
pub const FAN_OUT: usize = 16;
/// Mask selecting one slot index from the key.
pub const FAN_MASK: u64 = (FAN_OUT - 1) as u64;
/// Key bits consumed per node level.
pub const LEVEL_STEP: u32 = 4;
/// Width in bits of a key chunk.
pub const KEY_CHUNK_SIZE: usize = 64;
pub const KEY_CHUNK_MASK: u32 = (KEY_CHUNK_SIZE - 1) as u32;
pub const KEY_CHUNK_SHIFT: usize = 6;


#[cfg(test)]
mod proptests;
