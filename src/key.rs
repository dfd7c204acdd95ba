//! Key-access strategy.
//!
//! The array never interprets leaves itself. Everything it needs to know
//! about an object's key comes through a [`KeyAccess`] implementation
//! supplied by the owner of the leaves.

use crate::{FAN_MASK, KEY_CHUNK_MASK};

/// Capabilities used to interpret keys of the leaves stored in an array.
///
/// Key chunks are `KEY_CHUNK_SIZE` bits wide; `level` is a bit offset and is
/// always rounded down to a chunk boundary by callers.
pub trait KeyAccess<L> {
    /// The key type used to search the array.
    type IndexKey: ?Sized;

    fn get_key_chunk(&self, index_key: &Self::IndexKey, level: u32) -> u64;

    fn get_object_key_chunk(&self, object: &L, level: u32) -> u64;

    fn compare_object(&self, object: &L, index_key: &Self::IndexKey) -> bool;

    /// Bit level of the first difference between the object's key and
    /// `index_key`, or `None` if they are identical.
    fn diff_objects(&self, object: &L, index_key: &Self::IndexKey) -> Option<u32>;

    /// Release the array's hold on `object`.
    fn free_object(&self, object: L) {
        drop(object);
    }
}

/// Slot selected by `object`'s key at the node level `level`.
#[inline]
pub fn slot_at_level<L, K: KeyAccess<L>>(ops: &K, object: &L, level: u32) -> usize {
    let chunk = ops.get_object_key_chunk(object, level & !KEY_CHUNK_MASK);
    ((chunk >> (level & KEY_CHUNK_MASK)) & FAN_MASK) as usize
}

/// `u64` leaves keyed by their own value.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityKeys;

impl KeyAccess<u64> for IdentityKeys {
    type IndexKey = u64;

    #[inline]
    fn get_key_chunk(&self, index_key: &u64, level: u32) -> u64 {
        if level == 0 {
            *index_key
        } else {
            0
        }
    }

    #[inline]
    fn get_object_key_chunk(&self, object: &u64, level: u32) -> u64 {
        self.get_key_chunk(object, level)
    }

    #[inline]
    fn compare_object(&self, object: &u64, index_key: &u64) -> bool {
        object == index_key
    }

    fn diff_objects(&self, object: &u64, index_key: &u64) -> Option<u32> {
        let diff = object ^ index_key;
        (diff != 0).then(|| diff.trailing_zeros())
    }
}
