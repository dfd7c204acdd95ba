//! An array handle that readers and a collector can share across threads.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::error::Result;
use crate::gc::{self, GcOptions};
use crate::key::KeyAccess;
use crate::tree::{AssocArray, Tree};

/// Thread-safe counterpart of [`AssocArray`].
///
/// The version lock is held only long enough to clone or swap an `Arc`, so
/// readers never wait on the work of a GC pass. Passes themselves are
/// serialized by a separate lock.
pub struct SharedAssocArray<L> {
    current: RwLock<Arc<Tree<L>>>,
    gc_lock: Mutex<()>,
}

impl<L> SharedAssocArray<L> {
    pub fn new() -> Self {
        Self::from_tree(Tree::empty())
    }

    pub fn from_tree(tree: Tree<L>) -> Self {
        Self {
            current: RwLock::new(Arc::new(tree)),
            gc_lock: Mutex::new(()),
        }
    }

    pub fn len(&self) -> usize {
        self.current.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.read().is_empty()
    }

    pub fn snapshot(&self) -> Arc<Tree<L>> {
        Arc::clone(&*self.current.read())
    }

    /// Same contract as [`AssocArray::gc`]. Concurrent callers run one after
    /// the other.
    pub fn gc<K, F>(&self, ops: &K, retain: F) -> Result<()>
    where
        L: Clone,
        K: KeyAccess<L>,
        F: FnMut(&L) -> bool,
    {
        self.gc_with_options(ops, retain, &GcOptions::default())
    }

    pub fn gc_with_options<K, F>(&self, ops: &K, retain: F, options: &GcOptions) -> Result<()>
    where
        L: Clone,
        K: KeyAccess<L>,
        F: FnMut(&L) -> bool,
    {
        let _serialized = self.gc_lock.lock();
        let base = self.snapshot();
        if let Some(edit) = gc::collect(&base, ops, retain, options)? {
            drop(base);
            let excised = {
                let mut published = self.current.write();
                edit.apply(&mut *published)
            };
            // Reclaimed here, or by the last reader still holding it.
            drop(excised);
        }
        Ok(())
    }
}

impl<L> Default for SharedAssocArray<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L> From<AssocArray<L>> for SharedAssocArray<L> {
    fn from(array: AssocArray<L>) -> Self {
        Self {
            current: RwLock::new(array.snapshot()),
            gc_lock: Mutex::new(()),
        }
    }
}
