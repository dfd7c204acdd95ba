//! The commit record of a GC pass.

use std::sync::Arc;

use crate::tree::Tree;

/// A staged root replacement: the version a GC pass started from and the
/// version it built.
///
/// Applying the edit is the only point at which the externally visible root
/// and leaf count change, and they change together.
pub struct Edit<L> {
    base: Arc<Tree<L>>,
    new: Tree<L>,
}

impl<L> Edit<L> {
    pub(crate) fn new(base: Arc<Tree<L>>, new: Tree<L>) -> Self {
        Self { base, new }
    }

    /// The version this edit will publish.
    pub fn new_tree(&self) -> &Tree<L> {
        &self.new
    }

    /// Publish the new version in `published` and return the excised one.
    ///
    /// The excised version stays readable for whoever still holds a snapshot
    /// of it and is reclaimed when the last one drops.
    ///
    /// Panics if `published` no longer holds the version the edit was built
    /// from: GC passes on one array must be serialized.
    pub fn apply(self, published: &mut Arc<Tree<L>>) -> Arc<Tree<L>> {
        assert!(
            Arc::ptr_eq(published, &self.base),
            "array was republished while a GC pass was in flight"
        );
        drop(self.base);
        std::mem::replace(published, Arc::new(self.new))
    }
}
