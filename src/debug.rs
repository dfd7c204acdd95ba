//! Tree dumps for troubleshooting.

use std::fmt;

use crate::ptr::{Meta, NodeId, Slot};
use crate::tree::Tree;

const INDENT: &str = "   ";

impl<L: fmt::Debug> fmt::Display for Tree<L> {
    /// One line per entry, three spaces of indent per level and the hex slot
    /// index in brackets:
    ///
    /// ```text
    /// NODE n0 (3)
    ///    [0] LEAF: 17
    ///    [4] SHORTCUT s0 skip=72 key=[47, 0]
    ///       NODE n2 (2)
    /// ```
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.root {
            None => writeln!(f, "(empty)"),
            Some(root) => self.fmt_meta(f, root, 0, None),
        }
    }
}

impl<L: fmt::Debug> Tree<L> {
    fn fmt_meta(
        &self,
        f: &mut fmt::Formatter<'_>,
        meta: Meta,
        level: usize,
        index: Option<usize>,
    ) -> fmt::Result {
        prefix(f, level, index)?;
        match meta {
            Meta::Node(id) => self.fmt_node(f, id, level),
            Meta::Shortcut(id) => {
                let s = self.shortcut(id);
                writeln!(
                    f,
                    "SHORTCUT {id:?} skip={} key={:x?}",
                    s.skip_to_level,
                    s.index_key()
                )?;
                prefix(f, level + 1, None)?;
                self.fmt_node(f, s.next_node, level + 1)
            }
        }
    }

    fn fmt_node(&self, f: &mut fmt::Formatter<'_>, id: NodeId, level: usize) -> fmt::Result {
        let node = self.node(id);
        writeln!(f, "NODE {id:?} ({})", node.nr_leaves_on_branch)?;
        for (i, slot) in node.slots.iter().enumerate() {
            match slot {
                Slot::Empty => {}
                Slot::Leaf(leaf) => {
                    prefix(f, level + 1, Some(i))?;
                    writeln!(f, "LEAF: {leaf:?}")?;
                }
                Slot::Node(child) => self.fmt_meta(f, Meta::Node(*child), level + 1, Some(i))?,
                Slot::Shortcut(s) => self.fmt_meta(f, Meta::Shortcut(*s), level + 1, Some(i))?,
            }
        }
        Ok(())
    }
}

fn prefix(f: &mut fmt::Formatter<'_>, level: usize, index: Option<usize>) -> fmt::Result {
    for _ in 0..level {
        f.write_str(INDENT)?;
    }
    match index {
        Some(i) => write!(f, "[{i:x}] "),
        None => Ok(()),
    }
}
