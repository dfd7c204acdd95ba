use std::fmt;

use thiserror::Error;

/// Which kind of meta entry an allocation was for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetaKind {
    Node,
    Shortcut,
}

impl fmt::Display for MetaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaKind::Node => f.write_str("node"),
            MetaKind::Shortcut => f.write_str("shortcut"),
        }
    }
}

/// Errors surfaced by a GC pass.
///
/// Allocation failure is the only recoverable condition. A corrupted tree
/// (dangling ids, shortcuts where none may be, broken back-references) is a
/// fatal invariant violation and panics instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum Error {
    #[error("out of memory while duplicating a {0}")]
    OutOfMemory(MetaKind),
}

pub type Result<T> = std::result::Result<T, Error>;
