//! In-memory filesystem tree.
//!
//! A [`Tree`] owns an unnamed root [`Directory`]. Directories own their
//! subdirectories and files in insertion order, so the structure is a strict
//! ownership hierarchy with no back-pointers. Lookups go through the resolver
//! (`resolve_*`), structural changes through the mutator (`make_*`, `remove_*`).

mod limits;
mod mutator;
mod resolver;
mod tree;

pub use limits::Limits;
pub use resolver::components;
pub use tree::{Directory, Entry, EntryKind, File, Tree, TreeError};
