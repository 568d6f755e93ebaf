//! Process registry side: the tree view the broadcaster reads from.
//!
//! ## Contents
//! - [`ProcessTree`] read-only collaborator trait (`children_of`, `attributes_of`)
//! - [`ProcessInfo`] identity + credential snapshot of one process
//! - [`ProcessTable`] in-memory registry, optionally loaded from procfs

mod procfs;
mod table;
mod tree;

pub use table::ProcessTable;
pub use tree::{Pid, ProcessInfo, ProcessTree, ROOT_PID};
