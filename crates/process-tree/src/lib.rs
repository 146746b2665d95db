//! Process listing and process-tree termination
//!
//! This crate lists the processes running on the host, nests them into trees
//! rooted at a given pid and delivers signals to a whole tree. It is used to
//! terminate a shell together with everything it spawned.

#![warn(missing_docs)]

pub mod error;
pub mod parse;
pub mod signal;
pub mod table;
pub mod tree;

pub use error::{Error, Result};
pub use signal::{Signal, signal_name};
pub use table::{ProcessTable, SystemProcessTable};
pub use tree::{ProcessInfo, ProcessTreeNode, build_tree, signal_tree};
