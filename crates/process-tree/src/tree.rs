//! Process records and tree nesting

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::signal::Signal;
use crate::table::ProcessTable;

/// One row of the host process listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    /// Command (executable name) of the process
    pub command: String,
    /// Pid of the parent process
    pub parent_pid: u32,
    /// Pid of the process
    pub pid: u32,
    /// Platform-specific status code (e.g. `S`, `R+`, `Z`)
    pub status: String,
}

/// A process together with its transitive descendants
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessTreeNode {
    /// Command (executable name) of the process
    pub command: String,
    /// Pid of the parent process
    pub parent_pid: u32,
    /// Pid of the process
    pub pid: u32,
    /// Platform-specific status code
    pub status: String,
    /// Direct children, in listing order
    pub children: Vec<ProcessTreeNode>,
}

impl ProcessTreeNode {
    fn leaf(info: &ProcessInfo) -> Self {
        Self {
            command: info.command.clone(),
            parent_pid: info.parent_pid,
            pid: info.pid,
            status: info.status.clone(),
            children: Vec::new(),
        }
    }

    /// Pids of this node and every descendant, children before parents
    pub fn pids_leaves_first(&self) -> Vec<u32> {
        let mut out = Vec::new();
        self.collect_leaves_first(&mut out);
        out
    }

    fn collect_leaves_first(&self, out: &mut Vec<u32>) {
        for child in &self.children {
            child.collect_leaves_first(out);
        }
        out.push(self.pid);
    }
}

/// Nest `items` into the trees hanging below `pid`
///
/// The returned nodes are the direct children of `pid`; `pid` itself is not
/// part of the result.
pub fn build_tree(items: &[ProcessInfo], pid: u32) -> Vec<ProcessTreeNode> {
    let mut visited = HashSet::new();
    visited.insert(pid);
    nest(items, pid, &mut visited)
}

fn nest(items: &[ProcessInfo], pid: u32, visited: &mut HashSet<u32>) -> Vec<ProcessTreeNode> {
    let mut nodes = Vec::new();
    for item in items.iter().filter(|item| item.parent_pid == pid) {
        // pid 0 lists itself as its own parent on some hosts
        if !visited.insert(item.pid) {
            continue;
        }
        let mut node = ProcessTreeNode::leaf(item);
        node.children = nest(items, item.pid, visited);
        nodes.push(node);
    }
    nodes
}

/// Signal every descendant of `pid`, then `pid` itself
///
/// Descendants are signalled leaves first and failures to reach any of them
/// are swallowed. A failure to signal the root is returned, except when the
/// root has already exited.
pub async fn signal_tree<T>(table: &T, pid: u32, signal: Signal) -> Result<()>
where
    T: ProcessTable + ?Sized,
{
    let descendants = match table.descendants(pid).await {
        Ok(pids) => pids,
        Err(e) => {
            warn!(pid, "could not resolve process tree, signalling root only: {}", e);
            Vec::new()
        }
    };

    for child in descendants {
        match table.signal(child, signal).await {
            Ok(()) => debug!(pid = child, %signal, "signalled descendant"),
            Err(e) => debug!(pid = child, %signal, "ignoring failure to signal descendant: {}", e),
        }
    }

    match table.signal(pid, signal).await {
        Ok(()) => {
            debug!(pid, %signal, "signalled process");
            Ok(())
        }
        Err(Error::NoSuchProcess { .. }) => {
            debug!(pid, %signal, "process already exited");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(pid: u32, parent_pid: u32, command: &str) -> ProcessInfo {
        ProcessInfo {
            command: command.to_string(),
            parent_pid,
            pid,
            status: "S".to_string(),
        }
    }

    #[test]
    fn test_build_tree_nests_descendants() {
        let items = vec![
            info(1, 0, "init"),
            info(10, 1, "bash"),
            info(11, 10, "sleep"),
            info(12, 10, "sh"),
            info(13, 12, "cat"),
            info(20, 1, "other"),
        ];

        let tree = build_tree(&items, 10);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].pid, 11);
        assert!(tree[0].children.is_empty());
        assert_eq!(tree[1].pid, 12);
        assert_eq!(tree[1].children.len(), 1);
        assert_eq!(tree[1].children[0].command, "cat");
    }

    #[test]
    fn test_build_tree_without_children() {
        let items = vec![info(1, 0, "init"), info(10, 1, "bash")];
        assert!(build_tree(&items, 10).is_empty());
        assert!(build_tree(&items, 999).is_empty());
    }

    #[test]
    fn test_build_tree_ignores_self_parented_entries() {
        let items = vec![info(0, 0, "sched"), info(1, 0, "init")];
        let tree = build_tree(&items, 0);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].pid, 1);
    }

    #[test]
    fn test_leaves_first_order() {
        let items = vec![
            info(11, 10, "a"),
            info(12, 11, "b"),
            info(13, 11, "c"),
            info(14, 10, "d"),
        ];
        let pids: Vec<u32> = build_tree(&items, 10)
            .iter()
            .flat_map(ProcessTreeNode::pids_leaves_first)
            .collect();
        assert_eq!(pids, vec![12, 13, 11, 14]);
    }

    struct FakeTable {
        items: Vec<ProcessInfo>,
        exited: Vec<u32>,
        signalled: std::sync::Mutex<Vec<u32>>,
    }

    #[async_trait::async_trait]
    impl ProcessTable for FakeTable {
        async fn list(&self) -> Result<Vec<ProcessInfo>> {
            Ok(self.items.clone())
        }

        async fn signal(&self, pid: u32, _signal: Signal) -> Result<()> {
            if self.exited.contains(&pid) {
                return Err(Error::NoSuchProcess { pid });
            }
            self.signalled.lock().unwrap().push(pid);
            Ok(())
        }
    }

    #[test]
    fn test_signal_tree_order_and_failures() {
        let table = FakeTable {
            items: vec![info(10, 1, "bash"), info(11, 10, "sh"), info(12, 11, "sleep"), info(13, 10, "cat")],
            exited: vec![12],
            signalled: Default::default(),
        };
        futures::executor::block_on(signal_tree(&table, 10, Signal::Term)).unwrap();
        assert_eq!(*table.signalled.lock().unwrap(), vec![11, 13, 10]);
    }

    #[test]
    fn test_signal_tree_of_exited_root() {
        let table = FakeTable {
            items: vec![],
            exited: vec![10],
            signalled: Default::default(),
        };
        futures::executor::block_on(signal_tree(&table, 10, Signal::Kill)).unwrap();
        assert!(table.signalled.lock().unwrap().is_empty());
    }
}
