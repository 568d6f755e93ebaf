//! # Snapshot walker.
//!
//! Enumerates the live process tree depth-first, parent before descendants,
//! children in the registry's own order. The root sentinel is walked through
//! but never visited.
//!
//! ## Rules
//! - Runs against a tree that may be mutating concurrently.
//! - A node whose attributes are gone (exited mid-walk) is skipped, not an error.
//! - A pid is visited at most once per walk, even if reparenting moves it.

use std::collections::HashSet;

use crate::process::{Pid, ProcessInfo, ProcessTree, ROOT_PID};

/// Visits every live process under the root in depth-first pre-order.
///
/// Returns the number of visited processes.
pub(crate) fn walk(tree: &dyn ProcessTree, mut visit: impl FnMut(ProcessInfo)) -> usize {
    let mut seen: HashSet<Pid> = HashSet::new();
    let mut stack: Vec<Pid> = tree.children_of(ROOT_PID).into_iter().rev().collect();
    let mut visited = 0;

    while let Some(pid) = stack.pop() {
        if pid == ROOT_PID || !seen.insert(pid) {
            continue;
        }
        let Some(info) = tree.attributes_of(pid) else {
            continue;
        };
        visit(info);
        visited += 1;
        stack.extend(tree.children_of(pid).into_iter().rev());
    }
    visited
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessTable;
    use std::collections::HashMap;

    fn collect(tree: &dyn ProcessTree) -> Vec<Pid> {
        let mut out = Vec::new();
        walk(tree, |p| out.push(p.pid));
        out
    }

    #[test]
    fn test_depth_first_parent_before_children() {
        let table = ProcessTable::from_processes([
            ProcessInfo::new(1, 0, "init"),
            ProcessInfo::new(2, 0, "kthreadd"),
            ProcessInfo::new(10, 1, "a"),
            ProcessInfo::new(11, 10, "a1"),
            ProcessInfo::new(12, 1, "b"),
            ProcessInfo::new(20, 2, "kworker"),
        ]);
        assert_eq!(collect(&table), vec![1, 10, 11, 12, 2, 20]);
    }

    #[test]
    fn test_empty_tree_visits_nothing() {
        assert!(collect(&ProcessTable::new()).is_empty());
    }

    /// Tree whose listing names a child that has already exited, and a
    /// reparented pid reachable twice.
    struct Racy {
        children: HashMap<Pid, Vec<Pid>>,
        alive: Vec<Pid>,
    }

    impl ProcessTree for Racy {
        fn children_of(&self, pid: Pid) -> Vec<Pid> {
            self.children.get(&pid).cloned().unwrap_or_default()
        }

        fn attributes_of(&self, pid: Pid) -> Option<ProcessInfo> {
            self.alive
                .contains(&pid)
                .then(|| ProcessInfo::new(pid, 0, "p"))
        }
    }

    #[test]
    fn test_tolerates_exited_and_duplicate_children() {
        let tree = Racy {
            children: HashMap::from([(0, vec![1, 5]), (1, vec![3, 4]), (5, vec![4])]),
            alive: vec![1, 4, 5],
        };
        // 3 exited mid-walk; 4 shows up under two parents but is reported once.
        assert_eq!(collect(&tree), vec![1, 4, 5]);
    }

    #[test]
    fn test_root_is_never_reported() {
        let tree = Racy {
            children: HashMap::from([(0, vec![0, 7])]),
            alive: vec![0, 7],
        };
        assert_eq!(collect(&tree), vec![7]);
    }
}
