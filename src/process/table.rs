//! # In-memory process registry.
//!
//! [`ProcessTable`] keeps a map of live processes plus insertion-ordered child
//! lists and implements [`ProcessTree`]. It is the default tree of a
//! [`Broadcaster`](crate::Broadcaster) and the usual stand-in for a real
//! registry in tests and demos.
//!
//! ## Rules
//! - Every entry hangs off its `ppid`; entries whose parent is unknown are
//!   attached to [`ROOT_PID`].
//! - `remove` reparents orphans to the root, the way an init process would
//!   adopt them.
//! - Reads take a short read lock and return owned copies.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use super::tree::{Pid, ProcessInfo, ProcessTree, ROOT_PID};

#[derive(Debug)]
struct Entry {
    info: ProcessInfo,
    children: Vec<Pid>,
}

#[derive(Debug)]
struct Inner {
    entries: HashMap<Pid, Entry>,
    /// Children of the root sentinel (which has no `Entry`).
    roots: Vec<Pid>,
}

impl Inner {
    fn children_mut(&mut self, pid: Pid) -> Option<&mut Vec<Pid>> {
        if pid == ROOT_PID {
            Some(&mut self.roots)
        } else {
            self.entries.get_mut(&pid).map(|e| &mut e.children)
        }
    }

    fn detach(&mut self, parent: Pid, pid: Pid) {
        if let Some(children) = self.children_mut(parent) {
            children.retain(|c| *c != pid);
        }
    }
}

/// Thread-safe in-memory process table.
#[derive(Debug)]
pub struct ProcessTable {
    inner: RwLock<Inner>,
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable {
    /// Creates an empty table (only the implicit root exists).
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                entries: HashMap::new(),
                roots: Vec::new(),
            }),
        }
    }

    /// Builds a table from a list of processes, inserted in order.
    ///
    /// Parents should precede their children; a child whose parent is not yet
    /// known is attached to the root.
    pub fn from_processes(processes: impl IntoIterator<Item = ProcessInfo>) -> Self {
        let table = Self::new();
        for p in processes {
            table.insert(p);
        }
        table
    }

    /// Inserts (or replaces) a process and links it under its parent.
    pub fn insert(&self, info: ProcessInfo) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let pid = info.pid;
        if pid == ROOT_PID {
            return;
        }

        let children = match inner.entries.remove(&pid) {
            Some(old) => {
                inner.detach(old.info.ppid, pid);
                inner.detach(ROOT_PID, pid);
                old.children
            }
            None => Vec::new(),
        };

        let parent = if inner.entries.contains_key(&info.ppid) {
            info.ppid
        } else {
            ROOT_PID
        };
        if let Some(siblings) = inner.children_mut(parent) {
            siblings.push(pid);
        }
        inner.entries.insert(pid, Entry { info, children });
    }

    /// Removes a process; its children are adopted by the root.
    pub fn remove(&self, pid: Pid) -> Option<ProcessInfo> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let entry = inner.entries.remove(&pid)?;
        inner.detach(entry.info.ppid, pid);
        // `detach` misses entries that were attached to the root as orphans.
        inner.detach(ROOT_PID, pid);

        for child in &entry.children {
            if let Some(c) = inner.entries.get_mut(child) {
                c.info.ppid = ROOT_PID;
            }
        }
        inner.roots.extend(entry.children);
        Some(entry.info)
    }

    /// Applies `f` to a live process and returns the updated snapshot.
    ///
    /// `pid` and `ppid` are kept as they were; use [`insert`](Self::insert) to
    /// move a process under another parent.
    pub fn update(&self, pid: Pid, f: impl FnOnce(&mut ProcessInfo)) -> Option<ProcessInfo> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let entry = inner.entries.get_mut(&pid)?;
        let ppid = entry.info.ppid;
        f(&mut entry.info);
        entry.info.pid = pid;
        entry.info.ppid = ppid;
        Some(entry.info.clone())
    }

    /// Copies of every live process, sorted by pid.
    pub fn processes(&self) -> Vec<ProcessInfo> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut out: Vec<ProcessInfo> = inner.entries.values().map(|e| e.info.clone()).collect();
        out.sort_unstable_by_key(|p| p.pid);
        out
    }

    /// Number of live processes (root excluded).
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    /// True if no process is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ProcessTree for ProcessTable {
    fn children_of(&self, pid: Pid) -> Vec<Pid> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        if pid == ROOT_PID {
            inner.roots.clone()
        } else {
            inner
                .entries
                .get(&pid)
                .map(|e| e.children.clone())
                .unwrap_or_default()
        }
    }

    fn attributes_of(&self, pid: Pid) -> Option<ProcessInfo> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.entries.get(&pid).map(|e| e.info.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ProcessTable {
        ProcessTable::from_processes([
            ProcessInfo::new(1, 0, "init"),
            ProcessInfo::new(2, 0, "kthreadd"),
            ProcessInfo::new(10, 1, "sshd"),
            ProcessInfo::new(11, 10, "bash"),
        ])
    }

    #[test]
    fn test_children_keep_insertion_order() {
        let table = sample();
        assert_eq!(table.children_of(ROOT_PID), vec![1, 2]);
        assert_eq!(table.children_of(1), vec![10]);
        assert_eq!(table.children_of(10), vec![11]);
        assert!(table.children_of(11).is_empty());
        assert!(table.children_of(999).is_empty());
    }

    #[test]
    fn test_processes_sorted_by_pid() {
        let pids: Vec<Pid> = sample().processes().iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![1, 2, 10, 11]);
    }

    #[test]
    fn test_unknown_parent_attaches_to_root() {
        let table = ProcessTable::from_processes([ProcessInfo::new(7, 5, "orphan")]);
        assert_eq!(table.children_of(ROOT_PID), vec![7]);
        assert_eq!(table.attributes_of(7).map(|p| p.ppid), Some(5));
    }

    #[test]
    fn test_remove_reparents_children_to_root() {
        let table = sample();
        let removed = table.remove(10).unwrap();
        assert_eq!(removed.comm, "sshd");
        assert!(table.children_of(1).is_empty());
        assert_eq!(table.children_of(ROOT_PID), vec![1, 2, 11]);
        assert_eq!(table.attributes_of(11).unwrap().ppid, ROOT_PID);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_remove_root_level_orphan() {
        let table = ProcessTable::from_processes([ProcessInfo::new(7, 5, "orphan")]);
        assert!(table.remove(7).is_some());
        assert!(table.children_of(ROOT_PID).is_empty());
        assert!(table.is_empty());
    }

    #[test]
    fn test_update_keeps_tree_links() {
        let table = sample();
        let updated = table
            .update(11, |p| {
                p.ppid = 2;
                p.comm = "zsh".to_string();
            })
            .unwrap();
        assert_eq!(updated.ppid, 10);
        assert_eq!(updated.comm, "zsh");
        assert_eq!(table.children_of(10), vec![11]);
        assert!(table.children_of(2).is_empty());
        assert_eq!(table.attributes_of(11).map(|p| p.ppid), Some(10));
    }

    #[test]
    fn test_update_returns_new_snapshot() {
        let table = sample();
        let updated = table
            .update(11, |p| {
                p.comm = "vim".into();
                p.euid = 1000;
            })
            .unwrap();
        assert_eq!(updated.comm, "vim");
        assert_eq!(table.attributes_of(11).unwrap().euid, 1000);
        assert!(table.update(404, |_| {}).is_none());
    }

    #[test]
    fn test_reinsert_moves_under_new_parent() {
        let table = sample();
        table.insert(ProcessInfo::new(11, 2, "bash"));
        assert!(table.children_of(10).is_empty());
        assert_eq!(table.children_of(2), vec![11]);
    }
}
