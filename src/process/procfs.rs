//! Loads a [`ProcessTable`] from a Linux-style procfs mount.
//!
//! Only `/proc/<pid>/status` is read. The fields used are `Name`, `Tgid`,
//! `Pid`, `PPid` and `Uid` (real, effective, saved, filesystem). Processes
//! that vanish or cannot be read while the directory is being scanned are
//! skipped; only failing to list the directory itself is an error.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use tracing::debug;

use crate::error::ProcmonError;

use super::table::ProcessTable;
use super::tree::{Pid, ProcessInfo, ROOT_PID};

impl ProcessTable {
    /// Snapshots every process found under `proc_root` (usually `/proc`).
    ///
    /// Parents are inserted before their children so the table mirrors the
    /// kernel's tree; pid 1 and kernel threads hang off the root.
    pub fn from_procfs(proc_root: impl AsRef<Path>) -> Result<Self, ProcmonError> {
        let proc_root = proc_root.as_ref();
        let dir = fs::read_dir(proc_root).map_err(|source| ProcmonError::Procfs {
            path: proc_root.to_path_buf(),
            source,
        })?;

        let mut found = Vec::new();
        for entry in dir {
            let entry = entry.map_err(|source| ProcmonError::Procfs {
                path: proc_root.to_path_buf(),
                source,
            })?;
            let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<Pid>().ok()) else {
                continue;
            };
            let status = entry.path().join("status");
            match fs::read_to_string(&status) {
                Ok(text) => match parse_status(&text) {
                    Some(info) => found.push(info),
                    None => debug!(pid, "skipping unparsable status file"),
                },
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!(pid, "process exited during procfs scan");
                }
                // An exit between open and read surfaces as ESRCH; one pid never fails the scan.
                Err(e) => {
                    debug!(pid, path = %status.display(), error = %e, "skipping unreadable status file");
                }
            }
        }

        Ok(ProcessTable::from_processes(parents_first(found)))
    }
}

/// Orders processes so that each parent precedes its children, walking from
/// the root. Entries unreachable from the root keep pid order at the end.
fn parents_first(mut found: Vec<ProcessInfo>) -> Vec<ProcessInfo> {
    found.sort_by_key(|p| p.pid);

    let mut by_parent: HashMap<Pid, Vec<ProcessInfo>> = HashMap::new();
    let known: std::collections::HashSet<Pid> = found.iter().map(|p| p.pid).collect();
    let mut ordered = Vec::with_capacity(found.len());
    let mut detached = Vec::new();

    for p in found {
        if p.ppid == ROOT_PID || known.contains(&p.ppid) {
            by_parent.entry(p.ppid).or_default().push(p);
        } else {
            detached.push(p);
        }
    }

    let mut stack = vec![ROOT_PID];
    while let Some(parent) = stack.pop() {
        if let Some(children) = by_parent.remove(&parent) {
            for child in children.iter().rev() {
                stack.push(child.pid);
            }
            ordered.extend(children);
        }
    }
    // Anything left sits in a parent cycle; keep it rather than lose it.
    let mut rest: Vec<ProcessInfo> = by_parent.into_values().flatten().collect();
    rest.sort_by_key(|p| p.pid);
    ordered.extend(rest);
    ordered.extend(detached);
    ordered
}

/// Parses the subset of `/proc/<pid>/status` the broadcaster needs.
pub(crate) fn parse_status(text: &str) -> Option<ProcessInfo> {
    let mut name = None;
    let mut tgid = None;
    let mut pid = None;
    let mut ppid = None;
    let mut uids = None;

    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key {
            "Name" => name = Some(value.to_string()),
            "Tgid" => tgid = value.parse::<Pid>().ok(),
            "Pid" => pid = value.parse::<Pid>().ok(),
            "PPid" => ppid = value.parse::<Pid>().ok(),
            "Uid" => {
                let ids: Vec<u32> = value
                    .split_whitespace()
                    .filter_map(|v| v.parse().ok())
                    .collect();
                if let [uid, euid, suid, fsuid] = ids[..] {
                    uids = Some((uid, euid, suid, fsuid));
                }
            }
            _ => {}
        }
    }

    let tid = pid?;
    let (uid, euid, suid, fsuid) = uids?;
    Some(
        ProcessInfo::new(tgid.unwrap_or(tid), ppid?, name?)
            .with_tid(tid)
            .with_credentials(uid, euid, suid, fsuid),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::tree::ProcessTree;

    fn status(name: &str, pid: Pid, ppid: Pid, uid: u32) -> String {
        format!(
            "Name:\t{name}\nUmask:\t0022\nState:\tS (sleeping)\nTgid:\t{pid}\nNgid:\t0\n\
             Pid:\t{pid}\nPPid:\t{ppid}\nTracerPid:\t0\nUid:\t{uid}\t{uid}\t{uid}\t{uid}\n\
             Gid:\t0\t0\t0\t0\n"
        )
    }

    fn write_proc(root: &Path, name: &str, pid: Pid, ppid: Pid, uid: u32) {
        let dir = root.join(pid.to_string());
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("status"), status(name, pid, ppid, uid)).unwrap();
    }

    #[test]
    fn test_parse_status_reads_credentials() {
        let text = "Name:\tsudo\nTgid:\t300\nPid:\t301\nPPid:\t200\nUid:\t1000\t0\t0\t0\n";
        let info = parse_status(text).unwrap();
        assert_eq!(info.comm, "sudo");
        assert_eq!((info.pid, info.tid, info.ppid), (300, 301, 200));
        assert_eq!((info.uid, info.euid, info.suid, info.fsuid), (1000, 0, 0, 0));
    }

    #[test]
    fn test_parse_status_rejects_partial_files() {
        assert!(parse_status("Name:\tx\nPid:\t3\n").is_none());
        assert!(parse_status("").is_none());
    }

    #[test]
    fn test_from_procfs_builds_tree_parents_first() {
        let dir = tempfile::tempdir().unwrap();
        // Child with a lower pid than its parent (pid wrap-around).
        write_proc(dir.path(), "worker", 5, 900, 33);
        write_proc(dir.path(), "init", 1, 0, 0);
        write_proc(dir.path(), "kthreadd", 2, 0, 0);
        write_proc(dir.path(), "server", 900, 1, 33);
        fs::create_dir_all(dir.path().join("self")).unwrap();
        fs::write(dir.path().join("uptime"), "1.0 1.0").unwrap();

        let table = ProcessTable::from_procfs(dir.path()).unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(table.children_of(ROOT_PID), vec![1, 2]);
        assert_eq!(table.children_of(1), vec![900]);
        assert_eq!(table.children_of(900), vec![5]);
        assert_eq!(table.attributes_of(5).unwrap().uid, 33);
    }

    #[test]
    fn test_from_procfs_missing_root_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ProcessTable::from_procfs(dir.path().join("nope")).unwrap_err();
        assert_eq!(err.as_label(), "procfs_failed");
    }

    #[test]
    fn test_from_procfs_skips_vanished_process() {
        let dir = tempfile::tempdir().unwrap();
        write_proc(dir.path(), "init", 1, 0, 0);
        // Directory without a status file: the process exited mid-scan.
        fs::create_dir_all(dir.path().join("77")).unwrap();

        let table = ProcessTable::from_procfs(dir.path()).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_from_procfs_skips_unreadable_status() {
        let dir = tempfile::tempdir().unwrap();
        write_proc(dir.path(), "init", 1, 0, 0);
        write_proc(dir.path(), "sshd", 40, 1, 0);
        // A status path that exists but cannot be read as a file.
        fs::create_dir_all(dir.path().join("41").join("status")).unwrap();

        let table = ProcessTable::from_procfs(dir.path()).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.attributes_of(41).is_none());
        assert_eq!(table.children_of(1), vec![40]);
    }
}
