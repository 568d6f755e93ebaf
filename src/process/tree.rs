//! # Process registry collaborator.
//!
//! The broadcaster never owns the process tree. It reads it through
//! [`ProcessTree`], a read-only view supplied by whatever registry tracks the
//! live processes (an in-memory [`ProcessTable`](crate::ProcessTable), a
//! `/proc` snapshot, or an embedder's own bookkeeping).
//!
//! ## Contract
//! - `attributes_of(pid)` returns a consistent point-in-time copy of the
//!   identity and credentials of a live process, or `None` if it is gone.
//! - `children_of(pid)` lists direct children in the registry's own order.
//! - Both may race with concurrent mutation; callers tolerate missing entries.
//!
//! The root node ([`ROOT_PID`]) is the idle/scheduler sentinel. It is walked
//! through but never reported.

/// Numeric process/task identifier.
pub type Pid = u32;

/// Identifier of the tree root (the idle task). Never reported as a process.
pub const ROOT_PID: Pid = 0;

/// Identity and credential snapshot of one process.
///
/// This is what the registry hands to [`Broadcaster::notify`](crate::Broadcaster::notify)
/// and what the snapshot walker reads for every visited node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessInfo {
    /// Task (thread) id.
    pub tid: Pid,
    /// Thread-group id.
    pub pid: Pid,
    /// Parent thread-group id.
    pub ppid: Pid,
    /// Real user id.
    pub uid: u32,
    /// Effective user id.
    pub euid: u32,
    /// Saved user id.
    pub suid: u32,
    /// Filesystem user id.
    pub fsuid: u32,
    /// Exit code; meaningful once the process has exited.
    pub exit_status: u32,
    /// Short process name.
    pub comm: String,
}

impl ProcessInfo {
    /// Creates a single-threaded process owned by root (all uids zero).
    pub fn new(pid: Pid, ppid: Pid, comm: impl Into<String>) -> Self {
        Self {
            tid: pid,
            pid,
            ppid,
            uid: 0,
            euid: 0,
            suid: 0,
            fsuid: 0,
            exit_status: 0,
            comm: comm.into(),
        }
    }

    /// Sets all four user ids to `uid`.
    #[inline]
    pub fn with_uid(mut self, uid: u32) -> Self {
        self.uid = uid;
        self.euid = uid;
        self.suid = uid;
        self.fsuid = uid;
        self
    }

    /// Sets real, effective, saved and filesystem ids individually.
    #[inline]
    pub fn with_credentials(mut self, uid: u32, euid: u32, suid: u32, fsuid: u32) -> Self {
        self.uid = uid;
        self.euid = euid;
        self.suid = suid;
        self.fsuid = fsuid;
        self
    }

    /// Sets the task id (for non-leader threads).
    #[inline]
    pub fn with_tid(mut self, tid: Pid) -> Self {
        self.tid = tid;
        self
    }

    /// Sets the exit status.
    #[inline]
    pub fn with_exit_status(mut self, status: u32) -> Self {
        self.exit_status = status;
        self
    }
}

/// Read-only view over the live process tree.
pub trait ProcessTree: Send + Sync + 'static {
    /// Direct children of `pid`, in the registry's enumeration order.
    ///
    /// Unknown or exited pids yield an empty list.
    fn children_of(&self, pid: Pid) -> Vec<Pid>;

    /// Point-in-time attributes of `pid`, or `None` if it is not alive.
    fn attributes_of(&self, pid: Pid) -> Option<ProcessInfo>;
}
