//! # Process lifecycle events and their wire format.
//!
//! The [`EventKind`] enum classifies what happened to a process:
//! - **Snapshot events**: `Existing`, synthesized for processes alive when a stream opens
//! - **Live events**: `Clone`, `Exit`, `Execve`, `Setuid`, reported by the registry
//! - **Gap marker**: `Lost`, inserted when a stream could not keep up
//!
//! [`ProcessEvent`] is the filled record a consumer reads. On the wire it is a
//! fixed-width record in host byte order:
//!
//! ```text
//! offset  size  field
//!      0     4  type     (EventKind as u32)
//!      4     4  tid
//!      8     4  pid
//!     12     4  ppid
//!     16     4  uid
//!     20     4  euid
//!     24     4  suid
//!     28     4  fsuid
//!     32     4  status   (exit code for Exit, 0 otherwise)
//!     36   128  comm     (NUL padded, truncated)
//!    164        total    (EVENT_SIZE)
//! ```
//!
//! ## Example
//! ```rust
//! use procmon::{EventKind, ProcessEvent, ProcessInfo, EVENT_SIZE};
//!
//! let info = ProcessInfo::new(42, 1, "nginx").with_uid(33);
//! let ev = ProcessEvent::from_process(EventKind::Clone, &info);
//!
//! let mut buf = [0u8; EVENT_SIZE];
//! assert_eq!(ev.encode(&mut buf).unwrap(), EVENT_SIZE);
//! assert_eq!(ProcessEvent::decode(&buf).unwrap(), ev);
//! ```

use std::borrow::Cow;
use std::fmt;

use crate::error::ProcmonError;
use crate::process::ProcessInfo;

/// Capacity of the `comm` field, terminator included.
pub const COMM_LEN: usize = 128;

/// Size in bytes of one serialized [`ProcessEvent`].
pub const EVENT_SIZE: usize = 9 * 4 + COMM_LEN;

/// Classification of process lifecycle events.
///
/// Discriminants are the on-the-wire `type` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum EventKind {
    /// Process was already alive when the stream was opened.
    Existing = 0,
    /// Process (or thread) was created.
    Clone = 1,
    /// Process terminated; `status` carries the exit code.
    Exit = 2,
    /// Program image was replaced.
    Execve = 3,
    /// Effective identity changed.
    Setuid = 4,
    /// One or more events were dropped before this point.
    Lost = 5,
}

impl EventKind {
    /// Wire value of this kind.
    #[inline]
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Parses a wire value.
    pub fn from_u32(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => EventKind::Existing,
            1 => EventKind::Clone,
            2 => EventKind::Exit,
            3 => EventKind::Execve,
            4 => EventKind::Setuid,
            5 => EventKind::Lost,
            _ => return None,
        })
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(self) -> &'static str {
        match self {
            EventKind::Existing => "existing",
            EventKind::Clone => "clone",
            EventKind::Exit => "exit",
            EventKind::Execve => "execve",
            EventKind::Setuid => "setuid",
            EventKind::Lost => "lost",
        }
    }
}

/// Lifecycle transition reported by the process registry.
///
/// The subset of [`EventKind`] that can be observed live. `Existing` and
/// `Lost` are produced only by the broadcaster itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    /// Process created.
    Clone,
    /// Process terminated (exit status must be populated).
    Exit,
    /// Program image replaced.
    Execve,
    /// Effective identity changed.
    Setuid,
}

impl From<Transition> for EventKind {
    fn from(t: Transition) -> Self {
        match t {
            Transition::Clone => EventKind::Clone,
            Transition::Exit => EventKind::Exit,
            Transition::Execve => EventKind::Execve,
            Transition::Setuid => EventKind::Setuid,
        }
    }
}

/// Fixed-capacity, NUL-padded process name.
///
/// At most `COMM_LEN - 1` bytes are kept so the field is always terminated.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Comm([u8; COMM_LEN]);

impl Comm {
    /// Copies `name`, truncating it to fit.
    pub fn new(name: &str) -> Self {
        Self::from_bytes(name.as_bytes())
    }

    /// Copies raw bytes up to the first NUL, truncating to fit.
    pub fn from_bytes(raw: &[u8]) -> Self {
        let mut buf = [0u8; COMM_LEN];
        let raw = raw.split(|b| *b == 0).next().unwrap_or_default();
        let n = raw.len().min(COMM_LEN - 1);
        buf[..n].copy_from_slice(&raw[..n]);
        Self(buf)
    }

    /// Name bytes without padding.
    pub fn as_bytes(&self) -> &[u8] {
        let end = self.0.iter().position(|b| *b == 0).unwrap_or(COMM_LEN);
        &self.0[..end]
    }

    /// Name as text; invalid UTF-8 (e.g. a multibyte char cut by truncation) is replaced.
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.as_bytes())
    }

    /// The full padded field as written on the wire.
    pub fn as_padded(&self) -> &[u8; COMM_LEN] {
        &self.0
    }
}

impl Default for Comm {
    fn default() -> Self {
        Self([0u8; COMM_LEN])
    }
}

impl fmt::Debug for Comm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_string_lossy())
    }
}

impl fmt::Display for Comm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

/// One filled process lifecycle record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEvent {
    /// Event classification.
    pub kind: EventKind,
    /// Task (thread) id.
    pub tid: u32,
    /// Thread-group id.
    pub pid: u32,
    /// Parent thread-group id.
    pub ppid: u32,
    /// Real user id.
    pub uid: u32,
    /// Effective user id.
    pub euid: u32,
    /// Saved user id.
    pub suid: u32,
    /// Filesystem user id.
    pub fsuid: u32,
    /// Exit code for [`EventKind::Exit`]; zero for other kinds.
    pub status: u32,
    /// Process name.
    pub comm: Comm,
}

impl ProcessEvent {
    /// Builds a record from a process snapshot.
    pub fn from_process(kind: EventKind, p: &ProcessInfo) -> Self {
        Self {
            kind,
            tid: p.tid,
            pid: p.pid,
            ppid: p.ppid,
            uid: p.uid,
            euid: p.euid,
            suid: p.suid,
            fsuid: p.fsuid,
            status: if kind == EventKind::Exit {
                p.exit_status
            } else {
                0
            },
            comm: Comm::new(&p.comm),
        }
    }

    /// A gap marker carrying no process data.
    pub fn lost() -> Self {
        Self {
            kind: EventKind::Lost,
            tid: 0,
            pid: 0,
            ppid: 0,
            uid: 0,
            euid: 0,
            suid: 0,
            fsuid: 0,
            status: 0,
            comm: Comm::default(),
        }
    }

    /// True for [`EventKind::Lost`] markers.
    #[inline]
    pub fn is_lost(&self) -> bool {
        self.kind == EventKind::Lost
    }

    /// Serializes into `buf`, returning the number of bytes written.
    ///
    /// Fails with [`ProcmonError::BufferTooSmall`] if `buf` is shorter than
    /// [`EVENT_SIZE`]; nothing is written in that case.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, ProcmonError> {
        if buf.len() < EVENT_SIZE {
            return Err(ProcmonError::BufferTooSmall {
                needed: EVENT_SIZE,
                got: buf.len(),
            });
        }
        let words = [
            self.kind.as_u32(),
            self.tid,
            self.pid,
            self.ppid,
            self.uid,
            self.euid,
            self.suid,
            self.fsuid,
            self.status,
        ];
        for (chunk, word) in buf.chunks_exact_mut(4).zip(words) {
            chunk.copy_from_slice(&word.to_ne_bytes());
        }
        buf[36..EVENT_SIZE].copy_from_slice(self.comm.as_padded());
        Ok(EVENT_SIZE)
    }

    /// Serializes into a fresh fixed-size record.
    pub fn to_bytes(&self) -> [u8; EVENT_SIZE] {
        let mut buf = [0u8; EVENT_SIZE];
        // The buffer is exactly EVENT_SIZE, encode cannot fail.
        let _ = self.encode(&mut buf);
        buf
    }

    /// Parses one record from the start of `buf`.
    pub fn decode(buf: &[u8]) -> Result<Self, ProcmonError> {
        if buf.len() < EVENT_SIZE {
            return Err(ProcmonError::Decode {
                reason: format!("record needs {EVENT_SIZE} bytes, got {}", buf.len()),
            });
        }
        let word = |i: usize| {
            let mut raw = [0u8; 4];
            raw.copy_from_slice(&buf[i * 4..i * 4 + 4]);
            u32::from_ne_bytes(raw)
        };
        let kind = EventKind::from_u32(word(0)).ok_or_else(|| ProcmonError::Decode {
            reason: format!("unknown event type {}", word(0)),
        })?;
        Ok(Self {
            kind,
            tid: word(1),
            pid: word(2),
            ppid: word(3),
            uid: word(4),
            euid: word(5),
            suid: word(6),
            fsuid: word(7),
            status: word(8),
            comm: Comm::from_bytes(&buf[36..EVENT_SIZE]),
        })
    }
}
