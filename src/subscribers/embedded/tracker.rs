//! # LiveTracker – mirror the set of live processes
//!
//! Maintains an in-memory map of **live** processes by consuming a stream:
//! the snapshot seeds it and live transitions keep it current.
//!
//! ## Behavior
//! - Duplicate insert (a process reported both as Existing and by its own
//!   Clone) → tolerated, latest record wins.
//! - Exit without a prior insert → tolerated, logged at debug.
//! - `Lost` → the map may be stale; the gap counter is bumped.
//!
//! ## Internal scheme
//! ```text
//! on_event(ev):
//!   ├─ Existing | Clone   => insert(pid, ev)
//!   ├─ Execve   | Setuid  => insert(pid, ev)   (refresh comm / credentials)
//!   ├─ Exit               => remove(pid)
//!   └─ Lost               => gaps += 1
//!
//! snapshot() -> Vec<Pid>  (sorted copy of the current set)
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::events::{EventKind, ProcessEvent};
use crate::process::Pid;
use crate::subscribers::Subscribe;

/// Tracks the set of currently live processes.
#[derive(Default)]
pub struct LiveTracker {
    inner: RwLock<HashMap<Pid, ProcessEvent>>,
    gaps: AtomicU64,
}

impl LiveTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot (sorted) of currently live pids.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Pid> {
        let g = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut v: Vec<Pid> = g.keys().copied().collect();
        v.sort_unstable();
        v
    }

    /// Latest event seen for `pid`, if it is live.
    #[must_use]
    pub fn get(&self, pid: Pid) -> Option<ProcessEvent> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&pid)
            .cloned()
    }

    /// Returns `true` if `pid` is currently tracked as live.
    #[must_use]
    pub fn is_live(&self, pid: Pid) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&pid)
    }

    /// Number of live processes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `Lost` markers observed.
    #[must_use]
    pub fn gaps(&self) -> u64 {
        self.gaps.load(Ordering::Relaxed)
    }

    fn apply(&self, ev: &ProcessEvent) {
        match ev.kind {
            EventKind::Existing | EventKind::Clone | EventKind::Execve | EventKind::Setuid => {
                self.inner
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(ev.pid, ev.clone());
            }
            EventKind::Exit => {
                let removed = self
                    .inner
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&ev.pid);
                if removed.is_none() {
                    debug!(pid = ev.pid, "exit for untracked process");
                }
            }
            EventKind::Lost => {
                let gaps = self.gaps.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(gaps, "event gap; live set may be stale");
            }
        }
    }
}

#[async_trait]
impl Subscribe for LiveTracker {
    async fn on_event(&self, ev: &ProcessEvent) {
        self.apply(ev);
    }

    fn name(&self) -> &'static str {
        "live-tracker"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessInfo;

    fn ev(kind: EventKind, pid: Pid, comm: &str) -> ProcessEvent {
        ProcessEvent::from_process(kind, &ProcessInfo::new(pid, 1, comm))
    }

    #[tokio::test]
    async fn test_tracks_lifecycle() {
        let t = LiveTracker::new();
        t.on_event(&ev(EventKind::Existing, 1, "init")).await;
        t.on_event(&ev(EventKind::Clone, 20, "sh")).await;
        t.on_event(&ev(EventKind::Clone, 10, "sh")).await;
        assert_eq!(t.snapshot(), vec![1, 10, 20]);

        t.on_event(&ev(EventKind::Execve, 10, "ls")).await;
        assert_eq!(t.get(10).unwrap().comm.to_string(), "ls");

        t.on_event(&ev(EventKind::Exit, 10, "ls")).await;
        assert!(!t.is_live(10));
        assert_eq!(t.len(), 2);
    }

    #[tokio::test]
    async fn test_tolerates_duplicates_and_unknown_exit() {
        let t = LiveTracker::new();
        t.on_event(&ev(EventKind::Existing, 5, "a")).await;
        t.on_event(&ev(EventKind::Clone, 5, "a")).await;
        assert_eq!(t.len(), 1);

        t.on_event(&ev(EventKind::Exit, 99, "ghost")).await;
        assert_eq!(t.snapshot(), vec![5]);
    }

    #[tokio::test]
    async fn test_counts_gaps() {
        let t = LiveTracker::new();
        t.on_event(&ProcessEvent::lost()).await;
        t.on_event(&ProcessEvent::lost()).await;
        assert_eq!(t.gaps(), 2);
        assert!(t.is_empty());
    }
}
