//! # LogWriter: event printer
//!
//! A minimal subscriber that renders every [`ProcessEvent`] through
//! `tracing::info!`. Use it for tests or demos.
//!
//! ## Example output
//! ```text
//! INFO procmon: existing pid=1 ppid=0 uid=0 comm="systemd"
//! INFO procmon: clone pid=4242 ppid=1 uid=1000 comm="bash"
//! INFO procmon: execve pid=4242 ppid=1 uid=1000 comm="ls"
//! INFO procmon: exit pid=4242 ppid=1 uid=1000 status=0 comm="ls"
//! WARN procmon: lost
//! ```

use async_trait::async_trait;
use tracing::{info, warn};

use crate::events::{EventKind, ProcessEvent};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &ProcessEvent) {
        let comm = e.comm.to_string_lossy();
        match e.kind {
            EventKind::Lost => {
                warn!(target: "procmon", "lost");
            }
            EventKind::Exit => {
                info!(
                    target: "procmon",
                    pid = e.pid, ppid = e.ppid, uid = e.uid, status = e.status, comm = %comm,
                    "exit"
                );
            }
            EventKind::Setuid => {
                info!(
                    target: "procmon",
                    pid = e.pid, uid = e.uid, euid = e.euid, suid = e.suid, fsuid = e.fsuid, comm = %comm,
                    "setuid"
                );
            }
            kind => {
                info!(
                    target: "procmon",
                    pid = e.pid, ppid = e.ppid, uid = e.uid, comm = %comm,
                    "{}", kind.as_label()
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
