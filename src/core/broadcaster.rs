//! # Broadcaster: stream registry and fan-out point.
//!
//! The [`Broadcaster`] owns every live stream and delivers each lifecycle
//! notification to all of them.
//!
//! ## Architecture
//! ```text
//! open()
//!   ├─► allocate tail placeholder      (ResourceExhausted on refusal)
//!   ├─► walk(tree) → push Existing     (stream still Created, unregistered)
//!   └─► [registry write lock] go_live + insert
//!
//! notify(process, transition)
//!   └─► [registry read lock] for each stream: append(event)
//!
//! close(id)
//!   ├─► [registry write lock] remove
//!   └─► stream.close()                 (releases slots, wakes reader)
//! ```
//!
//! ## Rules
//! - The registry lock is held for the whole fan-out, so a stream is never
//!   torn down while it is being appended to.
//! - Once `close` has removed a stream, no later `notify` can reach it.
//! - A transition racing the snapshot walk may be missed or reported twice;
//!   that window is accepted.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, trace, warn};

use crate::error::ProcmonError;
use crate::events::{EventKind, ProcessEvent, Transition};
use crate::process::{ProcessInfo, ProcessTree};
use crate::stream::{Delivery, SlotAllocator, Stream, StreamHandle, StreamId};

use super::builder::BroadcasterBuilder;
use super::config::Config;
use super::walker::walk;

/// Fan-out hub for process lifecycle events.
pub struct Broadcaster {
    cfg: Config,
    tree: Arc<dyn ProcessTree>,
    allocator: Arc<dyn SlotAllocator>,
    streams: RwLock<HashMap<StreamId, Arc<Stream>>>,
    next_id: AtomicU64,
}

impl Broadcaster {
    /// Starts building a broadcaster.
    pub fn builder(cfg: Config) -> BroadcasterBuilder {
        BroadcasterBuilder::new(cfg)
    }

    /// Creates a broadcaster over `tree` with the default allocator.
    pub fn new(cfg: Config, tree: Arc<dyn ProcessTree>) -> Arc<Self> {
        BroadcasterBuilder::new(cfg).with_tree(tree).build()
    }

    pub(crate) fn new_internal(
        cfg: Config,
        tree: Arc<dyn ProcessTree>,
        allocator: Arc<dyn SlotAllocator>,
    ) -> Self {
        Self {
            cfg,
            tree,
            allocator,
            streams: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn read_streams(&self) -> RwLockReadGuard<'_, HashMap<StreamId, Arc<Stream>>> {
        self.streams.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_streams(&self) -> RwLockWriteGuard<'_, HashMap<StreamId, Arc<Stream>>> {
        self.streams.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Opens a new stream.
    ///
    /// With `backfill_existing` set, the stream starts with one `Existing`
    /// event per live process, depth-first from the root, before any live
    /// event.
    ///
    /// # Errors
    /// [`ProcmonError::ResourceExhausted`] if the initial placeholder cannot
    /// be allocated. Nothing is registered in that case.
    pub fn open(self: &Arc<Self>) -> Result<StreamHandle, ProcmonError> {
        let id = StreamId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let stream = Arc::new(Stream::new(id));

        let tail = stream
            .allocate_tail(self.allocator.as_ref())
            .map_err(|e| {
                warn!(stream = %id, error = %e, "open refused");
                e
            })?;

        let existing = if self.cfg.backfill_existing {
            walk(self.tree.as_ref(), |info| {
                stream.push_ready(ProcessEvent::from_process(EventKind::Existing, &info));
            })
        } else {
            0
        };

        {
            let mut streams = self.write_streams();
            stream.go_live(tail);
            streams.insert(id, Arc::clone(&stream));
        }

        debug!(stream = %id, existing, "stream opened");
        Ok(StreamHandle::new(Arc::clone(self), stream))
    }

    /// Delivers one lifecycle transition to every live stream.
    ///
    /// Returns the number of streams that received the event as data. Streams
    /// under resource pressure get a `Lost` marker instead.
    pub fn notify(&self, process: &ProcessInfo, transition: Transition) -> usize {
        let event = ProcessEvent::from_process(transition.into(), process);
        let streams = self.read_streams();

        let mut delivered = 0;
        for stream in streams.values() {
            match stream.append(&event, self.allocator.as_ref()) {
                Delivery::Filled | Delivery::Absorbed => {
                    delivered += 1;
                    trace!(stream = %stream.id(), kind = event.kind.as_label(), pid = event.pid, "delivered");
                }
                Delivery::MarkedLost => {
                    warn!(stream = %stream.id(), kind = event.kind.as_label(), pid = event.pid, "slot refused; tail marked lost");
                }
                Delivery::Discarded => {
                    warn!(stream = %stream.id(), kind = event.kind.as_label(), pid = event.pid, "tail already lost; event discarded");
                }
                Delivery::Dropped => {
                    debug!(stream = %stream.id(), "stream not live; event dropped");
                }
            }
        }
        delivered
    }

    /// Closes a stream and wakes its blocked reader.
    ///
    /// Returns `false` if no stream with that id is registered.
    pub fn close(&self, id: StreamId) -> bool {
        let removed = self.write_streams().remove(&id);
        match removed {
            Some(stream) => {
                let released = stream.close();
                debug!(stream = %id, released, "stream closed");
                true
            }
            None => false,
        }
    }

    /// Number of live streams.
    pub fn stream_count(&self) -> usize {
        self.read_streams().len()
    }

    /// Ids of live streams, sorted.
    pub fn stream_ids(&self) -> Vec<StreamId> {
        let mut ids: Vec<StreamId> = self.read_streams().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Configuration this broadcaster was built with.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Process tree walked on open.
    pub fn tree(&self) -> &Arc<dyn ProcessTree> {
        &self.tree
    }
}

impl fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broadcaster")
            .field("cfg", &self.cfg)
            .field("streams", &self.stream_count())
            .finish()
    }
}
