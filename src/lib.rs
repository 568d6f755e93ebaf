//! # procmon
//!
//! **procmon** is an in-memory broadcaster of process lifecycle events.
//!
//! A process registry reports transitions (clone, exit, execve, setuid) to a
//! [`Broadcaster`], which appends each one to every open stream. Each consumer
//! owns one stream: it starts with a depth-first snapshot of the processes
//! alive at open time, followed by live events in order.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!          process registry (ProcessTree + notify call sites)
//!                 │                           │
//!     children_of / attributes_of     notify(process, Transition)
//!                 │                           │
//!                 ▼                           ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Broadcaster                                                      │
//! │  - registry: RwLock<HashMap<StreamId, Stream>>                    │
//! │  - snapshot walker (Existing events on open)                      │
//! │  - SlotAllocator (per-stream admission, Lost on refusal)          │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!   ┌──────────┐       ┌──────────┐       ┌──────────┐
//!   │ Stream 1 │       │ Stream 2 │       │ Stream N │   FIFO of slots,
//!   │ [■■■□]   │       │ [■□]     │       │ [□]      │   tail always unfilled
//!   └────┬─────┘       └────┬─────┘       └────┬─────┘
//!        ▼                  ▼                  ▼
//!   StreamHandle       SubscriberSet       StreamHandle
//!   .read(buf)         worker → Subscribe  .next_event()
//! ```
//!
//! ### Stream lifecycle
//! ```text
//! open():   Created ──walk──► Live ──close / drop handle──► Closed
//!
//! notify(): for each Live stream
//!   ├─ placeholder admitted  ─► fill tail, push new tail
//!   ├─ refused               ─► tail marked Lost (reader sees a gap marker)
//!   └─ refused, tail Lost    ─► event discarded
//! ```
//!
//! ## Features
//! | Area              | Description                                                      | Key types / traits                         |
//! |-------------------|------------------------------------------------------------------|--------------------------------------------|
//! | **Broadcasting**  | Register streams, fan out transitions, close streams.            | [`Broadcaster`], [`BroadcasterBuilder`]    |
//! | **Reading**       | Blocking, cancellable reads, typed or as 164-byte records.       | [`StreamHandle`], [`StreamCloser`]         |
//! | **Events**        | Lifecycle record and its fixed-width wire format.                | [`ProcessEvent`], [`EventKind`], [`Comm`]  |
//! | **Process tree**  | Collaborator seam plus an in-memory and procfs-backed table.     | [`ProcessTree`], [`ProcessTable`]          |
//! | **Backpressure**  | Per-stream slot admission.                                       | [`SlotAllocator`], [`BoundedAllocator`]    |
//! | **Subscriber API**| Push-style consumers driven by worker tasks.                     | [`Subscribe`], [`SubscriberSet`]           |
//! | **Errors**        | Typed errors.                                                    | [`ProcmonError`]                           |
//! | **Configuration** | Centralize broadcaster settings.                                 | [`Config`]                                 |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use procmon::{Broadcaster, Config, EventKind, ProcessInfo, ProcessTable, Transition};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let table = Arc::new(ProcessTable::from_processes([
//!         ProcessInfo::new(1, 0, "init"),
//!         ProcessInfo::new(100, 1, "sshd"),
//!     ]));
//!     let broadcaster = Broadcaster::new(Config::default(), table.clone());
//!
//!     let mut stream = broadcaster.open()?;
//!
//!     // The registry reports a fork.
//!     let child = ProcessInfo::new(200, 100, "bash").with_uid(1000);
//!     table.insert(child.clone());
//!     broadcaster.notify(&child, Transition::Clone);
//!
//!     let mut seen = Vec::new();
//!     for _ in 0..3 {
//!         let ev = stream.next_event().await.expect("stream open");
//!         seen.push((ev.kind, ev.pid));
//!     }
//!     assert_eq!(
//!         seen,
//!         vec![(EventKind::Existing, 1), (EventKind::Existing, 100), (EventKind::Clone, 200)]
//!     );
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod process;
mod stream;
mod subscribers;

// ---- Public re-exports ----

pub use core::{Broadcaster, BroadcasterBuilder, Config};
pub use error::ProcmonError;
pub use events::{Comm, EventKind, ProcessEvent, Transition, COMM_LEN, EVENT_SIZE};
pub use process::{Pid, ProcessInfo, ProcessTable, ProcessTree, ROOT_PID};
pub use stream::{
    BoundedAllocator, SlotAllocator, StreamCloser, StreamHandle, StreamId, StreamState,
    StreamStats,
};
pub use subscribers::{LiveTracker, Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
