//! Process lifecycle events: data model, wire codec and the two-phase slot.
//!
//! ## Contents
//! - [`EventKind`], [`Transition`], [`ProcessEvent`], [`Comm`] record types
//! - [`EVENT_SIZE`], [`COMM_LEN`] wire format constants
//! - `Slot` (crate-private) placeholder that readers park on until it is filled
//!
//! ## Quick reference
//! - **Producers**: `Broadcaster::notify` (live kinds), the snapshot walker
//!   (`Existing`), the overflow policy (`Lost`).
//! - **Consumers**: `StreamHandle::next_event` / `StreamHandle::read`.

mod event;
mod slot;

pub use event::{Comm, EventKind, ProcessEvent, Transition, COMM_LEN, EVENT_SIZE};
pub(crate) use slot::Slot;
