//! Per-consumer streams: queue, overflow policy and read handle.
//!
//! ## Contents
//! - [`StreamHandle`] / [`StreamCloser`] consumer-facing handles
//! - [`StreamId`], [`StreamState`], [`StreamStats`] introspection types
//! - [`SlotAllocator`], [`BoundedAllocator`] slot admission seam
//! - `Stream` (crate-private) the queue itself, owned by the broadcaster registry

mod allocator;
mod handle;
#[allow(clippy::module_inception)]
mod stream;

pub use allocator::{BoundedAllocator, SlotAllocator};
pub use handle::{StreamCloser, StreamHandle};
pub(crate) use stream::{Delivery, Stream};
pub use stream::{StreamId, StreamState, StreamStats};
