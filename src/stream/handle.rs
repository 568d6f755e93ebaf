//! # Consumer side of a stream.
//!
//! [`StreamHandle`] is the opaque handle returned by
//! [`Broadcaster::open`](crate::Broadcaster::open). It is the single reader of
//! its stream (reads take `&mut self`), and dropping it closes the stream.
//!
//! ## Read path
//! ```text
//! next_event_until(cancel)
//!   ├─► head()                       (None once closed)
//!   ├─► wait_until_filled(head)      parks, no polling
//!   │     ├─ filled        → pop head, return event
//!   │     ├─ stream closed → None
//!   │     └─ cancel fired  → None    (head stays queued, unfilled)
//! ```
//!
//! Dropping a pending read future has the same effect as cancelling it.

use std::sync::{Arc, Weak};

use tokio_util::sync::CancellationToken;

use crate::core::Broadcaster;
use crate::error::ProcmonError;
use crate::events::{ProcessEvent, EVENT_SIZE};

use super::stream::{Stream, StreamId, StreamState, StreamStats};

/// Exclusive reader of one stream.
pub struct StreamHandle {
    stream: Arc<Stream>,
    broadcaster: Arc<Broadcaster>,
}

impl StreamHandle {
    pub(crate) fn new(broadcaster: Arc<Broadcaster>, stream: Arc<Stream>) -> Self {
        Self {
            stream,
            broadcaster,
        }
    }

    /// Identifier of the underlying stream.
    pub fn id(&self) -> StreamId {
        self.stream.id()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> StreamState {
        self.stream.state()
    }

    /// Number of queued slots, tail placeholder included.
    pub fn queued(&self) -> usize {
        self.stream.len()
    }

    /// Delivery counters.
    pub fn stats(&self) -> StreamStats {
        self.stream.stats()
    }

    /// Returns a handle that can close this stream from another task.
    pub fn closer(&self) -> StreamCloser {
        StreamCloser {
            broadcaster: Arc::downgrade(&self.broadcaster),
            id: self.stream.id(),
        }
    }

    /// Waits for the next event.
    ///
    /// Returns `None` once the stream is closed.
    pub async fn next_event(&mut self) -> Option<ProcessEvent> {
        self.next_event_until(&CancellationToken::new()).await
    }

    /// Waits for the next event, giving up when `cancel` fires.
    ///
    /// Returns `None` on cancellation or close. A cancelled wait leaves the
    /// head slot in place for the next call.
    pub async fn next_event_until(&mut self, cancel: &CancellationToken) -> Option<ProcessEvent> {
        let head = self.stream.head()?;

        let result = tokio::select! {
            biased;
            r = head.wait_until_filled(self.stream.closed_token()) => r,
            _ = cancel.cancelled() => Err(ProcmonError::Cancelled),
        };

        match result {
            Ok(ev) => {
                self.stream.pop_head(&head);
                Some(ev)
            }
            Err(_) => None,
        }
    }

    /// Returns the head event if it is already filled, without waiting.
    pub fn try_next_event(&mut self) -> Option<ProcessEvent> {
        let head = self.stream.head()?;
        let ev = head.peek()?;
        self.stream.pop_head(&head);
        Some(ev)
    }

    /// Reads one serialized event into `buf`.
    ///
    /// Returns the number of bytes written ([`EVENT_SIZE`]), or `Ok(0)` once
    /// the stream is closed.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ProcmonError> {
        self.read_until(buf, &CancellationToken::new()).await
    }

    /// Like [`read`](Self::read) but returns `Ok(0)` when `cancel` fires.
    ///
    /// Fails with [`ProcmonError::BufferTooSmall`] before waiting if `buf`
    /// cannot hold a record.
    pub async fn read_until(
        &mut self,
        buf: &mut [u8],
        cancel: &CancellationToken,
    ) -> Result<usize, ProcmonError> {
        if buf.len() < EVENT_SIZE {
            return Err(ProcmonError::BufferTooSmall {
                needed: EVENT_SIZE,
                got: buf.len(),
            });
        }
        match self.next_event_until(cancel).await {
            Some(ev) => ev.encode(buf),
            None => Ok(0),
        }
    }

    /// Closes the stream now. Equivalent to dropping the handle.
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.broadcaster.close(self.stream.id());
    }
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle")
            .field("id", &self.stream.id())
            .field("state", &self.stream.state())
            .finish()
    }
}

/// Cloneable handle that closes a stream without owning its reader.
#[derive(Clone, Debug)]
pub struct StreamCloser {
    broadcaster: Weak<Broadcaster>,
    id: StreamId,
}

impl StreamCloser {
    /// Stream this closer targets.
    pub fn id(&self) -> StreamId {
        self.id
    }

    /// Closes the stream. Returns `false` if it was already closed.
    pub fn close(&self) -> bool {
        self.broadcaster
            .upgrade()
            .is_some_and(|b| b.close(self.id))
    }
}
