//! # Per-consumer event queue and overflow policy.
//!
//! A [`Stream`] owns an ordered queue of slots. The producer appends at the
//! tail, the single consumer pops at the head, and both sides take the
//! stream's own lock for it (never the registry lock).
//!
//! ## Invariants
//! - While `Live`, the queue is never empty: its tail is the one unfilled slot.
//! - Every slot before the tail is filled (or a sealed Lost record).
//! - Slots are never shared between streams.
//!
//! ## Append
//! ```text
//! append(ev)
//!   ├─ queue empty             → Dropped
//!   ├─ admit() refused
//!   │    ├─ tail not yet Lost  → mark tail Lost          (MarkedLost)
//!   │    └─ tail already Lost  → drop ev                 (Discarded)
//!   └─ admit() ok → push fresh placeholder
//!        ├─ old tail Lost      → seal it, retry once so the fresh tail takes ev
//!        └─ otherwise          → fill old tail with ev   (Filled)
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

use crate::error::ProcmonError;
use crate::events::{ProcessEvent, Slot};

use super::allocator::SlotAllocator;

/// Identifier of one open stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(pub(crate) u64);

impl StreamId {
    /// Raw numeric id.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream-{}", self.0)
    }
}

/// Lifecycle of a stream. Transitions only move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamState {
    /// Being populated by the snapshot walker; not registered.
    Created,
    /// Registered for fan-out and readable.
    Live,
    /// Removed from the registry; queue released.
    Closed,
}

/// Delivery counters of one stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Live events placed into a slot.
    pub delivered: u64,
    /// Times the tail was converted into a Lost marker.
    pub lost_marks: u64,
    /// Events dropped because the tail was already Lost.
    pub discarded: u64,
}

/// Outcome of one append.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Delivery {
    /// Event stored in the previous tail.
    Filled,
    /// Previous tail was Lost; it was sealed and the event went to the next slot.
    Absorbed,
    /// Allocation refused; the tail is now a Lost marker.
    MarkedLost,
    /// Allocation refused and the tail was already Lost.
    Discarded,
    /// Queue was empty (stream not live).
    Dropped,
}

struct Queue {
    slots: VecDeque<Arc<Slot>>,
    state: StreamState,
}

/// One consumer's ordered event queue.
pub(crate) struct Stream {
    id: StreamId,
    queue: Mutex<Queue>,
    closed: CancellationToken,
    delivered: AtomicU64,
    lost_marks: AtomicU64,
    discarded: AtomicU64,
}

impl Stream {
    pub(crate) fn new(id: StreamId) -> Self {
        Self {
            id,
            queue: Mutex::new(Queue {
                slots: VecDeque::new(),
                state: StreamState::Created,
            }),
            closed: CancellationToken::new(),
            delivered: AtomicU64::new(0),
            lost_marks: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        }
    }

    pub(crate) fn id(&self) -> StreamId {
        self.id
    }

    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Asks the allocator for one more slot given the current queue length.
    fn allocate(
        slots: &mut VecDeque<Arc<Slot>>,
        allocator: &dyn SlotAllocator,
    ) -> Result<Arc<Slot>, ProcmonError> {
        allocator.admit(slots.len())?;
        slots
            .try_reserve(1)
            .map_err(|_| ProcmonError::ResourceExhausted {
                stream_len: slots.len(),
                capacity: usize::MAX,
            })?;
        Ok(Arc::new(Slot::placeholder()))
    }

    /// Allocates the initial tail placeholder of a fresh stream.
    ///
    /// Done before the snapshot is walked so that snapshot events never count
    /// against the allocator.
    pub(crate) fn allocate_tail(
        &self,
        allocator: &dyn SlotAllocator,
    ) -> Result<Arc<Slot>, ProcmonError> {
        let mut queue = self.lock();
        debug_assert_eq!(queue.state, StreamState::Created);
        Self::allocate(&mut queue.slots, allocator)
    }

    /// Appends an already-filled snapshot event.
    pub(crate) fn push_ready(&self, event: ProcessEvent) {
        let mut queue = self.lock();
        debug_assert_eq!(queue.state, StreamState::Created);
        queue.slots.push_back(Arc::new(Slot::ready(event)));
    }

    /// Appends the tail placeholder and moves the stream to `Live`.
    pub(crate) fn go_live(&self, tail: Arc<Slot>) {
        let mut queue = self.lock();
        debug_assert_eq!(queue.state, StreamState::Created);
        queue.slots.push_back(tail);
        queue.state = StreamState::Live;
    }

    /// Delivers one live event according to the overflow policy.
    pub(crate) fn append(&self, event: &ProcessEvent, allocator: &dyn SlotAllocator) -> Delivery {
        let mut queue = self.lock();
        if queue.state != StreamState::Live {
            return Delivery::Dropped;
        }
        let outcome = Self::deliver(&mut queue.slots, event, allocator, false);
        drop(queue);

        match outcome {
            Delivery::Filled | Delivery::Absorbed => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Delivery::MarkedLost => {
                self.lost_marks.fetch_add(1, Ordering::Relaxed);
            }
            Delivery::Discarded => {
                self.discarded.fetch_add(1, Ordering::Relaxed);
            }
            Delivery::Dropped => {}
        }
        outcome
    }

    fn deliver(
        slots: &mut VecDeque<Arc<Slot>>,
        event: &ProcessEvent,
        allocator: &dyn SlotAllocator,
        retried: bool,
    ) -> Delivery {
        let Some(tail) = slots.back().map(Arc::clone) else {
            return Delivery::Dropped;
        };

        let fresh = match Self::allocate(slots, allocator) {
            Ok(slot) => slot,
            Err(_) if tail.mark_lost() => return Delivery::MarkedLost,
            Err(_) => return Delivery::Discarded,
        };
        slots.push_back(fresh);

        if tail.is_lost() {
            // A freshly pushed placeholder is never Lost, so one retry always settles.
            assert!(!retried, "lost re-delivery recursed more than once");
            tail.seal_lost();
            return match Self::deliver(slots, event, allocator, true) {
                Delivery::Filled => Delivery::Absorbed,
                other => other,
            };
        }

        tail.fill(event.clone());
        Delivery::Filled
    }

    /// Current head slot.
    ///
    /// Returns `None` once the stream is closed.
    ///
    /// # Panics
    /// If the queue is empty while the stream is not closed; the tail
    /// placeholder must always be present.
    pub(crate) fn head(&self) -> Option<Arc<Slot>> {
        let queue = self.lock();
        match queue.slots.front() {
            Some(slot) => Some(Arc::clone(slot)),
            None if queue.state == StreamState::Closed => None,
            None => panic!(
                "{} has an empty queue while {:?}: tail placeholder missing",
                self.id, queue.state
            ),
        }
    }

    /// Removes `slot` if it is still the head (teardown may have released it).
    pub(crate) fn pop_head(&self, slot: &Arc<Slot>) {
        let mut queue = self.lock();
        if queue.slots.front().is_some_and(|h| Arc::ptr_eq(h, slot)) {
            queue.slots.pop_front();
        }
    }

    /// Marks the stream closed, wakes blocked readers and releases every slot.
    ///
    /// Returns the number of released slots; closing twice releases nothing.
    pub(crate) fn close(&self) -> usize {
        let mut queue = self.lock();
        if queue.state == StreamState::Closed {
            return 0;
        }
        queue.state = StreamState::Closed;
        self.closed.cancel();
        let released = queue.slots.len();
        queue.slots.clear();
        released
    }

    /// Token cancelled when the stream closes.
    pub(crate) fn closed_token(&self) -> &CancellationToken {
        &self.closed
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().slots.len()
    }

    pub(crate) fn state(&self) -> StreamState {
        self.lock().state
    }

    pub(crate) fn stats(&self) -> StreamStats {
        StreamStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            lost_marks: self.lost_marks.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::process::ProcessInfo;
    use crate::stream::allocator::BoundedAllocator;
    use std::sync::atomic::AtomicUsize;

    /// Fails the next `n` admissions.
    #[derive(Default)]
    struct Flaky {
        failures: AtomicUsize,
    }

    impl Flaky {
        fn fail_next(&self, n: usize) {
            self.failures.store(n, Ordering::SeqCst);
        }
    }

    impl SlotAllocator for Flaky {
        fn admit(&self, stream_len: usize) -> Result<(), ProcmonError> {
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                return Err(ProcmonError::ResourceExhausted {
                    stream_len,
                    capacity: 0,
                });
            }
            Ok(())
        }
    }

    fn ev(pid: u32) -> ProcessEvent {
        ProcessEvent::from_process(EventKind::Clone, &ProcessInfo::new(pid, 1, "t"))
    }

    fn live_stream(alloc: &dyn SlotAllocator) -> Stream {
        let stream = Stream::new(StreamId(1));
        let tail = stream.allocate_tail(alloc).unwrap();
        stream.go_live(tail);
        stream
    }

    fn drain_ready(stream: &Stream) -> Vec<ProcessEvent> {
        let mut out = Vec::new();
        while let Some(head) = stream.head() {
            match head.peek() {
                Some(ev) => {
                    stream.pop_head(&head);
                    out.push(ev);
                }
                None => break,
            }
        }
        out
    }

    #[test]
    fn test_append_fills_tail_and_grows() {
        let alloc = BoundedAllocator::new(16);
        let stream = live_stream(&alloc);
        assert_eq!(stream.append(&ev(10), &alloc), Delivery::Filled);
        assert_eq!(stream.append(&ev(11), &alloc), Delivery::Filled);
        assert_eq!(stream.len(), 3);

        let pids: Vec<u32> = drain_ready(&stream).iter().map(|e| e.pid).collect();
        assert_eq!(pids, vec![10, 11]);
        assert_eq!(stream.len(), 1);
    }

    #[test]
    fn test_append_to_created_stream_is_dropped() {
        let alloc = BoundedAllocator::new(16);
        let stream = Stream::new(StreamId(2));
        assert_eq!(stream.append(&ev(1), &alloc), Delivery::Dropped);
        assert_eq!(stream.len(), 0);
    }

    #[test]
    fn test_two_failures_then_recovery_yields_lost_then_event() {
        let alloc = Flaky::default();
        let stream = live_stream(&alloc);

        alloc.fail_next(2);
        assert_eq!(stream.append(&ev(1), &alloc), Delivery::MarkedLost);
        assert_eq!(stream.append(&ev(2), &alloc), Delivery::Discarded);
        assert_eq!(stream.len(), 1);

        assert_eq!(stream.append(&ev(3), &alloc), Delivery::Absorbed);
        let got = drain_ready(&stream);
        assert_eq!(got.len(), 2);
        assert!(got[0].is_lost());
        assert_eq!(got[1].pid, 3);

        let stats = stream.stats();
        assert_eq!(stats.lost_marks, 1);
        assert_eq!(stats.discarded, 1);
        assert_eq!(stats.delivered, 1);
    }

    #[test]
    fn test_lost_tail_is_not_readable_until_sealed() {
        let alloc = Flaky::default();
        let stream = live_stream(&alloc);
        alloc.fail_next(1);
        stream.append(&ev(1), &alloc);
        assert!(drain_ready(&stream).is_empty());
        assert_eq!(stream.len(), 1);
    }

    #[test]
    fn test_failed_retry_leaves_fresh_tail_lost() {
        let alloc = Flaky::default();
        let stream = live_stream(&alloc);
        alloc.fail_next(1);
        stream.append(&ev(1), &alloc);

        // First allocation succeeds, the retry's allocation fails.
        struct OnceThenFail(AtomicUsize);
        impl SlotAllocator for OnceThenFail {
            fn admit(&self, stream_len: usize) -> Result<(), ProcmonError> {
                if self.0.fetch_add(1, Ordering::SeqCst) == 0 {
                    Ok(())
                } else {
                    Err(ProcmonError::ResourceExhausted {
                        stream_len,
                        capacity: 0,
                    })
                }
            }
        }
        let once = OnceThenFail(AtomicUsize::new(0));
        assert_eq!(stream.append(&ev(2), &once), Delivery::MarkedLost);

        let got = drain_ready(&stream);
        assert_eq!(got.len(), 1);
        assert!(got[0].is_lost());
        // The new tail carries the mark; the next success seals it.
        assert_eq!(stream.append(&ev(3), &alloc), Delivery::Absorbed);
        let got = drain_ready(&stream);
        assert!(got[0].is_lost());
        assert_eq!(got[1].pid, 3);
    }

    #[test]
    fn test_bounded_capacity_marks_lost_then_recovers_after_drain() {
        let alloc = BoundedAllocator::new(3);
        let stream = live_stream(&alloc);
        assert_eq!(stream.append(&ev(1), &alloc), Delivery::Filled);
        assert_eq!(stream.append(&ev(2), &alloc), Delivery::Filled);
        assert_eq!(stream.append(&ev(3), &alloc), Delivery::MarkedLost);
        assert_eq!(stream.append(&ev(4), &alloc), Delivery::Discarded);

        let got = drain_ready(&stream);
        assert_eq!(got.iter().map(|e| e.pid).collect::<Vec<_>>(), vec![1, 2]);

        assert_eq!(stream.append(&ev(5), &alloc), Delivery::Absorbed);
        let got = drain_ready(&stream);
        assert!(got[0].is_lost());
        assert_eq!(got[1].pid, 5);
    }

    #[test]
    fn test_close_releases_everything_once() {
        let alloc = BoundedAllocator::new(16);
        let stream = live_stream(&alloc);
        stream.append(&ev(1), &alloc);
        assert_eq!(stream.close(), 2);
        assert_eq!(stream.close(), 0);
        assert_eq!(stream.state(), StreamState::Closed);
        assert!(stream.closed_token().is_cancelled());
        assert!(stream.head().is_none());
        assert_eq!(stream.append(&ev(2), &alloc), Delivery::Dropped);
    }

    #[test]
    #[should_panic(expected = "tail placeholder missing")]
    fn test_empty_live_queue_panics_on_head() {
        let alloc = BoundedAllocator::new(16);
        let stream = live_stream(&alloc);
        let head = stream.head().unwrap();
        stream.pop_head(&head);
        let _ = stream.head();
    }
}
