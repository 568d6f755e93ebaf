//! # Worker-per-subscriber driver.
//!
//! Provides [`SubscriberSet`]: opens one stream per [`Subscribe`] and drains
//! it from a dedicated task.
//!
//! ## Architecture
//! ```text
//! Broadcaster
//!     │
//!     ├──► [stream 1] ──► worker 1 ──► subscriber1.on_event()
//!     │                       └──────► panic → tracing::error!
//!     ├──► [stream 2] ──► worker 2 ──► subscriber2.on_event()
//!     └──► [stream N] ──► worker N ──► subscriberN.on_event()
//! ```
//!
//! ## Rules
//! - **No cross-subscriber ordering**: subscriber A may process event N while B processes N+5
//! - **Isolation**: a slow or panicking subscriber doesn't affect others
//! - **Per-subscriber FIFO**: each subscriber sees its stream in order, snapshot first
//!
//! ## Panic handling
//! Workers use `catch_unwind`; the panic is logged and the worker moves on to
//! the next event.
//!
//! **Warning**: `AssertUnwindSafe` is used, which can leave shared state inconsistent
//! if a subscriber uses `Arc<Mutex<T>>` and panics while holding the lock.

use std::any::Any;
use std::sync::Arc;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::core::Broadcaster;
use crate::error::ProcmonError;
use crate::stream::{StreamCloser, StreamHandle, StreamId};

use super::Subscribe;

struct Worker {
    name: &'static str,
    closer: StreamCloser,
    join: JoinHandle<u64>,
}

/// Set of running subscriber workers.
pub struct SubscriberSet {
    workers: Vec<Worker>,
}

impl SubscriberSet {
    /// Opens one stream per subscriber and spawns its worker.
    ///
    /// Must be called inside a Tokio runtime.
    ///
    /// # Errors
    /// Fails if a stream cannot be opened; streams opened before the failure
    /// are closed again.
    pub fn new(
        broadcaster: &Arc<Broadcaster>,
        subs: Vec<Arc<dyn Subscribe>>,
    ) -> Result<Self, ProcmonError> {
        let mut workers: Vec<Worker> = Vec::with_capacity(subs.len());

        for sub in subs {
            let stream = match broadcaster.open() {
                Ok(stream) => stream,
                Err(e) => {
                    for w in &workers {
                        w.closer.close();
                    }
                    return Err(e);
                }
            };
            let closer = stream.closer();
            let name = sub.name();
            let join = tokio::spawn(drive(stream, sub));
            workers.push(Worker { name, closer, join });
        }
        Ok(Self { workers })
    }

    /// Number of subscribers.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Returns `true` if the set has no subscribers.
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Streams backing the subscribers, in registration order.
    pub fn stream_ids(&self) -> Vec<StreamId> {
        self.workers.iter().map(|w| w.closer.id()).collect()
    }

    /// Closes every stream and waits for the workers to finish.
    ///
    /// Returns `(name, events handled)` per subscriber. Events still queued
    /// when the stream closes are dropped.
    pub async fn shutdown(mut self) -> Vec<(&'static str, u64)> {
        let workers = std::mem::take(&mut self.workers);
        for w in &workers {
            w.closer.close();
        }
        let mut out = Vec::with_capacity(workers.len());
        for w in workers {
            let handled = w.join.await.unwrap_or_default();
            out.push((w.name, handled));
        }
        out
    }
}

impl Drop for SubscriberSet {
    /// Closes the remaining streams; their workers stop on their own.
    fn drop(&mut self) {
        for w in &self.workers {
            w.closer.close();
        }
    }
}

async fn drive(mut stream: StreamHandle, sub: Arc<dyn Subscribe>) -> u64 {
    let mut handled = 0u64;
    while let Some(ev) = stream.next_event().await {
        let fut = sub.on_event(&ev);
        if let Err(panic_err) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
            error!(
                subscriber = sub.name(),
                stream = %stream.id(),
                info = %panic_message(&*panic_err),
                "subscriber panicked"
            );
        }
        handled += 1;
    }
    debug!(subscriber = sub.name(), handled, "subscriber worker stopped");
    handled
}

fn panic_message(any: &(dyn Any + Send)) -> String {
    if let Some(msg) = any.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = any.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventKind, ProcessEvent, Transition};
    use crate::process::{ProcessInfo, ProcessTable};
    use crate::Config;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(EventKind, u32)>>,
    }

    impl Recorder {
        fn seen(&self) -> Vec<(EventKind, u32)> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, ev: &ProcessEvent) {
            self.seen.lock().unwrap().push((ev.kind, ev.pid));
        }

        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    #[derive(Default)]
    struct Bomb {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl Subscribe for Bomb {
        async fn on_event(&self, ev: &ProcessEvent) {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if ev.pid == 13 {
                panic!("boom on {}", ev.pid);
            }
        }

        fn name(&self) -> &'static str {
            "bomb"
        }
    }

    async fn settle<F: Fn() -> bool>(done: F) {
        for _ in 0..200 {
            if done() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_each_subscriber_gets_snapshot_then_live() {
        let table = Arc::new(ProcessTable::from_processes([ProcessInfo::new(1, 0, "init")]));
        let b = Broadcaster::new(Config::default(), table);
        let a = Arc::new(Recorder::default());
        let c = Arc::new(Recorder::default());
        let subs: Vec<Arc<dyn Subscribe>> = vec![a.clone(), c.clone()];
        let set = SubscriberSet::new(&b, subs).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(b.stream_count(), 2);

        b.notify(&ProcessInfo::new(2, 1, "sh"), Transition::Clone);
        settle(|| a.seen().len() == 2 && c.seen().len() == 2).await;

        let expected = vec![(EventKind::Existing, 1), (EventKind::Clone, 2)];
        assert_eq!(a.seen(), expected);
        assert_eq!(c.seen(), expected);

        let report = set.shutdown().await;
        assert_eq!(report, vec![("recorder", 2), ("recorder", 2)]);
        assert_eq!(b.stream_count(), 0);
    }

    #[tokio::test]
    async fn test_panicking_subscriber_is_isolated() {
        let b = Broadcaster::new(Config::default(), Arc::new(ProcessTable::new()));
        let rec = Arc::new(Recorder::default());
        let bomb = Arc::new(Bomb::default());
        let subs: Vec<Arc<dyn Subscribe>> = vec![bomb.clone(), rec.clone()];
        let set = SubscriberSet::new(&b, subs).unwrap();

        for pid in [12, 13, 14] {
            b.notify(&ProcessInfo::new(pid, 1, "x"), Transition::Execve);
        }
        settle(|| {
            rec.seen().len() == 3 && bomb.calls.load(std::sync::atomic::Ordering::SeqCst) == 3
        })
        .await;

        // The bomb kept going after its panic.
        let report = set.shutdown().await;
        assert_eq!(report, vec![("bomb", 3), ("recorder", 3)]);
    }

    #[tokio::test]
    async fn test_drop_closes_streams_and_stops_workers() {
        let b = Broadcaster::new(Config::default(), Arc::new(ProcessTable::new()));
        let rec = Arc::new(Recorder::default());
        let subs: Vec<Arc<dyn Subscribe>> = vec![rec.clone()];
        let set = SubscriberSet::new(&b, subs).unwrap();
        assert_eq!(b.stream_count(), 1);

        drop(set);
        assert_eq!(b.stream_count(), 0);

        // The worker exits and releases its handle on the broadcaster.
        settle(|| Arc::strong_count(&b) == 1).await;
        assert_eq!(Arc::strong_count(&b), 1);
        assert_eq!(b.notify(&ProcessInfo::new(3, 1, "x"), Transition::Clone), 0);
        assert!(rec.seen().is_empty());
    }

    #[tokio::test]
    async fn test_open_failure_closes_earlier_streams() {
        /// Admits the first placeholder only.
        struct Budget(std::sync::atomic::AtomicUsize);
        impl crate::SlotAllocator for Budget {
            fn admit(&self, stream_len: usize) -> Result<(), ProcmonError> {
                if self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst) >= 1 {
                    return Err(ProcmonError::ResourceExhausted {
                        stream_len,
                        capacity: 0,
                    });
                }
                Ok(())
            }
        }

        let b = Broadcaster::builder(Config::default())
            .with_allocator(Arc::new(Budget(std::sync::atomic::AtomicUsize::new(0))))
            .build();
        let subs: Vec<Arc<dyn Subscribe>> =
            vec![Arc::new(Recorder::default()), Arc::new(Recorder::default())];

        let err = SubscriberSet::new(&b, subs).err().unwrap();
        assert_eq!(err.as_label(), "resource_exhausted");
        assert_eq!(b.stream_count(), 0);
    }
}
