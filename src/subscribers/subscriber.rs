//! # Event subscriber trait.
//!
//! Provides [`Subscribe`], a push-style extension point on top of the pull
//! based [`StreamHandle`](crate::StreamHandle).
//!
//! Each subscriber gets:
//! - **Its own stream** (opened when the [`SubscriberSet`](crate::SubscriberSet) is built)
//! - **Dedicated worker task** draining that stream
//! - **Panic isolation** (panics are caught and logged, the worker keeps going)
//!
//! ## Architecture
//! ```text
//! Broadcaster ──notify──► [stream] ──► worker task ──► subscriber.on_event()
//!                                                  └─► panic caught → tracing::error!
//! ```
//!
//! ## Rules
//! - A slow subscriber only backs up its own stream; once that stream is full
//!   it sees a `Lost` event instead of unbounded growth.
//! - Events are processed sequentially (FIFO) per subscriber.
//! - Subscribers never block `notify` or each other.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use procmon::{EventKind, ProcessEvent, Subscribe};
//!
//! struct ExecAudit;
//!
//! #[async_trait]
//! impl Subscribe for ExecAudit {
//!     async fn on_event(&self, ev: &ProcessEvent) {
//!         if ev.kind == EventKind::Execve {
//!             // record the exec, etc.
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "exec-audit" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::ProcessEvent;

/// Process event subscriber.
///
/// ### Implementation requirements
/// - Use async I/O; avoid blocking the executor.
/// - Handle errors internally; do not panic.
/// - Treat `EventKind::Lost` as "my view may be stale".
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event.
    ///
    /// Called from the subscriber's worker task, in stream order.
    async fn on_event(&self, event: &ProcessEvent);

    /// Returns the subscriber name used in logs.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose; override it when possible.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
