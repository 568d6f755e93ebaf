//! # Push-style consumers.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] that
//! drives subscribers from their own streams, and built-in implementations.
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   notify(process, transition) ──► Broadcaster ──► one stream per subscriber
//!                                                        │
//!                                                        ├──► worker ──► Subscribe::on_event(&ProcessEvent)
//!                                                        │                   │
//!                                                        │          ┌────────┴────────┬────────┐
//!                                                        │          ▼                 ▼        ▼
//!                                                        │      LiveTracker       LogWriter  Custom
//! ```
//!
//! ## Subscriber types
//! - **Passive subscribers** - observe and react to events (logging, auditing)
//! - **Stateful subscribers** - maintain state derived from events (LiveTracker)

mod embedded;
mod subscriber;
mod subscriber_set;

#[cfg(feature = "logging")]
pub use embedded::LogWriter;
pub use embedded::LiveTracker;
pub use subscriber::Subscribe;
pub use subscriber_set::SubscriberSet;
