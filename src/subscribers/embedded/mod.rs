//! # Built-in subscribers
//!
//! These are small, self-contained implementations useful for demos and
//! embedders.
//!
//! - [`LiveTracker`]: mirrors the set of live processes from a stream.
//! - [`LogWriter`]: logs events in a human-readable form (demo/debug).

#[cfg(feature = "logging")]
mod log;
mod tracker;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use tracker::LiveTracker;
