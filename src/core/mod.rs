//! Runtime core: stream registry and fan-out.
//!
//! The only public API from this module is [`Broadcaster`] (with its
//! [`BroadcasterBuilder`] and [`Config`]), which opens streams, delivers
//! lifecycle transitions and closes streams.
//!
//! Internal modules:
//! - [`broadcaster`]: registry of live streams, `open` / `notify` / `close`;
//! - [`walker`]: depth-first snapshot of the process tree for new streams;
//! - [`builder`]: assembles a broadcaster with default collaborators;
//! - [`config`]: tunables.

mod broadcaster;
mod builder;
mod config;
mod walker;

pub use broadcaster::Broadcaster;
pub use builder::BroadcasterBuilder;
pub use config::Config;
