//! # Broadcaster configuration.
//!
//! Provides [`Config`], the centralized settings of a
//! [`Broadcaster`](crate::Broadcaster).
//!
//! ## Sentinel values
//! - `stream_capacity` below 3 is clamped to 3 (sealed Lost marker, payload, tail placeholder)

/// Global configuration for the broadcaster.
///
/// ## Field semantics
/// - `stream_capacity`: max queued slots per stream before new placeholders are refused
/// - `backfill_existing`: synthesize `Existing` events for live processes on open
///
/// ## Notes
/// All fields are public. Prefer the helper accessors over reading raw fields
/// where a clamped value is needed.
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum number of slots one stream may queue.
    ///
    /// When a stream is full the next notification marks its tail `Lost`
    /// instead of growing the queue. Snapshot events are not counted when the
    /// stream is opened, but they occupy the queue until read.
    pub stream_capacity: usize,

    /// Whether `open` walks the process tree and queues one `Existing`
    /// event per live process before going live.
    pub backfill_existing: bool,
}

impl Config {
    /// Returns the stream capacity clamped to a minimum of 3.
    #[inline]
    pub fn stream_capacity_clamped(&self) -> usize {
        self.stream_capacity.max(3)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `stream_capacity = 4096`
    /// - `backfill_existing = true`
    fn default() -> Self {
        Self {
            stream_capacity: 4096,
            backfill_existing: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.stream_capacity, 4096);
        assert!(cfg.backfill_existing);
    }

    #[test]
    fn test_capacity_clamped() {
        let cfg = Config {
            stream_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.stream_capacity_clamped(), 3);
    }
}
