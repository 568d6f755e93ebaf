//! Error type used by the procmon broadcaster and its streams.
//!
//! [`ProcmonError`] covers every fallible operation in the crate:
//!
//! - slot allocation refused while opening a stream or appending to one,
//! - caller contract violations on the read path,
//! - cooperative cancellation of a blocked read,
//! - malformed wire records and `/proc` snapshot failures.
//!
//! Like the rest of the crate it provides `as_label` / `as_message` helpers
//! for logs and metrics.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// # Errors produced by the broadcaster, streams and process registry adapters.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ProcmonError {
    /// A slot could not be allocated for a stream.
    ///
    /// Surfaced to the caller only from [`Broadcaster::open`](crate::Broadcaster::open).
    /// During fan-out the same condition is converted into a `Lost` marker.
    #[error("resource exhausted: stream holds {stream_len} slots (capacity {capacity})")]
    ResourceExhausted {
        /// Number of slots queued in the stream when allocation was refused.
        stream_len: usize,
        /// Capacity the allocator enforces (`usize::MAX` for real allocation failures).
        capacity: usize,
    },

    /// The read buffer cannot hold one serialized event.
    #[error("buffer too small: need {needed} bytes, got {got}")]
    BufferTooSmall {
        /// Bytes required for one record.
        needed: usize,
        /// Bytes supplied by the caller.
        got: usize,
    },

    /// A blocked wait was aborted (stream closed or reader cancelled).
    #[error("wait cancelled")]
    Cancelled,

    /// A wire record could not be decoded.
    #[error("malformed event record: {reason}")]
    Decode {
        /// What was wrong with the record.
        reason: String,
    },

    /// Loading a process snapshot from procfs failed.
    #[error("procfs read failed at {path:?}: {source}")]
    Procfs {
        /// File or directory that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl ProcmonError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use procmon::ProcmonError;
    ///
    /// let err = ProcmonError::BufferTooSmall { needed: 164, got: 8 };
    /// assert_eq!(err.as_label(), "buffer_too_small");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ProcmonError::ResourceExhausted { .. } => "resource_exhausted",
            ProcmonError::BufferTooSmall { .. } => "buffer_too_small",
            ProcmonError::Cancelled => "cancelled",
            ProcmonError::Decode { .. } => "decode_failed",
            ProcmonError::Procfs { .. } => "procfs_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ProcmonError::ResourceExhausted {
                stream_len,
                capacity,
            } => format!("no slot available: len={stream_len} capacity={capacity}"),
            ProcmonError::BufferTooSmall { needed, got } => {
                format!("invalid argument: buffer of {got} bytes, record needs {needed}")
            }
            ProcmonError::Cancelled => "wait cancelled".to_string(),
            ProcmonError::Decode { reason } => format!("decode: {reason}"),
            ProcmonError::Procfs { path, source } => {
                format!("procfs: {}: {source}", path.display())
            }
        }
    }

    /// Indicates whether the error is a caller contract violation
    /// (the `InvalidArgument` class) rather than a runtime condition.
    ///
    /// # Example
    /// ```
    /// use procmon::ProcmonError;
    ///
    /// assert!(ProcmonError::BufferTooSmall { needed: 164, got: 0 }.is_invalid_argument());
    /// assert!(!ProcmonError::Cancelled.is_invalid_argument());
    /// ```
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, ProcmonError::BufferTooSmall { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_stable() {
        let exhausted = ProcmonError::ResourceExhausted {
            stream_len: 4,
            capacity: 4,
        };
        assert_eq!(exhausted.as_label(), "resource_exhausted");
        assert_eq!(ProcmonError::Cancelled.as_label(), "cancelled");
        assert_eq!(
            ProcmonError::Decode {
                reason: "short".into()
            }
            .as_label(),
            "decode_failed"
        );
    }

    #[test]
    fn test_procfs_error_keeps_source() {
        use std::error::Error as _;

        let err = ProcmonError::Procfs {
            path: PathBuf::from("/proc/42/status"),
            source: io::Error::new(io::ErrorKind::NotFound, "gone"),
        };
        assert!(err.source().is_some());
        assert!(err.as_message().contains("/proc/42/status"));
    }
}
