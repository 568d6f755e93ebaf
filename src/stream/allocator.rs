//! # Slot admission
//!
//! Every placeholder a stream grows by goes through a [`SlotAllocator`]. A
//! refusal is not an error for the producer: during fan-out it turns the
//! stream's tail into a `Lost` marker. Only `open` surfaces it to the caller.
//!
//! ## Variants
//! - [`BoundedAllocator`]: refuses once a stream holds `capacity` slots.
//!   This is the per-consumer bound that keeps a stalled reader from growing
//!   its backlog without limit.
//! - Custom implementations: tests and embedders can plug in their own
//!   (fault injection, global memory budgets, etc.).

use crate::error::ProcmonError;

/// Decides whether a stream may grow by one slot.
pub trait SlotAllocator: Send + Sync + 'static {
    /// Called with the number of slots the stream currently queues.
    ///
    /// Returns [`ProcmonError::ResourceExhausted`] to refuse.
    fn admit(&self, stream_len: usize) -> Result<(), ProcmonError>;
}

/// Per-stream capacity bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundedAllocator {
    capacity: usize,
}

impl BoundedAllocator {
    /// Creates an allocator admitting up to `capacity` queued slots per stream.
    ///
    /// The capacity is clamped to a minimum of 3: recovering from a Lost
    /// tail needs room for the sealed marker, the payload and a new tail.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(3),
        }
    }

    /// Effective capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl SlotAllocator for BoundedAllocator {
    fn admit(&self, stream_len: usize) -> Result<(), ProcmonError> {
        if stream_len >= self.capacity {
            Err(ProcmonError::ResourceExhausted {
                stream_len,
                capacity: self.capacity,
            })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_admits_below_capacity() {
        let alloc = BoundedAllocator::new(3);
        assert!(alloc.admit(0).is_ok());
        assert!(alloc.admit(2).is_ok());
        let err = alloc.admit(3).unwrap_err();
        assert_eq!(err.as_label(), "resource_exhausted");
    }

    #[test]
    fn test_capacity_is_clamped() {
        assert_eq!(BoundedAllocator::new(0).capacity(), 3);
        assert_eq!(BoundedAllocator::new(2).capacity(), 3);
        assert_eq!(BoundedAllocator::new(64).capacity(), 64);
    }
}
