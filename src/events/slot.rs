//! # Two-phase event slot.
//!
//! A [`Slot`] is appended to a stream before its data exists so a reader can
//! park on it. It moves through:
//!
//! ```text
//! Pending ──fill(ev)──────────────────────────► Ready(ev)
//!    │
//!    └──mark_lost()──► PendingLost ──seal_lost()──► Ready(Lost)
//! ```
//!
//! ## Rules
//! - `Ready` is terminal; a second fill is a defect and panics.
//! - `PendingLost` never goes back to `Pending` and is never overwritten with
//!   real data, only sealed as a Lost record.
//! - Waiters are woken exactly when the slot becomes `Ready`.
//! - Waiting never polls; it parks on a [`Notify`] and re-checks state.

use std::sync::{Mutex, PoisonError};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::error::ProcmonError;

use super::event::ProcessEvent;

#[derive(Debug)]
enum SlotState {
    Pending,
    PendingLost,
    Ready(ProcessEvent),
}

/// One queued event, possibly not yet filled.
#[derive(Debug)]
pub(crate) struct Slot {
    state: Mutex<SlotState>,
    filled: Notify,
}

impl Slot {
    /// Creates an unfilled placeholder.
    pub(crate) fn placeholder() -> Self {
        Self {
            state: Mutex::new(SlotState::Pending),
            filled: Notify::new(),
        }
    }

    /// Creates a slot that is already filled (snapshot events).
    pub(crate) fn ready(event: ProcessEvent) -> Self {
        Self {
            state: Mutex::new(SlotState::Ready(event)),
            filled: Notify::new(),
        }
    }

    /// Fills the slot and wakes every waiter.
    ///
    /// # Panics
    /// If the slot was already filled or marked lost.
    pub(crate) fn fill(&self, event: ProcessEvent) {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            match *state {
                SlotState::Pending => *state = SlotState::Ready(event),
                SlotState::PendingLost => panic!("slot marked lost cannot be filled"),
                SlotState::Ready(_) => panic!("slot filled twice"),
            }
        }
        self.filled.notify_waiters();
    }

    /// Marks a pending slot as lost without waking readers.
    ///
    /// Returns `false` if the slot already carried the mark.
    pub(crate) fn mark_lost(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match *state {
            SlotState::Pending => {
                *state = SlotState::PendingLost;
                true
            }
            SlotState::PendingLost => false,
            SlotState::Ready(_) => {
                debug_assert!(false, "only the unfilled tail can be marked lost");
                false
            }
        }
    }

    /// True while the slot carries an unsealed Lost mark.
    pub(crate) fn is_lost(&self) -> bool {
        matches!(
            *self.state.lock().unwrap_or_else(PoisonError::into_inner),
            SlotState::PendingLost
        )
    }

    /// Publishes a lost-marked slot as a Lost record and wakes waiters.
    pub(crate) fn seal_lost(&self) {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if !matches!(*state, SlotState::PendingLost) {
                return;
            }
            *state = SlotState::Ready(ProcessEvent::lost());
        }
        self.filled.notify_waiters();
    }

    /// Copy of the record if the slot is filled.
    pub(crate) fn peek(&self) -> Option<ProcessEvent> {
        match &*self.state.lock().unwrap_or_else(PoisonError::into_inner) {
            SlotState::Ready(ev) => Some(ev.clone()),
            _ => None,
        }
    }

    /// Waits until the slot is filled or `cancel` fires.
    ///
    /// Returns [`ProcmonError::Cancelled`] on cancellation, even if the slot
    /// is already filled; the slot itself is left untouched.
    pub(crate) async fn wait_until_filled(
        &self,
        cancel: &CancellationToken,
    ) -> Result<ProcessEvent, ProcmonError> {
        loop {
            let notified = self.filled.notified();
            tokio::pin!(notified);
            // Register interest before checking state so a concurrent fill is not missed.
            notified.as_mut().enable();

            if cancel.is_cancelled() {
                return Err(ProcmonError::Cancelled);
            }
            if let Some(ev) = self.peek() {
                return Ok(ev);
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ProcmonError::Cancelled),
                _ = &mut notified => {}
            }
        }
    }
}
