//! Dispatcher state machine
//!
//! Rows and pen changes are written only in `Streaming`. The safe-state
//! pen-up is written only while the run has not yet ended.

use super::events::DispatchEvent;

/// Dispatcher states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DispatchState {
    /// Created, nothing written yet
    Idle,
    /// Polling the enable bit
    WaitEnable,
    /// Writing one row per tick
    Streaming,
    /// All rows written, lifting the pen
    Draining,
    /// Run completed
    Done,
    /// Run stopped by a fault; pen-up attempted
    Aborted(FaultKind),
}

/// Why a run was aborted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FaultKind {
    /// A link read or write failed
    Transport,
    /// The enable bit never came up
    HandshakeTimeout,
    /// The caller raised the cancellation flag
    Cancelled,
}

impl DispatchState {
    /// Check if row writes are allowed in this state
    pub fn streaming_allowed(&self) -> bool {
        matches!(self, DispatchState::Streaming)
    }

    /// Check if the run is over
    pub fn is_terminal(&self) -> bool {
        matches!(self, DispatchState::Done | DispatchState::Aborted(_))
    }

    /// Process an event and return the next state
    pub fn transition(self, event: DispatchEvent) -> Self {
        use DispatchEvent::*;
        use DispatchState::*;

        match (self, event) {
            (Idle, Start) => WaitEnable,

            (WaitEnable, EnableObserved) => Streaming,
            (WaitEnable, Fault(kind)) => Aborted(kind),

            (Streaming, RowsExhausted) => Draining,
            (Streaming, Fault(kind)) => Aborted(kind),

            (Draining, SafeStateWritten) => Done,
            (Draining, Fault(kind)) => Aborted(kind),

            // Default: stay in current state
            _ => self,
        }
    }
}
