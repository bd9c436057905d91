//! Events that trigger dispatcher state transitions

use super::machine::FaultKind;

/// Events that can trigger dispatcher state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DispatchEvent {
    /// Caller started a run
    Start,
    /// Controller raised the enable bit
    EnableObserved,
    /// Last row was written
    RowsExhausted,
    /// Pen-up was written after the last row
    SafeStateWritten,
    /// Transport error, timeout or cancellation
    Fault(FaultKind),
}
