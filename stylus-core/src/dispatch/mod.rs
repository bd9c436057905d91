//! Realtime command dispatch
//!
//! Streams a command table to the motion controller, one row per tick,
//! behind the controller's enable handshake.

pub mod dispatcher;
pub mod events;
pub mod machine;

pub use dispatcher::{
    read_feedback, DispatchFailure, DispatchReport, Dispatcher, FailureKind, HandshakeState,
    JointFeedback,
};
pub use events::DispatchEvent;
pub use machine::{DispatchState, FaultKind};
