//! Trajectory assembly
//!
//! Chains per-segment samples into one continuous fixed-tick sequence that
//! starts at home with the pen up.

pub mod builder;
pub mod waypoint;

pub use builder::{Trajectory, TrajectoryBuilder, TrajectoryError};
pub use waypoint::Waypoint;
