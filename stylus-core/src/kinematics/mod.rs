//! Two-link planar arm kinematics
//!
//! Angles are radians throughout. Theta1 is measured from the +X axis at the
//! shoulder; theta2 is the elbow angle relative to the first link.

pub mod arm;
pub mod precision;

pub use arm::{ArmGeometry, JointPose, UnreachablePoint, SINGULARITY_THRESHOLD};
pub use precision::{check_point, PrecisionGrade, PrecisionReport};
