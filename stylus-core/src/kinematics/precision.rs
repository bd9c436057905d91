//! Per-point precision check
//!
//! Solves a target, runs the forward model over the solution and grades the
//! round-trip error. Used to vet waypoints before a job is streamed.

use libm::hypot;

use super::arm::{ArmGeometry, JointPose, UnreachablePoint};

/// Round-trip error at or below which a point is graded excellent (mm)
pub const EXCELLENT_THRESHOLD_MM: f64 = 5.0;

/// Round-trip error at or below which a point is still acceptable (mm)
pub const ACCEPTABLE_THRESHOLD_MM: f64 = 10.0;

/// Outcome grade of a precision check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PrecisionGrade {
    Excellent,
    Acceptable,
    Fail,
}

impl PrecisionGrade {
    /// Grade a round-trip error in millimetres
    pub fn from_error(error_mm: f64) -> Self {
        if error_mm <= EXCELLENT_THRESHOLD_MM {
            Self::Excellent
        } else if error_mm <= ACCEPTABLE_THRESHOLD_MM {
            Self::Acceptable
        } else {
            Self::Fail
        }
    }

    /// Whether the grade allows the point to be used
    pub fn passed(&self) -> bool {
        !matches!(self, Self::Fail)
    }
}

/// Result of checking one target point
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PrecisionReport {
    /// Requested target
    pub target: (f64, f64),
    /// Inverse solution
    pub pose: JointPose,
    /// Forward model applied to `pose`
    pub reached: (f64, f64),
    /// Distance between `target` and `reached`
    pub error_mm: f64,
    /// Jacobian determinant at `pose`
    pub jacobian_det: f64,
    /// `|jacobian_det|` below the singularity threshold
    pub near_singular: bool,
    pub grade: PrecisionGrade,
}

/// Check a single target point
pub fn check_point(
    arm: &ArmGeometry,
    x: f64,
    y: f64,
    epsilon: f64,
) -> Result<PrecisionReport, UnreachablePoint> {
    let pose = arm.solve(x, y, epsilon)?;
    let reached = arm.forward(pose.theta1, pose.theta2);
    let error_mm = hypot(reached.0 - x, reached.1 - y);
    let jacobian_det = arm.jacobian_determinant(pose.theta1, pose.theta2);

    Ok(PrecisionReport {
        target: (x, y),
        pose,
        reached,
        error_mm,
        jacobian_det,
        near_singular: arm.is_near_singular(&pose),
        grade: PrecisionGrade::from_error(error_mm),
    })
}
