//! Arm geometry, inverse and forward kinematics
//!
//! The inverse solution always picks the elbow-up branch (theta2 in
//! `[0, π]`). Elbow-down poses are never produced.

use core::fmt;

use libm::{atan2, cos, fabs, sin, sqrt};

use crate::config::ConfigError;

/// Base tolerance when clamping `cos θ2` into `[-1, 1]`
pub const COS_CLAMP_TOLERANCE: f64 = 1e-9;

/// Jacobian determinant magnitude (mm²) below which a pose is near-singular
pub const SINGULARITY_THRESHOLD: f64 = 1e-3;

/// Fixed link lengths of a 2-link planar arm
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ArmGeometry {
    l1: f64,
    l2: f64,
}

/// Joint angles produced by the inverse solution
///
/// Unreachable poses carry zero angles; check [`JointPose::reachable`]
/// before using them.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct JointPose {
    /// Shoulder angle (rad)
    pub theta1: f64,
    /// Elbow angle (rad)
    pub theta2: f64,
    /// Whether the target was inside the workspace
    pub reachable: bool,
}

impl JointPose {
    /// Marker for targets outside the workspace
    pub const UNREACHABLE: Self = Self {
        theta1: 0.0,
        theta2: 0.0,
        reachable: false,
    };

    /// Create a reachable pose
    pub const fn new(theta1: f64, theta2: f64) -> Self {
        Self {
            theta1,
            theta2,
            reachable: true,
        }
    }

    /// Angles in degrees
    pub fn to_degrees(&self) -> (f64, f64) {
        (self.theta1.to_degrees(), self.theta2.to_degrees())
    }
}

/// Target outside the reachable annulus
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UnreachablePoint {
    pub x: f64,
    pub y: f64,
}

impl fmt::Display for UnreachablePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "point ({:.3}, {:.3}) is outside the workspace", self.x, self.y)
    }
}

impl core::error::Error for UnreachablePoint {}

impl ArmGeometry {
    /// Create a geometry, rejecting non-positive or non-finite lengths
    pub fn new(l1: f64, l2: f64) -> Result<Self, ConfigError> {
        let valid = |l: f64| l.is_finite() && l > 0.0;
        if !valid(l1) || !valid(l2) {
            return Err(ConfigError::InvalidLinkLength);
        }
        Ok(Self { l1, l2 })
    }

    /// Shoulder-to-elbow length
    pub fn l1(&self) -> f64 {
        self.l1
    }

    /// Elbow-to-pen length
    pub fn l2(&self) -> f64 {
        self.l2
    }

    /// Outer radius of the workspace
    pub fn max_reach(&self) -> f64 {
        self.l1 + self.l2
    }

    /// Inner radius of the workspace
    pub fn min_reach(&self) -> f64 {
        fabs(self.l1 - self.l2)
    }

    /// Whether `(x, y)` lies in the reach annulus widened by `epsilon`
    ///
    /// The shoulder origin itself is treated as unreachable: its shoulder
    /// angle is undefined even when the links are equal.
    pub fn is_reachable(&self, x: f64, y: f64, epsilon: f64) -> bool {
        if !x.is_finite() || !y.is_finite() {
            return false;
        }
        if x == 0.0 && y == 0.0 {
            return false;
        }
        let r = sqrt(x * x + y * y);
        r <= self.max_reach() + epsilon && r >= self.min_reach() - epsilon
    }

    /// Inverse kinematics, elbow-up
    pub fn inverse(&self, x: f64, y: f64, epsilon: f64) -> JointPose {
        if !self.is_reachable(x, y, epsilon) {
            return JointPose::UNREACHABLE;
        }

        let (l1, l2) = (self.l1, self.l2);
        let raw = (x * x + y * y - l1 * l1 - l2 * l2) / (2.0 * l1 * l2);

        // A point admitted by the reach epsilon can overshoot |cos| = 1 by
        // roughly (l1 + l2) * eps / (l1 * l2)
        let tolerance = COS_CLAMP_TOLERANCE + 2.0 * self.max_reach() * epsilon / (l1 * l2);
        if fabs(raw) > 1.0 + tolerance {
            return JointPose::UNREACHABLE;
        }

        let c2 = raw.clamp(-1.0, 1.0);
        let s2 = sqrt(1.0 - c2 * c2);
        let theta2 = atan2(s2, c2);
        let theta1 = atan2(y, x) - atan2(l2 * s2, l1 + l2 * c2);

        JointPose::new(theta1, theta2)
    }

    /// Inverse kinematics as a `Result`
    pub fn solve(&self, x: f64, y: f64, epsilon: f64) -> Result<JointPose, UnreachablePoint> {
        let pose = self.inverse(x, y, epsilon);
        if pose.reachable {
            Ok(pose)
        } else {
            Err(UnreachablePoint { x, y })
        }
    }

    /// Forward kinematics: pen position for the given joint angles
    pub fn forward(&self, theta1: f64, theta2: f64) -> (f64, f64) {
        let (ex, ey) = self.elbow(theta1);
        let t12 = theta1 + theta2;
        (ex + self.l2 * cos(t12), ey + self.l2 * sin(t12))
    }

    /// Elbow joint position for the given shoulder angle
    pub fn elbow(&self, theta1: f64) -> (f64, f64) {
        (self.l1 * cos(theta1), self.l1 * sin(theta1))
    }

    /// Jacobian of the pen position with respect to the joint angles
    ///
    /// Rows are `dx`, `dy`; columns are `dθ1`, `dθ2`.
    pub fn jacobian(&self, theta1: f64, theta2: f64) -> [[f64; 2]; 2] {
        let (s1, c1) = (sin(theta1), cos(theta1));
        let t12 = theta1 + theta2;
        let (s12, c12) = (sin(t12), cos(t12));
        [
            [-self.l1 * s1 - self.l2 * s12, -self.l2 * s12],
            [self.l1 * c1 + self.l2 * c12, self.l2 * c12],
        ]
    }

    /// Jacobian determinant, equal to `l1 * l2 * sin θ2`
    pub fn jacobian_determinant(&self, theta1: f64, theta2: f64) -> f64 {
        let j = self.jacobian(theta1, theta2);
        j[0][0] * j[1][1] - j[0][1] * j[1][0]
    }

    /// Whether a pose sits next to a kinematic singularity
    ///
    /// Unreachable poses are not reported as singular.
    pub fn is_near_singular(&self, pose: &JointPose) -> bool {
        pose.reachable
            && fabs(self.jacobian_determinant(pose.theta1, pose.theta2)) < SINGULARITY_THRESHOLD
    }
}
