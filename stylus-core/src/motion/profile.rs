//! Time-scaling laws
//!
//! A time-scaling maps normalized time `τ ∈ [0, 1]` to normalized path
//! position `s ∈ [0, 1]`.

/// Quintic minimum-jerk scaling `s(τ) = 10τ³ − 15τ⁴ + 6τ⁵`
///
/// Velocity and acceleration are zero at both ends. Input and output are
/// clamped to `[0, 1]`.
pub fn quintic(tau: f64) -> f64 {
    let t = tau.clamp(0.0, 1.0);
    let t3 = t * t * t;
    (t3 * (10.0 + t * (-15.0 + 6.0 * t))).clamp(0.0, 1.0)
}

/// Time-scaling law used for a move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimeScaling {
    /// Smooth start and stop, for pen-up travel
    Quintic,
    /// Constant speed, for pen-down drawing
    Linear,
}

impl TimeScaling {
    /// Path fraction at normalized time `tau`
    pub fn scale(self, tau: f64) -> f64 {
        match self {
            Self::Quintic => quintic(tau),
            Self::Linear => tau.clamp(0.0, 1.0),
        }
    }
}
