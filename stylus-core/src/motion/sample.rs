//! Positions and timed samples

use libm::hypot;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Pen state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum PenState {
    /// Lifted, travelling
    #[default]
    Up,
    /// Lowered, drawing
    Down,
}

impl PenState {
    /// Whether the pen is touching the paper
    pub fn is_down(self) -> bool {
        matches!(self, Self::Down)
    }
}

/// Position on the drawing plane (mm)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`
    pub fn distance_to(&self, other: Point) -> f64 {
        hypot(other.x - self.x, other.y - self.y)
    }

    /// Point at fraction `s` of the way to `other`
    pub fn lerp(&self, other: Point, s: f64) -> Point {
        Point::new(
            self.x + (other.x - self.x) * s,
            self.y + (other.y - self.y) * s,
        )
    }

    /// Both coordinates are finite
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

/// One Cartesian sample per command tick
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CartesianSample {
    pub x: f64,
    pub y: f64,
    pub pen: PenState,
}

impl CartesianSample {
    pub const fn new(x: f64, y: f64, pen: PenState) -> Self {
        Self { x, y, pen }
    }

    /// Create a sample at `point`
    pub fn at(point: Point, pen: PenState) -> Self {
        Self::new(point.x, point.y, pen)
    }

    /// Position of the sample
    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}
