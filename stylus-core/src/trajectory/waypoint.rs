//! Drawing intent

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::motion::{PenState, Point};

/// Target point with the pen state to reach it with
///
/// A pen-down waypoint is drawn to from the previous position; a pen-up
/// waypoint is travelled to.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Waypoint {
    pub x: f64,
    pub y: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub pen: PenState,
}

impl Waypoint {
    pub const fn new(x: f64, y: f64, pen: PenState) -> Self {
        Self { x, y, pen }
    }

    pub const fn up(x: f64, y: f64) -> Self {
        Self::new(x, y, PenState::Up)
    }

    pub const fn down(x: f64, y: f64) -> Self {
        Self::new(x, y, PenState::Down)
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}
