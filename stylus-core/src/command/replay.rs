//! Replay analysis
//!
//! Recovers the pen path a command table will draw by undoing the home
//! offset and step sign, then running the forward model.

use alloc::vec::Vec;

use super::synth::{CommandSynthesizer, StepSeed};
use super::table::CommandTable;
use crate::motion::{CartesianSample, Point};

/// Axis-aligned bounding box of a path (mm)
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PathExtent {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl PathExtent {
    /// Zero-size extent at `p`
    pub fn at(p: Point) -> Self {
        Self {
            min_x: p.x,
            max_x: p.x,
            min_y: p.y,
            max_y: p.y,
        }
    }

    /// Grow to include `p`
    pub fn include(&mut self, p: Point) {
        self.min_x = self.min_x.min(p.x);
        self.max_x = self.max_x.max(p.x);
        self.min_y = self.min_y.min(p.y);
        self.max_y = self.max_y.max(p.y);
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Reconstruct the Cartesian samples a table commands
pub fn reconstruct(synth: &CommandSynthesizer, table: &CommandTable) -> Vec<CartesianSample> {
    let arm = synth.geometry();
    table
        .iter()
        .map(|row| {
            let pose = synth.pose_from_steps(StepSeed {
                j1: row.j1_pos,
                j2: row.j2_pos,
            });
            let (x, y) = arm.forward(pose.theta1, pose.theta2);
            CartesianSample::new(x, y, row.pen)
        })
        .collect()
}

/// Extent of every sample
pub fn extent<'a, I>(samples: I) -> Option<PathExtent>
where
    I: IntoIterator<Item = &'a CartesianSample>,
{
    samples.into_iter().fold(None, |acc, s| {
        let p = s.point();
        Some(match acc {
            None => PathExtent::at(p),
            Some(mut e) => {
                e.include(p);
                e
            }
        })
    })
}

/// Extent of the pen-down samples only
pub fn drawn_extent<'a, I>(samples: I) -> Option<PathExtent>
where
    I: IntoIterator<Item = &'a CartesianSample>,
{
    extent(samples.into_iter().filter(|s| s.pen.is_down()))
}
