//! Trajectory builder
//!
//! Walks the waypoint list once, in order, planning each segment from the
//! current pen position.

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use log::{debug, info};

use super::waypoint::Waypoint;
use crate::config::MotionConfig;
use crate::motion::{plan_segment, CartesianSample, PenState, Point};

/// Trajectory construction errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TrajectoryError {
    /// A waypoint coordinate is NaN or infinite
    NonFiniteWaypoint { index: usize },
}

impl fmt::Display for TrajectoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonFiniteWaypoint { index } => {
                write!(f, "waypoint {} has a non-finite coordinate", index)
            }
        }
    }
}

impl core::error::Error for TrajectoryError {}

/// Fixed-tick Cartesian sample sequence
///
/// Sample `i` is played back at `i * tick_s`.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    samples: Vec<CartesianSample>,
    tick_s: f64,
}

impl Trajectory {
    pub fn samples(&self) -> &[CartesianSample] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<CartesianSample> {
        self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn tick_s(&self) -> f64 {
        self.tick_s
    }

    /// Playback time of the last sample
    pub fn duration_s(&self) -> f64 {
        self.samples.len().saturating_sub(1) as f64 * self.tick_s
    }
}

/// Builds a [`Trajectory`] from waypoints
pub struct TrajectoryBuilder<'a> {
    motion: &'a MotionConfig,
}

impl<'a> TrajectoryBuilder<'a> {
    pub fn new(motion: &'a MotionConfig) -> Self {
        Self { motion }
    }

    /// Build the full sample sequence
    ///
    /// The first sample is always the home position with the pen up.
    /// Degenerate segments leave the current position and pen unchanged.
    pub fn build(&self, waypoints: &[Waypoint]) -> Result<Trajectory, TrajectoryError> {
        if let Some(index) = waypoints.iter().position(|w| !w.point().is_finite()) {
            return Err(TrajectoryError::NonFiniteWaypoint { index });
        }

        let home = Point::from(self.motion.home());
        let mut samples = vec![CartesianSample::at(home, PenState::Up)];
        let mut current = home;
        let mut pen = PenState::Up;

        for (index, waypoint) in waypoints.iter().enumerate() {
            let segment = plan_segment(current, pen, waypoint.point(), waypoint.pen, self.motion);
            let planned = segment.len();
            if planned == 0 {
                debug!("Waypoint {}: degenerate segment skipped", index);
                continue;
            }

            samples.extend(segment);
            current = waypoint.point();
            pen = waypoint.pen;
            debug!(
                "Waypoint {}: ({}, {}) {:?}, {} samples",
                index, waypoint.x, waypoint.y, waypoint.pen, planned
            );
        }

        let trajectory = Trajectory {
            samples,
            tick_s: self.motion.tick_s(),
        };
        info!(
            "Trajectory built: {} waypoints, {} samples, {:.2} s",
            waypoints.len(),
            trajectory.len(),
            trajectory.duration_s()
        );
        Ok(trajectory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_waypoint_at_home() {
        let motion = MotionConfig::default();
        let traj = TrajectoryBuilder::new(&motion)
            .build(&[Waypoint::up(0.0, 309.5)])
            .unwrap();
        assert_eq!(traj.len(), 1);
        assert_eq!(traj.samples()[0], CartesianSample::new(0.0, 309.5, PenState::Up));
        assert_eq!(traj.duration_s(), 0.0);
    }

    #[test]
    fn test_empty_waypoints_yield_home() {
        let motion = MotionConfig::default();
        let traj = TrajectoryBuilder::new(&motion).build(&[]).unwrap();
        assert_eq!(traj.len(), 1);
    }

    #[test]
    fn test_draw_from_custom_home() {
        let motion = MotionConfig {
            home_x_mm: 200.0,
            home_y_mm: 0.0,
            ..MotionConfig::default()
        };
        let traj = TrajectoryBuilder::new(&motion)
            .build(&[Waypoint::down(260.0, 0.0)])
            .unwrap();

        // home + land dwell + 2 s of drawing
        assert_eq!(traj.len(), 1 + 100 + 100);
        let samples = traj.samples();
        assert_eq!(samples[0].pen, PenState::Up);
        assert!(samples[1..=100]
            .iter()
            .all(|s| s.pen == PenState::Down && s.x == 200.0));
        assert_eq!(*samples.last().unwrap(), CartesianSample::new(260.0, 0.0, PenState::Down));
        assert!((traj.duration_s() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_travel_then_draw() {
        let motion = MotionConfig::default();
        let traj = TrajectoryBuilder::new(&motion)
            .build(&[Waypoint::up(100.0, 200.0), Waypoint::down(150.0, 200.0)])
            .unwrap();
        let samples = traj.samples();

        // Lift dwell at home
        assert!(samples[1..=10].iter().all(|s| s.x == 0.0 && s.pen == PenState::Up));

        // Travel ends exactly on the first waypoint, then the land dwell holds there
        let land_start = samples
            .iter()
            .position(|s| s.pen == PenState::Down)
            .unwrap();
        assert_eq!(samples[land_start - 1].point(), Point::new(100.0, 200.0));
        assert!(samples[land_start..land_start + 100]
            .iter()
            .all(|s| s.point() == Point::new(100.0, 200.0)));
        assert_eq!(samples.last().unwrap().point(), Point::new(150.0, 200.0));
    }

    #[test]
    fn test_consecutive_draws_skip_land_dwell() {
        let motion = MotionConfig {
            home_x_mm: 200.0,
            home_y_mm: 0.0,
            ..MotionConfig::default()
        };
        let one = TrajectoryBuilder::new(&motion)
            .build(&[Waypoint::down(230.0, 0.0)])
            .unwrap();
        let two = TrajectoryBuilder::new(&motion)
            .build(&[Waypoint::down(230.0, 0.0), Waypoint::down(260.0, 0.0)])
            .unwrap();
        assert_eq!(two.len() - one.len(), 50);
    }

    #[test]
    fn test_duplicate_draw_point_skipped() {
        let motion = MotionConfig {
            home_x_mm: 200.0,
            home_y_mm: 0.0,
            ..MotionConfig::default()
        };
        let base = TrajectoryBuilder::new(&motion)
            .build(&[Waypoint::down(260.0, 0.0)])
            .unwrap();
        let dup = TrajectoryBuilder::new(&motion)
            .build(&[Waypoint::down(260.0, 0.0), Waypoint::down(260.0, 0.0)])
            .unwrap();
        assert_eq!(base, dup);
    }

    #[test]
    fn test_non_finite_waypoint_rejected() {
        let motion = MotionConfig::default();
        let err = TrajectoryBuilder::new(&motion)
            .build(&[Waypoint::up(100.0, 100.0), Waypoint::down(f64::NAN, 0.0)])
            .unwrap_err();
        assert_eq!(err, TrajectoryError::NonFiniteWaypoint { index: 1 });
    }
}
