//! Segment planner
//!
//! A segment is a dwell (possibly empty) followed by a move. Move samples are
//! emitted for ticks `1..=n`: the start position is already the previous
//! sample, and the final sample lands exactly on the segment end.

use core::iter::FusedIterator;

use libm::floor;

use super::profile::TimeScaling;
use super::sample::{CartesianSample, PenState, Point};
use crate::config::MotionConfig;

/// Segments shorter than this are degenerate and produce no samples (mm)
pub const MIN_SEGMENT_DISTANCE_MM: f64 = 1e-3;

/// Minimum number of samples in a travel move
pub const MIN_TRAVEL_SAMPLES: u32 = 5;

/// Slack added before flooring a tick count so exact multiples survive
/// floating-point division
const TICK_ROUNDING: f64 = 1e-9;

fn tick_count(duration_s: f64, tick_s: f64) -> u32 {
    // `as` saturates on overflow
    floor(duration_s / tick_s + TICK_ROUNDING) as u32
}

/// Samples of one straight move
///
/// Consumed as it is iterated; build a new one to replay a move.
#[derive(Debug)]
pub struct MoveSamples {
    start: Point,
    end: Point,
    pen: PenState,
    scaling: TimeScaling,
    total: u32,
    emitted: u32,
}

impl MoveSamples {
    /// A move that emits nothing
    pub fn empty(at: Point, pen: PenState) -> Self {
        Self {
            start: at,
            end: at,
            pen,
            scaling: TimeScaling::Linear,
            total: 0,
            emitted: 0,
        }
    }

    /// Pen-up travel with quintic time-scaling
    ///
    /// Duration is `distance / speed`, at least one tick, and the sample
    /// count is raised to [`MIN_TRAVEL_SAMPLES`].
    pub fn travel(start: Point, end: Point, speed_mm_s: f64, tick_s: f64) -> Self {
        let distance = start.distance_to(end);
        if distance < MIN_SEGMENT_DISTANCE_MM {
            return Self::empty(end, PenState::Up);
        }
        let duration = (distance / speed_mm_s).max(tick_s);
        let total = tick_count(duration, tick_s).max(MIN_TRAVEL_SAMPLES);
        Self {
            start,
            end,
            pen: PenState::Up,
            scaling: TimeScaling::Quintic,
            total,
            emitted: 0,
        }
    }

    /// Pen-down drawing with linear time-scaling
    ///
    /// A move shorter than one tick collapses to its terminal sample.
    pub fn draw(start: Point, end: Point, speed_mm_s: f64, tick_s: f64) -> Self {
        let distance = start.distance_to(end);
        if distance < MIN_SEGMENT_DISTANCE_MM {
            return Self::empty(end, PenState::Down);
        }
        let total = tick_count(distance / speed_mm_s, tick_s).max(1);
        Self {
            start,
            end,
            pen: PenState::Down,
            scaling: TimeScaling::Linear,
            total,
            emitted: 0,
        }
    }

    /// Time-scaling law of this move
    pub fn scaling(&self) -> TimeScaling {
        self.scaling
    }

    /// Total number of samples, including those already emitted
    pub fn total(&self) -> u32 {
        self.total
    }
}

impl Iterator for MoveSamples {
    type Item = CartesianSample;

    fn next(&mut self) -> Option<Self::Item> {
        if self.emitted >= self.total {
            return None;
        }
        self.emitted += 1;

        let point = if self.emitted == self.total {
            self.end
        } else {
            let tau = self.emitted as f64 / self.total as f64;
            self.start.lerp(self.end, self.scaling.scale(tau))
        };
        Some(CartesianSample::at(point, self.pen))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.total - self.emitted) as usize;
        (left, Some(left))
    }
}

impl ExactSizeIterator for MoveSamples {}
impl FusedIterator for MoveSamples {}

/// Stationary samples held while the pen lifts or lands
#[derive(Debug)]
pub struct Dwell {
    at: Point,
    pen: PenState,
    remaining: u32,
}

impl Dwell {
    pub fn new(at: Point, pen: PenState, ticks: u32) -> Self {
        Self {
            at,
            pen,
            remaining: ticks,
        }
    }

    pub fn none(at: Point) -> Self {
        Self::new(at, PenState::Up, 0)
    }
}

impl Iterator for Dwell {
    type Item = CartesianSample;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(CartesianSample::at(self.at, self.pen))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining as usize, Some(self.remaining as usize))
    }
}

impl ExactSizeIterator for Dwell {}
impl FusedIterator for Dwell {}

/// Dwell followed by a move
#[derive(Debug)]
pub struct SegmentSamples {
    dwell: Dwell,
    motion: MoveSamples,
}

impl SegmentSamples {
    /// A segment that emits nothing
    pub fn empty(at: Point) -> Self {
        Self {
            dwell: Dwell::none(at),
            motion: MoveSamples::empty(at, PenState::Up),
        }
    }
}

impl Iterator for SegmentSamples {
    type Item = CartesianSample;

    fn next(&mut self) -> Option<Self::Item> {
        self.dwell.next().or_else(|| self.motion.next())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.dwell.len() + self.motion.len();
        (n, Some(n))
    }
}

impl ExactSizeIterator for SegmentSamples {}
impl FusedIterator for SegmentSamples {}

/// Plan the samples that take the pen from `from` to `to`
///
/// - Pen-up target: lift dwell at `from`, then quintic travel.
/// - Pen-down target: land dwell at `from` if the pen was up, then linear draw.
/// - Degenerate segments (shorter than [`MIN_SEGMENT_DISTANCE_MM`]) emit
///   nothing, dwell included.
pub fn plan_segment(
    from: Point,
    previous_pen: PenState,
    to: Point,
    pen: PenState,
    motion: &MotionConfig,
) -> SegmentSamples {
    if from.distance_to(to) < MIN_SEGMENT_DISTANCE_MM {
        return SegmentSamples::empty(from);
    }

    let tick_s = motion.tick_s();
    match pen {
        PenState::Up => SegmentSamples {
            dwell: Dwell::new(from, PenState::Up, motion.lift_dwell_ticks()),
            motion: MoveSamples::travel(from, to, motion.travel_speed_mm_s, tick_s),
        },
        PenState::Down => {
            let land = if previous_pen == PenState::Up {
                motion.land_dwell_ticks()
            } else {
                0
            };
            SegmentSamples {
                dwell: Dwell::new(from, PenState::Down, land),
                motion: MoveSamples::draw(from, to, motion.draw_speed_mm_s, tick_s),
            }
        }
    }
}
