//! Motion profiling
//!
//! Turns one (start, end, pen) segment into a lazily evaluated sequence of
//! Cartesian samples at the command tick.

pub mod planner;
pub mod profile;
pub mod sample;

pub use planner::{plan_segment, Dwell, MoveSamples, SegmentSamples, MIN_SEGMENT_DISTANCE_MM};
pub use profile::{quintic, TimeScaling};
pub use sample::{CartesianSample, PenState, Point};
