//! Command synthesizer
//!
//! Each sample is solved, converted to absolute joint steps relative to the
//! home pose, and differenced against the previous row. The per-row
//! dependency is an explicit fold over a [`StepSeed`].

use alloc::vec::Vec;

use libm::round;
use log::{debug, info, warn};

use super::table::{CommandTable, MotorCommand};
use crate::config::{ConfigError, RobotConfig};
use crate::kinematics::{ArmGeometry, JointPose};
use crate::motion::CartesianSample;

/// Sign applied to step counts after removing the home offset
///
/// Both joints count opposite to the kinematic angle convention.
pub const STEP_SIGN: i64 = -1;

/// Step positions carried from one row to the next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StepSeed {
    pub j1: i64,
    pub j2: i64,
}

/// Outcome of synthesizing one sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynthStep {
    pub command: MotorCommand,
    /// Seed for the next row
    pub seed: StepSeed,
    /// Whether the sample was solved; otherwise the previous steps were held
    pub reachable: bool,
    pub near_singular: bool,
}

/// Maps Cartesian samples to step commands
#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    arm: ArmGeometry,
    epsilon: f64,
    steps_per_radian: [f64; 2],
    home_raw: [i64; 2],
    tick_s: f64,
}

impl CommandSynthesizer {
    /// Create a synthesizer, refusing configurations whose home is unreachable
    pub fn new(config: &RobotConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let arm = config.geometry()?;
        let epsilon = config.arm.reach_epsilon_mm;
        let (hx, hy) = config.motion.home();
        let home = arm
            .solve(hx, hy, epsilon)
            .map_err(|_| ConfigError::HomeUnreachable)?;

        let steps_per_radian = [
            config.joint1.steps_per_radian(),
            config.joint2.steps_per_radian(),
        ];
        let home_raw = [
            round(home.theta1 * steps_per_radian[0]) as i64,
            round(home.theta2 * steps_per_radian[1]) as i64,
        ];
        info!(
            "Home offset: J1 {} steps, J2 {} steps",
            home_raw[0], home_raw[1]
        );

        Ok(Self {
            arm,
            epsilon,
            steps_per_radian,
            home_raw,
            tick_s: config.motion.tick_s(),
        })
    }

    pub fn geometry(&self) -> &ArmGeometry {
        &self.arm
    }

    /// Raw step counts of the home pose
    pub fn home_offset(&self) -> StepSeed {
        StepSeed {
            j1: self.home_raw[0],
            j2: self.home_raw[1],
        }
    }

    pub fn tick_s(&self) -> f64 {
        self.tick_s
    }

    /// Step positions of a pose relative to home
    pub fn joint_steps(&self, pose: &JointPose) -> StepSeed {
        let raw1 = round(pose.theta1 * self.steps_per_radian[0]) as i64;
        let raw2 = round(pose.theta2 * self.steps_per_radian[1]) as i64;
        StepSeed {
            j1: STEP_SIGN * (raw1 - self.home_raw[0]),
            j2: STEP_SIGN * (raw2 - self.home_raw[1]),
        }
    }

    /// Joint angles for step positions relative to home
    pub fn pose_from_steps(&self, steps: StepSeed) -> JointPose {
        let raw1 = self.home_raw[0] + STEP_SIGN * steps.j1;
        let raw2 = self.home_raw[1] + STEP_SIGN * steps.j2;
        JointPose::new(
            raw1 as f64 / self.steps_per_radian[0],
            raw2 as f64 / self.steps_per_radian[1],
        )
    }

    /// Synthesize row `index` from `sample` given the previous row's steps
    pub fn step(&self, prev: StepSeed, index: usize, sample: &CartesianSample) -> SynthStep {
        let pose = self.arm.inverse(sample.x, sample.y, self.epsilon);
        let seed = if pose.reachable {
            self.joint_steps(&pose)
        } else {
            prev
        };

        let d1 = seed.j1 - prev.j1;
        let d2 = seed.j2 - prev.j2;
        let command = MotorCommand {
            t: index as f64 * self.tick_s,
            j1_pos: seed.j1,
            j1_dir: d1 >= 0,
            j1_delta: d1.unsigned_abs(),
            j1_hz: d1.unsigned_abs() as f64 / self.tick_s,
            j2_pos: seed.j2,
            j2_dir: d2 >= 0,
            j2_delta: d2.unsigned_abs(),
            j2_hz: d2.unsigned_abs() as f64 / self.tick_s,
            pen: sample.pen,
        };

        SynthStep {
            command,
            seed,
            reachable: pose.reachable,
            near_singular: self.arm.is_near_singular(&pose),
        }
    }

    /// Synthesize a whole sample sequence, seeded at the home pose
    pub fn synthesize(&self, samples: &[CartesianSample]) -> CommandTable {
        let mut rows = Vec::with_capacity(samples.len());
        let mut unreachable = 0usize;
        let mut singular = 0usize;

        samples
            .iter()
            .enumerate()
            .fold(StepSeed::default(), |prev, (index, sample)| {
                let step = self.step(prev, index, sample);
                if !step.reachable {
                    unreachable += 1;
                    debug!(
                        "Sample {} ({}, {}) unreachable, holding position",
                        index, sample.x, sample.y
                    );
                }
                if step.near_singular {
                    singular += 1;
                }
                rows.push(step.command);
                step.seed
            });

        if unreachable > 0 {
            warn!("{} samples unreachable, positions held", unreachable);
        }
        if singular > 0 {
            debug!("{} samples near a singularity", singular);
        }
        info!("Synthesized {} command rows", rows.len());

        CommandTable::from_rows(self.tick_s, rows, unreachable, singular)
    }
}
