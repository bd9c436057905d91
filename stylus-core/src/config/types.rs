//! Core configuration types
//!
//! Arm dimensions, motion timing and the top-level [`RobotConfig`].

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::hardware::{HandshakeConfig, JointDriveConfig};
use crate::kinematics::ArmGeometry;

/// Default link lengths of the reference arm (mm)
pub const DEFAULT_L1_MM: f64 = 160.0;
pub const DEFAULT_L2_MM: f64 = 149.5;

/// Default reachability tolerance (mm)
pub const DEFAULT_REACH_EPSILON_MM: f64 = 1e-6;

/// Default command tick (ms)
pub const DEFAULT_TICK_MS: u16 = 20;

/// Arm geometry configuration
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ArmConfig {
    /// Shoulder-to-elbow length
    pub l1_mm: f64,
    /// Elbow-to-pen length
    pub l2_mm: f64,
    /// Tolerance applied to the reach annulus boundaries
    pub reach_epsilon_mm: f64,
}

impl Default for ArmConfig {
    fn default() -> Self {
        Self {
            l1_mm: DEFAULT_L1_MM,
            l2_mm: DEFAULT_L2_MM,
            reach_epsilon_mm: DEFAULT_REACH_EPSILON_MM,
        }
    }
}

/// Motion timing configuration
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MotionConfig {
    /// Sample/command period
    pub tick_ms: u16,
    /// Pen-up travel speed
    pub travel_speed_mm_s: f64,
    /// Pen-down drawing speed
    pub draw_speed_mm_s: f64,
    /// Hold before every travel move so the pen can lift
    pub lift_dwell_ms: u32,
    /// Hold before a draw move that follows pen-up so the pen can settle
    pub land_dwell_ms: u32,
    /// Home position X
    pub home_x_mm: f64,
    /// Home position Y
    pub home_y_mm: f64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            tick_ms: DEFAULT_TICK_MS,
            travel_speed_mm_s: 50.0,
            draw_speed_mm_s: 30.0,
            lift_dwell_ms: 200,
            land_dwell_ms: 2000,
            home_x_mm: 0.0,
            home_y_mm: DEFAULT_L1_MM + DEFAULT_L2_MM,
        }
    }
}

impl MotionConfig {
    /// Tick period in seconds
    pub fn tick_s(&self) -> f64 {
        self.tick_ms as f64 / 1000.0
    }

    /// Tick period in microseconds
    pub fn tick_us(&self) -> u64 {
        self.tick_ms as u64 * 1000
    }

    /// Number of ticks the lift dwell occupies
    pub fn lift_dwell_ticks(&self) -> u32 {
        self.dwell_ticks(self.lift_dwell_ms)
    }

    /// Number of ticks the land dwell occupies
    pub fn land_dwell_ticks(&self) -> u32 {
        self.dwell_ticks(self.land_dwell_ms)
    }

    fn dwell_ticks(&self, ms: u32) -> u32 {
        if self.tick_ms == 0 {
            return 0;
        }
        // Partial ticks are dropped
        ms / self.tick_ms as u32
    }

    /// Home position as a point
    pub fn home(&self) -> (f64, f64) {
        (self.home_x_mm, self.home_y_mm)
    }
}

/// Complete robot configuration
///
/// One value of this type carries every tunable the pipeline uses, from arm
/// lengths down to the controller register names.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RobotConfig {
    /// Arm geometry
    pub arm: ArmConfig,
    /// Shoulder joint drive
    pub joint1: JointDriveConfig,
    /// Elbow joint drive
    pub joint2: JointDriveConfig,
    /// Motion timing and home pose
    pub motion: MotionConfig,
    /// Controller handshake and register map
    pub handshake: HandshakeConfig,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            arm: ArmConfig::default(),
            joint1: JointDriveConfig::shoulder(),
            joint2: JointDriveConfig::elbow(),
            motion: MotionConfig::default(),
            handshake: HandshakeConfig::default(),
        }
    }
}

impl RobotConfig {
    /// Validate every section
    ///
    /// Checks are ordered so the first reported error is the most basic one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let arm = self.geometry()?;

        let eps = self.arm.reach_epsilon_mm;
        if !eps.is_finite() || eps <= 0.0 {
            return Err(ConfigError::InvalidEpsilon);
        }

        let m = &self.motion;
        if m.tick_ms == 0 {
            return Err(ConfigError::ZeroTick);
        }
        for speed in [m.travel_speed_mm_s, m.draw_speed_mm_s] {
            if !speed.is_finite() || speed <= 0.0 {
                return Err(ConfigError::InvalidSpeed);
            }
        }

        self.joint1.validate()?;
        self.joint2.validate()?;
        self.handshake.validate()?;

        if !arm.is_reachable(m.home_x_mm, m.home_y_mm, eps) {
            return Err(ConfigError::HomeUnreachable);
        }

        Ok(())
    }

    /// Arm geometry described by this configuration
    pub fn geometry(&self) -> Result<ArmGeometry, ConfigError> {
        ArmGeometry::new(self.arm.l1_mm, self.arm.l2_mm)
    }
}

/// Configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// A link length is zero, negative or not finite
    InvalidLinkLength,
    /// Reach tolerance is zero, negative or not finite
    InvalidEpsilon,
    /// Tick period is zero
    ZeroTick,
    /// A speed is zero, negative or not finite
    InvalidSpeed,
    /// Steps per rotation or microstepping is zero
    InvalidStepCount,
    /// A gear ratio term is zero
    InvalidGearRatio,
    /// Enable poll interval is zero
    InvalidPollInterval,
    /// A register or bit name is empty
    EmptyDeviceName,
    /// Home position lies outside the reachable annulus
    HomeUnreachable,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLinkLength => write!(f, "link lengths must be positive and finite"),
            Self::InvalidEpsilon => write!(f, "reach epsilon must be positive"),
            Self::ZeroTick => write!(f, "tick period must be non-zero"),
            Self::InvalidSpeed => write!(f, "speeds must be positive and finite"),
            Self::InvalidStepCount => write!(f, "step counts must be non-zero"),
            Self::InvalidGearRatio => write!(f, "gear ratio terms must be non-zero"),
            Self::InvalidPollInterval => write!(f, "enable poll interval must be non-zero"),
            Self::EmptyDeviceName => write!(f, "register names must not be empty"),
            Self::HomeUnreachable => write!(f, "home position is outside the reachable workspace"),
        }
    }
}

impl core::error::Error for ConfigError {}
