//! Hardware configuration types
//!
//! Stepper drive trains behind each joint and the controller register map
//! used by the dispatcher.

use core::f64::consts::TAU;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use stylus_hal::{device_name, DeviceName};

use super::types::ConfigError;

/// Default enable poll interval (ms)
pub const DEFAULT_POLL_INTERVAL_MS: u32 = 100;

/// Default time to wait for the enable bit (ms)
pub const DEFAULT_ENABLE_TIMEOUT_MS: u32 = 60_000;

/// Stepper drive train for one joint
///
/// Steps per output revolution are
/// `full_steps_per_rotation * microsteps * gear_ratio_num / gear_ratio_den`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct JointDriveConfig {
    /// Full steps per motor rotation (typically 200 for 1.8° motors)
    pub full_steps_per_rotation: u16,
    /// Microsteps setting
    pub microsteps: u16,
    /// Gear ratio numerator (e.g., 5 for 5:2)
    pub gear_ratio_num: u8,
    /// Gear ratio denominator (e.g., 2 for 5:2)
    pub gear_ratio_den: u8,
}

impl Default for JointDriveConfig {
    fn default() -> Self {
        Self::shoulder()
    }
}

impl JointDriveConfig {
    /// Create a drive config
    pub const fn new(full_steps: u16, microsteps: u16, num: u8, den: u8) -> Self {
        Self {
            full_steps_per_rotation: full_steps,
            microsteps,
            gear_ratio_num: num,
            gear_ratio_den: den,
        }
    }

    /// Reference shoulder drive: 200 steps, 1/32 microstepping, 2:1 reduction
    pub const fn shoulder() -> Self {
        Self::new(200, 32, 2, 1)
    }

    /// Reference elbow drive: 200 steps, 1/32 microstepping, 2.5:1 reduction
    pub const fn elbow() -> Self {
        Self::new(200, 32, 5, 2)
    }

    /// Microsteps per output shaft revolution
    pub fn steps_per_rotation(&self) -> f64 {
        self.full_steps_per_rotation as f64 * self.microsteps as f64 * self.gear_ratio_num as f64
            / self.gear_ratio_den as f64
    }

    /// Microsteps per radian of joint rotation
    pub fn steps_per_radian(&self) -> f64 {
        self.steps_per_rotation() / TAU
    }

    /// Check for zero terms
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.full_steps_per_rotation == 0 || self.microsteps == 0 {
            return Err(ConfigError::InvalidStepCount);
        }
        if self.gear_ratio_num == 0 || self.gear_ratio_den == 0 {
            return Err(ConfigError::InvalidGearRatio);
        }
        Ok(())
    }
}

/// Controller handshake and register map
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HandshakeConfig {
    /// First register of the four-value position block
    pub position_register: DeviceName,
    /// Bit the controller raises when it is ready for a stream
    pub enable_bit: DeviceName,
    /// Pen/trigger bit
    pub pen_bit: DeviceName,
    /// Enable bit poll period
    pub poll_interval_ms: u32,
    /// Give up waiting for the enable bit after this long (`None` waits forever)
    pub enable_timeout_ms: Option<u32>,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            position_register: device_name("D100").unwrap_or_default(),
            enable_bit: device_name("M3").unwrap_or_default(),
            pen_bit: device_name("M4").unwrap_or_default(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            enable_timeout_ms: Some(DEFAULT_ENABLE_TIMEOUT_MS),
        }
    }
}

impl HandshakeConfig {
    /// Check register names and poll timing
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.position_register.is_empty() || self.enable_bit.is_empty() || self.pen_bit.is_empty()
        {
            return Err(ConfigError::EmptyDeviceName);
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidPollInterval);
        }
        Ok(())
    }
}
