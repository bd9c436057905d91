//! Board-agnostic core logic for the SCARA plotter
//!
//! This crate contains everything between a list of waypoints and the
//! registers on the motion controller, none of which depends on a specific
//! transport or operating system:
//!
//! - Arm geometry, inverse/forward kinematics and singularity checks
//! - Motion profiling (quintic travel, linear draw, pen dwells)
//! - Trajectory assembly at a fixed tick
//! - Step command synthesis relative to the home pose
//! - Dispatcher state machine and the paced command streamer
//! - Configuration type definitions

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

pub mod command;
pub mod config;
pub mod dispatch;
pub mod kinematics;
pub mod motion;
pub mod trajectory;
