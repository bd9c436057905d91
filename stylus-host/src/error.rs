//! Host error types

use std::io;
use std::path::PathBuf;

use stylus_core::command::TableError;
use stylus_core::config::ConfigError;
use stylus_core::dispatch::DispatchFailure;
use stylus_core::trajectory::TrajectoryError;
use stylus_protocol::{DeviceError, FrameError};
use thiserror::Error;

/// Controller link errors
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("socket error: {0}")]
    Io(#[from] io::Error),

    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("bad device name '{name}': {source}")]
    Device { name: String, source: DeviceError },

    #[error("value {0} does not fit a 32-bit register pair")]
    ValueOutOfRange(i64),

    #[error("controller returned {got} data bytes, expected {expected}")]
    ShortResponse { expected: usize, got: usize },
}

/// Top-level host errors
#[derive(Debug, Error)]
pub enum HostError {
    #[error("cannot access {path}: {source}")]
    File { path: PathBuf, source: io::Error },

    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid robot config: {0}")]
    Config(#[from] ConfigError),

    #[error("config has no waypoints")]
    NoWaypoints,

    #[error("trajectory rejected: {0}")]
    Trajectory(#[from] TrajectoryError),

    #[error("command table: {0}")]
    Table(#[from] TableError),

    #[error("cannot connect to controller: {0}")]
    Link(#[from] LinkError),

    #[error("dispatch failed: {0}")]
    Dispatch(DispatchFailure<LinkError>),

    #[error("cannot install Ctrl-C handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

impl From<DispatchFailure<LinkError>> for HostError {
    fn from(failure: DispatchFailure<LinkError>) -> Self {
        Self::Dispatch(failure)
    }
}
