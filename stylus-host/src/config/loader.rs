//! Configuration loading
//!
//! Loads the plotter configuration from a TOML file. Falls back to the
//! embedded default if no path is given.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info};
use serde::Deserialize;
use stylus_core::config::RobotConfig;
use stylus_core::trajectory::Waypoint;

use crate::error::HostError;

/// Default configuration compiled into the binary
pub const EMBEDDED_CONFIG: &str = include_str!("../../plotter.toml");

/// Controller network address
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    pub host: String,
    pub port: u16,
    /// Socket read/write timeout
    pub timeout_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            host: "192.168.3.39".to_string(),
            port: 4999,
            timeout_ms: 2000,
        }
    }
}

impl LinkConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Where the command table is written
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Postcard-encoded table, relative to the config file
    pub table: Option<PathBuf>,
}

/// Parsed plotter.toml
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct PlotterFile {
    pub robot: RobotConfig,
    pub link: LinkConfig,
    pub output: OutputConfig,
    #[serde(rename = "waypoint")]
    pub waypoints: Vec<Waypoint>,
}

/// What the loaded configuration will be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    /// Plan a drawing from the file's waypoints
    Plan,
    /// Stream a saved table; waypoints are not needed
    Replay,
}

/// Parse and validate configuration text for planning
pub fn parse(text: &str) -> Result<PlotterFile, HostError> {
    parse_for(text, Purpose::Plan)
}

/// Parse and validate configuration text
///
/// TOML has no null, so `enable_timeout_ms = 0` means wait forever.
pub fn parse_for(text: &str, purpose: Purpose) -> Result<PlotterFile, HostError> {
    let mut file: PlotterFile = toml::from_str(text)?;
    if file.robot.handshake.enable_timeout_ms == Some(0) {
        file.robot.handshake.enable_timeout_ms = None;
    }
    file.robot.validate()?;
    if purpose == Purpose::Plan && file.waypoints.is_empty() {
        return Err(HostError::NoWaypoints);
    }
    log_config_summary(&file);
    Ok(file)
}

/// Load a configuration file
///
/// A relative output table path is resolved against the file's directory.
pub fn load_file(path: &Path, purpose: Purpose) -> Result<PlotterFile, HostError> {
    info!("Loading configuration from {}", path.display());
    let text = fs::read_to_string(path).map_err(|source| HostError::File {
        path: path.to_path_buf(),
        source,
    })?;
    let mut file = parse_for(&text, purpose)?;

    if let (Some(table), Some(dir)) = (&file.output.table, path.parent()) {
        if table.is_relative() {
            file.output.table = Some(dir.join(table));
        }
    }
    Ok(file)
}

/// Load `path`, or the embedded configuration when `None`
pub fn load(path: Option<&Path>, purpose: Purpose) -> Result<PlotterFile, HostError> {
    match path {
        Some(path) => load_file(path, purpose),
        None => {
            info!("Using embedded configuration");
            parse_for(EMBEDDED_CONFIG, purpose)
        }
    }
}

/// Log a summary of the loaded configuration
fn log_config_summary(file: &PlotterFile) {
    let robot = &file.robot;
    info!("Configuration loaded successfully");
    debug!(
        "  arm l1={} mm l2={} mm, tick {} ms",
        robot.arm.l1_mm, robot.arm.l2_mm, robot.motion.tick_ms
    );
    debug!(
        "  joint1 {:.1} steps/rad, joint2 {:.1} steps/rad",
        robot.joint1.steps_per_radian(),
        robot.joint2.steps_per_radian()
    );
    debug!("  controller at {}", file.link.address());
    debug!("  {} waypoints", file.waypoints.len());
}
