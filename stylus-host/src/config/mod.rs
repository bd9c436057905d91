//! Plotter configuration file
//!
//! One TOML file carries the robot parameters, the controller address and
//! the drawing itself. A default file is embedded at build time.

pub mod loader;

pub use loader::{
    load, load_file, parse, parse_for, LinkConfig, OutputConfig, PlotterFile, Purpose,
    EMBEDDED_CONFIG,
};
