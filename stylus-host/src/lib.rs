//! Stylus host
//!
//! Runs the plotter pipeline on a workstation:
//!
//! ```text
//! plotter.toml ─► precision check ─► trajectory ─► command table ─► .stylus
//!                                                        │
//!                                                        ▼
//!                                  McLink (MC protocol over TCP) ─► controller
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod link;
pub mod pipeline;

pub use clock::StdClock;
pub use config::PlotterFile;
pub use error::{HostError, LinkError};
pub use link::McLink;
