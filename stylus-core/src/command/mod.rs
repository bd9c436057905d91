//! Motor command synthesis
//!
//! Converts the Cartesian sample sequence into per-tick joint step commands,
//! and back again for offline checks of a finished table.

pub mod replay;
pub mod synth;
pub mod table;

pub use replay::{drawn_extent, extent, reconstruct, PathExtent};
pub use synth::{CommandSynthesizer, StepSeed, SynthStep, STEP_SIGN};
pub use table::{CommandTable, MotorCommand, TABLE_COLUMNS};

#[cfg(feature = "serde")]
pub use table::TableError;
