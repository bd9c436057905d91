//! Command table
//!
//! The table is the artifact handed from the offline pipeline to the
//! dispatcher. It can be persisted with postcard and replayed later.

use alloc::vec::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::motion::PenState;

/// Magic number identifying a serialized command table
pub const TABLE_MAGIC: u32 = 0x5354_594C; // "STYL"

/// Current serialized table version
pub const TABLE_VERSION: u8 = 1;

/// Column names of one command row, in field order
pub const TABLE_COLUMNS: [&str; 10] = [
    "Time", "J1_Pos", "J1_Dir", "J1_Delta", "J1_Hz", "J2_Pos", "J2_Dir", "J2_Delta", "J2_Hz",
    "Pen",
];

/// Step command for one tick
///
/// Positions are absolute steps relative to home. Direction, delta and
/// frequency are taken against the previous row.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MotorCommand {
    /// Playback time (s)
    pub t: f64,
    pub j1_pos: i64,
    /// `true` when the step delta is non-negative
    pub j1_dir: bool,
    pub j1_delta: u64,
    pub j1_hz: f64,
    pub j2_pos: i64,
    pub j2_dir: bool,
    pub j2_delta: u64,
    pub j2_hz: f64,
    pub pen: PenState,
}

impl MotorCommand {
    /// Values written to the controller's position block
    ///
    /// `[j1_pos, j1_hz, j2_pos, j2_hz]`, frequencies truncated toward zero.
    pub fn position_block(&self) -> [i64; 4] {
        [
            self.j1_pos,
            self.j1_hz as i64,
            self.j2_pos,
            self.j2_hz as i64,
        ]
    }
}

/// Ordered command rows at a fixed tick
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CommandTable {
    magic: u32,
    version: u8,
    tick_s: f64,
    rows: Vec<MotorCommand>,
    unreachable_samples: usize,
    singular_samples: usize,
}

impl CommandTable {
    /// Assemble a table from synthesized rows
    pub fn from_rows(
        tick_s: f64,
        rows: Vec<MotorCommand>,
        unreachable_samples: usize,
        singular_samples: usize,
    ) -> Self {
        Self {
            magic: TABLE_MAGIC,
            version: TABLE_VERSION,
            tick_s,
            rows,
            unreachable_samples,
            singular_samples,
        }
    }

    /// Check magic and version
    pub fn is_valid(&self) -> bool {
        self.magic == TABLE_MAGIC && self.version == TABLE_VERSION
    }

    pub fn rows(&self) -> &[MotorCommand] {
        &self.rows
    }

    pub fn get(&self, index: usize) -> Option<&MotorCommand> {
        self.rows.get(index)
    }

    pub fn iter(&self) -> core::slice::Iter<'_, MotorCommand> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Command period (s)
    pub fn tick_s(&self) -> f64 {
        self.tick_s
    }

    /// Playback time of the last row
    pub fn duration_s(&self) -> f64 {
        self.rows.last().map(|r| r.t).unwrap_or(0.0)
    }

    /// Samples whose target was outside the workspace
    pub fn unreachable_samples(&self) -> usize {
        self.unreachable_samples
    }

    /// Samples whose pose was near a singularity
    pub fn singular_samples(&self) -> usize {
        self.singular_samples
    }

    /// Number of pen state changes, counting from pen-up
    pub fn pen_changes(&self) -> usize {
        self.rows
            .iter()
            .scan(PenState::Up, |last, row| {
                let changed = row.pen != *last;
                *last = row.pen;
                Some(changed)
            })
            .filter(|&changed| changed)
            .count()
    }
}

impl<'a> IntoIterator for &'a CommandTable {
    type Item = &'a MotorCommand;
    type IntoIter = core::slice::Iter<'a, MotorCommand>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Table persistence errors
#[cfg(feature = "serde")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TableError {
    /// Serialization failed
    Serialize,
    /// Deserialization failed
    Deserialize,
    /// Invalid magic or version
    InvalidFormat,
}

#[cfg(feature = "serde")]
impl core::fmt::Display for TableError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Serialize => write!(f, "failed to encode command table"),
            Self::Deserialize => write!(f, "failed to decode command table"),
            Self::InvalidFormat => write!(f, "not a command table or unsupported version"),
        }
    }
}

#[cfg(feature = "serde")]
impl core::error::Error for TableError {}

#[cfg(feature = "serde")]
impl CommandTable {
    /// Encode with postcard
    pub fn to_bytes(&self) -> Result<Vec<u8>, TableError> {
        postcard::to_allocvec(self).map_err(|_| TableError::Serialize)
    }

    /// Decode with postcard, checking magic and version
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TableError> {
        let table: Self = postcard::from_bytes(bytes).map_err(|_| TableError::Deserialize)?;
        if !table.is_valid() {
            return Err(TableError::InvalidFormat);
        }
        Ok(table)
    }
}
