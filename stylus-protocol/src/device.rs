//! Device addressing
//!
//! A device name is a letter code followed by a number, e.g. `D100` or
//! `M4`. Link relays and link registers (`B`, `W`) are numbered in hex;
//! everything else in decimal.

/// Largest device number that fits the 3-byte field
pub const MAX_DEVICE_NUMBER: u32 = 0x00FF_FFFF;

/// Supported device types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceCode {
    /// Data register
    D,
    /// File register
    R,
    /// Link register
    W,
    /// Internal relay
    M,
    /// Latch relay
    L,
    /// Link relay
    B,
}

impl DeviceCode {
    /// Binary device code byte
    pub const fn code(self) -> u8 {
        match self {
            Self::D => 0xA8,
            Self::R => 0xAF,
            Self::W => 0xB4,
            Self::M => 0x90,
            Self::L => 0x92,
            Self::B => 0xA0,
        }
    }

    /// Whether the device holds bits rather than 16-bit words
    pub const fn is_bit(self) -> bool {
        matches!(self, Self::M | Self::L | Self::B)
    }

    /// Radix of the device number
    pub const fn radix(self) -> u32 {
        match self {
            Self::W | Self::B => 16,
            _ => 10,
        }
    }

    /// Device type for a binary code byte
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0xA8 => Some(Self::D),
            0xAF => Some(Self::R),
            0xB4 => Some(Self::W),
            0x90 => Some(Self::M),
            0x92 => Some(Self::L),
            0xA0 => Some(Self::B),
            _ => None,
        }
    }

    fn from_prefix(prefix: char) -> Option<Self> {
        match prefix.to_ascii_uppercase() {
            'D' => Some(Self::D),
            'R' => Some(Self::R),
            'W' => Some(Self::W),
            'M' => Some(Self::M),
            'L' => Some(Self::L),
            'B' => Some(Self::B),
            _ => None,
        }
    }
}

/// Device addressing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceError {
    /// Empty name
    Empty,
    /// Unknown letter code
    UnknownCode,
    /// Missing or malformed number
    InvalidNumber,
    /// Number does not fit in three bytes
    OutOfRange,
}

impl core::fmt::Display for DeviceError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty device name"),
            Self::UnknownCode => write!(f, "unknown device code"),
            Self::InvalidNumber => write!(f, "invalid device number"),
            Self::OutOfRange => write!(f, "device number out of range"),
        }
    }
}

impl core::error::Error for DeviceError {}

/// A device head address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Device {
    pub code: DeviceCode,
    pub number: u32,
}

impl Device {
    /// Create a device address
    pub fn new(code: DeviceCode, number: u32) -> Result<Self, DeviceError> {
        if number > MAX_DEVICE_NUMBER {
            return Err(DeviceError::OutOfRange);
        }
        Ok(Self { code, number })
    }

    /// Parse a name such as `D100`, `M3` or `W1A`
    pub fn parse(name: &str) -> Result<Self, DeviceError> {
        let name = name.trim();
        let mut chars = name.chars();
        let prefix = chars.next().ok_or(DeviceError::Empty)?;
        let code = DeviceCode::from_prefix(prefix).ok_or(DeviceError::UnknownCode)?;

        let digits = chars.as_str();
        if digits.is_empty() {
            return Err(DeviceError::InvalidNumber);
        }
        let number =
            u32::from_str_radix(digits, code.radix()).map_err(|_| DeviceError::InvalidNumber)?;
        Self::new(code, number)
    }

    /// Device number as the 3-byte little-endian field
    pub fn number_bytes(&self) -> [u8; 3] {
        let b = self.number.to_le_bytes();
        [b[0], b[1], b[2]]
    }
}
