//! Batch read/write requests and data packing
//!
//! Word data is sent as little-endian 16-bit values. A signed 32-bit value
//! occupies two consecutive words, low word first. Bit data packs two
//! points per byte, high nibble first.

use heapless::Vec;

use crate::device::Device;
use crate::frame::{FrameError, MAX_BODY_SIZE};

/// Maximum word points in one request
pub const MAX_WORD_POINTS: usize = 96;

/// Maximum bit points in one request
pub const MAX_BIT_POINTS: usize = 2 * MAX_WORD_POINTS;

/// Batch read command
pub const CMD_BATCH_READ: u16 = 0x0401;

/// Batch write command
pub const CMD_BATCH_WRITE: u16 = 0x1401;

/// Subcommand: word units
pub const SUBCMD_WORD: u16 = 0x0000;

/// Subcommand: bit units
pub const SUBCMD_BIT: u16 = 0x0001;

/// A batch access request
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Request {
    /// Read consecutive words
    ReadWords { device: Device, points: u16 },
    /// Read consecutive bits
    ReadBits { device: Device, points: u16 },
    /// Write consecutive words
    WriteWords {
        device: Device,
        words: Vec<u16, MAX_WORD_POINTS>,
    },
    /// Write consecutive bits
    WriteBits {
        device: Device,
        bits: Vec<bool, MAX_BIT_POINTS>,
    },
}

fn check_points(points: usize, max: usize) -> Result<u16, FrameError> {
    if points == 0 {
        return Err(FrameError::NoPoints);
    }
    if points > max {
        return Err(FrameError::TooManyPoints);
    }
    Ok(points as u16)
}

fn require_bit_device(device: &Device) -> Result<(), FrameError> {
    if device.code.is_bit() {
        Ok(())
    } else {
        Err(FrameError::NotBitDevice)
    }
}

impl Request {
    /// Read `points` words starting at `device`
    pub fn read_words(device: Device, points: usize) -> Result<Self, FrameError> {
        let points = check_points(points, MAX_WORD_POINTS)?;
        Ok(Self::ReadWords { device, points })
    }

    /// Read `points` bits starting at `device`
    pub fn read_bits(device: Device, points: usize) -> Result<Self, FrameError> {
        require_bit_device(&device)?;
        let points = check_points(points, MAX_BIT_POINTS)?;
        Ok(Self::ReadBits { device, points })
    }

    /// Write `words` starting at `device`
    pub fn write_words(device: Device, words: &[u16]) -> Result<Self, FrameError> {
        check_points(words.len(), MAX_WORD_POINTS)?;
        let mut buf = Vec::new();
        buf.extend_from_slice(words)
            .map_err(|_| FrameError::TooManyPoints)?;
        Ok(Self::WriteWords { device, words: buf })
    }

    /// Write signed 32-bit values as word pairs starting at `device`
    pub fn write_dwords(device: Device, values: &[i32]) -> Result<Self, FrameError> {
        check_points(values.len() * 2, MAX_WORD_POINTS)?;
        let mut words = Vec::new();
        dwords_to_words(values, &mut words)?;
        Ok(Self::WriteWords { device, words })
    }

    /// Write `bits` starting at `device`
    pub fn write_bits(device: Device, bits: &[bool]) -> Result<Self, FrameError> {
        require_bit_device(&device)?;
        check_points(bits.len(), MAX_BIT_POINTS)?;
        let mut buf = Vec::new();
        buf.extend_from_slice(bits)
            .map_err(|_| FrameError::TooManyPoints)?;
        Ok(Self::WriteBits { device, bits: buf })
    }

    /// Head device
    pub fn device(&self) -> Device {
        match self {
            Self::ReadWords { device, .. }
            | Self::ReadBits { device, .. }
            | Self::WriteWords { device, .. }
            | Self::WriteBits { device, .. } => *device,
        }
    }

    /// Number of device points accessed
    pub fn points(&self) -> u16 {
        match self {
            Self::ReadWords { points, .. } | Self::ReadBits { points, .. } => *points,
            Self::WriteWords { words, .. } => words.len() as u16,
            Self::WriteBits { bits, .. } => bits.len() as u16,
        }
    }

    pub fn command(&self) -> u16 {
        match self {
            Self::ReadWords { .. } | Self::ReadBits { .. } => CMD_BATCH_READ,
            Self::WriteWords { .. } | Self::WriteBits { .. } => CMD_BATCH_WRITE,
        }
    }

    pub fn subcommand(&self) -> u16 {
        match self {
            Self::ReadWords { .. } | Self::WriteWords { .. } => SUBCMD_WORD,
            Self::ReadBits { .. } | Self::WriteBits { .. } => SUBCMD_BIT,
        }
    }

    /// Number of response data bytes a successful reply carries
    pub fn response_data_len(&self) -> usize {
        match self {
            Self::ReadWords { points, .. } => 2 * *points as usize,
            Self::ReadBits { points, .. } => (*points as usize).div_ceil(2),
            Self::WriteWords { .. } | Self::WriteBits { .. } => 0,
        }
    }

    /// Append command, subcommand, device address and data
    pub fn encode_body(&self, out: &mut Vec<u8, MAX_BODY_SIZE>) -> Result<(), FrameError> {
        let device = self.device();
        let push = |out: &mut Vec<u8, MAX_BODY_SIZE>, bytes: &[u8]| {
            out.extend_from_slice(bytes)
                .map_err(|_| FrameError::BufferTooSmall)
        };

        push(out, &self.command().to_le_bytes())?;
        push(out, &self.subcommand().to_le_bytes())?;
        push(out, &device.number_bytes())?;
        push(out, &[device.code.code()])?;
        push(out, &self.points().to_le_bytes())?;

        match self {
            Self::WriteWords { words, .. } => {
                for w in words {
                    push(out, &w.to_le_bytes())?;
                }
            }
            Self::WriteBits { bits, .. } => {
                for pair in bits.chunks(2) {
                    let hi = (pair[0] as u8) << 4;
                    let lo = pair.get(1).map(|&b| b as u8).unwrap_or(0);
                    push(out, &[hi | lo])?;
                }
            }
            Self::ReadWords { .. } | Self::ReadBits { .. } => {}
        }
        Ok(())
    }
}

/// Split signed 32-bit values into words, low word first
pub fn dwords_to_words<const N: usize>(
    values: &[i32],
    out: &mut Vec<u16, N>,
) -> Result<(), FrameError> {
    for v in values {
        let raw = *v as u32;
        out.push(raw as u16).map_err(|_| FrameError::TooManyPoints)?;
        out.push((raw >> 16) as u16)
            .map_err(|_| FrameError::TooManyPoints)?;
    }
    Ok(())
}

/// Join word pairs (low word first) into signed 32-bit values
///
/// A trailing odd word is ignored.
pub fn words_to_dwords(words: &[u16]) -> impl Iterator<Item = i32> + '_ {
    words
        .chunks_exact(2)
        .map(|pair| (pair[0] as u32 | (pair[1] as u32) << 16) as i32)
}

/// Unpack `points` bits from nibble-packed response data
pub fn unpack_bits(data: &[u8], points: usize) -> impl Iterator<Item = bool> + '_ {
    (0..points).map(move |i| {
        let byte = data.get(i / 2).copied().unwrap_or(0);
        let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0F };
        nibble != 0
    })
}

/// Little-endian words from response data
///
/// A trailing odd byte is ignored.
pub fn le_words(data: &[u8]) -> impl Iterator<Item = u16> + '_ {
    data.chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceCode;
    use proptest::prelude::*;

    fn d100() -> Device {
        Device::parse("D100").unwrap()
    }

    #[test]
    fn test_dword_split_low_word_first() {
        let mut words: Vec<u16, 8> = Vec::new();
        dwords_to_words(&[-2, 0x0001_0002], &mut words).unwrap();
        assert_eq!(&words[..], &[0xFFFE, 0xFFFF, 0x0002, 0x0001]);
    }

    #[test]
    fn test_bit_packing_high_nibble_first() {
        let req = Request::write_bits(Device::parse("M4").unwrap(), &[true, false, true]).unwrap();
        let mut body = Vec::new();
        req.encode_body(&mut body).unwrap();
        // cmd, subcmd, devno, code, points, data
        assert_eq!(
            &body[..],
            &[0x01, 0x14, 0x01, 0x00, 0x04, 0x00, 0x00, 0x90, 0x03, 0x00, 0x10, 0x10]
        );
    }

    #[test]
    fn test_write_dwords_body() {
        let req = Request::write_dwords(d100(), &[1, -1]).unwrap();
        assert_eq!(req.points(), 4);
        let mut body = Vec::new();
        req.encode_body(&mut body).unwrap();
        assert_eq!(&body[..7], &[0x01, 0x14, 0x00, 0x00, 0x64, 0x00, 0x00]);
        assert_eq!(body[7], DeviceCode::D.code());
        assert_eq!(&body[8..10], &[0x04, 0x00]);
        assert_eq!(
            &body[10..],
            &[0x01, 0x00, 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn test_read_words_body() {
        let req = Request::read_words(d100(), 8).unwrap();
        let mut body = Vec::new();
        req.encode_body(&mut body).unwrap();
        assert_eq!(
            &body[..],
            &[0x01, 0x04, 0x00, 0x00, 0x64, 0x00, 0x00, 0xA8, 0x08, 0x00]
        );
        assert_eq!(req.response_data_len(), 16);
    }

    #[test]
    fn test_point_limits() {
        assert_eq!(Request::read_words(d100(), 0), Err(FrameError::NoPoints));
        assert_eq!(
            Request::read_words(d100(), MAX_WORD_POINTS + 1),
            Err(FrameError::TooManyPoints)
        );
        let too_many = [0i32; MAX_WORD_POINTS / 2 + 1];
        assert_eq!(
            Request::write_dwords(d100(), &too_many),
            Err(FrameError::TooManyPoints)
        );
    }

    #[test]
    fn test_bit_access_requires_bit_device() {
        assert_eq!(Request::read_bits(d100(), 1), Err(FrameError::NotBitDevice));
        assert_eq!(
            Request::write_bits(d100(), &[true]),
            Err(FrameError::NotBitDevice)
        );
    }

    #[test]
    fn test_unpack_bits() {
        let bits: heapless::Vec<bool, 4> = unpack_bits(&[0x10, 0x01], 4).collect();
        assert_eq!(&bits[..], &[true, false, false, true]);
        let odd: heapless::Vec<bool, 3> = unpack_bits(&[0x11, 0x10], 3).collect();
        assert_eq!(&odd[..], &[true, true, true]);
    }

    proptest! {
        #[test]
        fn prop_dword_words_preserve_value(v in any::<i32>()) {
            let mut words: Vec<u16, 2> = Vec::new();
            dwords_to_words(&[v], &mut words).unwrap();
            let back: heapless::Vec<i32, 1> = words_to_dwords(&words).collect();
            prop_assert_eq!(back[0], v);
        }
    }
}
