//! Frame encoding and decoding for MC protocol 3E binary frames.
//!
//! Frame format (both directions):
//! - SUBHEADER (2 bytes): `50 00` request, `D0 00` response
//! - ROUTE (5 bytes): network, PC, module I/O (LE), station
//! - LENGTH (2 bytes, LE): number of body bytes that follow
//! - BODY: monitoring timer + request, or end code + response data

use heapless::Vec;

use crate::device::{Device, DeviceCode};
use crate::messages::{
    unpack_bits, Request, CMD_BATCH_READ, CMD_BATCH_WRITE, MAX_BIT_POINTS, MAX_WORD_POINTS,
    SUBCMD_BIT, SUBCMD_WORD,
};

/// Request subheader
pub const REQUEST_SUBHEADER: [u8; 2] = [0x50, 0x00];

/// Response subheader
pub const RESPONSE_SUBHEADER: [u8; 2] = [0xD0, 0x00];

/// Subheader, route and length
pub const HEADER_SIZE: usize = 9;

/// Monitoring timer in 250 ms units
pub const DEFAULT_MONITORING_TIMER: u16 = 0x0010;

/// Maximum data bytes carried by one frame
pub const MAX_DATA_SIZE: usize = 2 * MAX_WORD_POINTS;

/// Timer, command, subcommand, device number, device code and point count
const REQUEST_FIXED_SIZE: usize = 2 + 2 + 2 + 3 + 1 + 2;

/// Maximum body size
pub const MAX_BODY_SIZE: usize = REQUEST_FIXED_SIZE + MAX_DATA_SIZE;

/// Maximum complete frame size
pub const MAX_FRAME_SIZE: usize = HEADER_SIZE + MAX_BODY_SIZE;

/// Errors that can occur during frame parsing or encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Request accesses zero points
    NoPoints,
    /// Request exceeds the per-frame point limit
    TooManyPoints,
    /// Bit access to a word device
    NotBitDevice,
    /// Buffer too small for encoding
    BufferTooSmall,
    /// Subheader does not match the expected direction
    InvalidSubheader,
    /// Length field is inconsistent with the frame
    InvalidLength,
    /// Unknown command, subcommand or device code
    Unsupported,
    /// Controller answered with a non-zero end code
    EndCode(u16),
}

impl core::fmt::Display for FrameError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NoPoints => write!(f, "request accesses no points"),
            Self::TooManyPoints => write!(f, "too many points for one frame"),
            Self::NotBitDevice => write!(f, "bit access to a word device"),
            Self::BufferTooSmall => write!(f, "buffer too small"),
            Self::InvalidSubheader => write!(f, "unexpected subheader"),
            Self::InvalidLength => write!(f, "inconsistent frame length"),
            Self::Unsupported => write!(f, "unsupported command or device"),
            Self::EndCode(code) => write!(f, "controller end code 0x{:04X}", code),
        }
    }
}

impl core::error::Error for FrameError {}

/// Access route to the target station
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Route {
    pub network: u8,
    pub pc: u8,
    pub module_io: u16,
    pub station: u8,
}

impl Default for Route {
    /// Own station, directly connected
    fn default() -> Self {
        Self {
            network: 0x00,
            pc: 0xFF,
            module_io: 0x03FF,
            station: 0x00,
        }
    }
}

/// A parsed or constructed frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub subheader: [u8; 2],
    pub route: Route,
    /// Everything after the length field
    pub body: Vec<u8, MAX_BODY_SIZE>,
}

fn extend<const N: usize>(buf: &mut Vec<u8, N>, bytes: &[u8]) -> Result<(), FrameError> {
    buf.extend_from_slice(bytes)
        .map_err(|_| FrameError::BufferTooSmall)
}

impl Frame {
    /// Build a request frame
    pub fn request(route: Route, timer: u16, request: &Request) -> Result<Self, FrameError> {
        let mut body = Vec::new();
        extend(&mut body, &timer.to_le_bytes())?;
        request.encode_body(&mut body)?;
        Ok(Self {
            subheader: REQUEST_SUBHEADER,
            route,
            body,
        })
    }

    /// Build a response frame
    pub fn response(route: Route, end_code: u16, data: &[u8]) -> Result<Self, FrameError> {
        let mut body = Vec::new();
        extend(&mut body, &end_code.to_le_bytes())?;
        extend(&mut body, data)?;
        Ok(Self {
            subheader: RESPONSE_SUBHEADER,
            route,
            body,
        })
    }

    /// Encode this frame into a byte buffer
    ///
    /// Returns the number of bytes written
    pub fn encode(&self, buffer: &mut [u8]) -> Result<usize, FrameError> {
        let frame_len = HEADER_SIZE + self.body.len();
        if buffer.len() < frame_len {
            return Err(FrameError::BufferTooSmall);
        }

        let io = self.route.module_io.to_le_bytes();
        let len = (self.body.len() as u16).to_le_bytes();
        buffer[..HEADER_SIZE].copy_from_slice(&[
            self.subheader[0],
            self.subheader[1],
            self.route.network,
            self.route.pc,
            io[0],
            io[1],
            self.route.station,
            len[0],
            len[1],
        ]);
        buffer[HEADER_SIZE..frame_len].copy_from_slice(&self.body);

        Ok(frame_len)
    }

    /// Encode this frame into a heapless Vec
    pub fn encode_to_vec(&self) -> Result<Vec<u8, MAX_FRAME_SIZE>, FrameError> {
        let mut buffer = [0u8; MAX_FRAME_SIZE];
        let len = self.encode(&mut buffer)?;
        let mut vec = Vec::new();
        extend(&mut vec, &buffer[..len])?;
        Ok(vec)
    }

    /// Interpret this frame as a controller response
    pub fn into_response(self) -> Result<Response, FrameError> {
        if self.subheader != RESPONSE_SUBHEADER {
            return Err(FrameError::InvalidSubheader);
        }
        if self.body.len() < 2 {
            return Err(FrameError::InvalidLength);
        }
        let end_code = u16::from_le_bytes([self.body[0], self.body[1]]);
        let mut data = Vec::new();
        extend(&mut data, &self.body[2..])?;
        Ok(Response { end_code, data })
    }

    /// Interpret this frame as a request, returning the monitoring timer too
    pub fn decode_request(&self) -> Result<(u16, Request), FrameError> {
        if self.subheader != REQUEST_SUBHEADER {
            return Err(FrameError::InvalidSubheader);
        }
        let b = &self.body;
        if b.len() < REQUEST_FIXED_SIZE {
            return Err(FrameError::InvalidLength);
        }

        let word = |i: usize| u16::from_le_bytes([b[i], b[i + 1]]);
        let timer = word(0);
        let command = word(2);
        let subcommand = word(4);
        let number = u32::from_le_bytes([b[6], b[7], b[8], 0]);
        let code = DeviceCode::from_code(b[9]).ok_or(FrameError::Unsupported)?;
        let device = Device::new(code, number).map_err(|_| FrameError::Unsupported)?;
        let points = word(10) as usize;
        let data = &b[REQUEST_FIXED_SIZE..];

        let request = match (command, subcommand) {
            (CMD_BATCH_READ, SUBCMD_WORD) => Request::read_words(device, points)?,
            (CMD_BATCH_READ, SUBCMD_BIT) => Request::read_bits(device, points)?,
            (CMD_BATCH_WRITE, SUBCMD_WORD) => {
                if data.len() != 2 * points {
                    return Err(FrameError::InvalidLength);
                }
                let mut words: Vec<u16, MAX_WORD_POINTS> = Vec::new();
                for pair in data.chunks_exact(2) {
                    words
                        .push(u16::from_le_bytes([pair[0], pair[1]]))
                        .map_err(|_| FrameError::TooManyPoints)?;
                }
                Request::write_words(device, &words)?
            }
            (CMD_BATCH_WRITE, SUBCMD_BIT) => {
                if data.len() != points.div_ceil(2) {
                    return Err(FrameError::InvalidLength);
                }
                let mut bits: Vec<bool, MAX_BIT_POINTS> = Vec::new();
                for bit in unpack_bits(data, points) {
                    bits.push(bit).map_err(|_| FrameError::TooManyPoints)?;
                }
                Request::write_bits(device, &bits)?
            }
            _ => return Err(FrameError::Unsupported),
        };
        Ok((timer, request))
    }
}

/// Encode a request with the default route and monitoring timer
pub fn encode_request(request: &Request) -> Result<Vec<u8, MAX_FRAME_SIZE>, FrameError> {
    Frame::request(Route::default(), DEFAULT_MONITORING_TIMER, request)?.encode_to_vec()
}

/// A controller response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub end_code: u16,
    /// Read data, or error information when `end_code` is non-zero
    pub data: Vec<u8, MAX_BODY_SIZE>,
}

impl Response {
    /// Fail on a non-zero end code
    pub fn check(self) -> Result<Self, FrameError> {
        if self.end_code != 0 {
            return Err(FrameError::EndCode(self.end_code));
        }
        Ok(self)
    }
}

/// State machine for parsing incoming frames
#[derive(Debug, Clone)]
pub struct FrameParser {
    expected: [u8; 2],
    state: ParseState,
    header: Vec<u8, HEADER_SIZE>,
    body: Vec<u8, MAX_BODY_SIZE>,
    body_len: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    /// Collecting subheader, route and length
    ReadingHeader,
    /// Collecting `body_len` body bytes
    ReadingBody,
}

impl FrameParser {
    fn new(expected: [u8; 2]) -> Self {
        Self {
            expected,
            state: ParseState::ReadingHeader,
            header: Vec::new(),
            body: Vec::new(),
            body_len: 0,
        }
    }

    /// Parser for frames sent by the controller
    pub fn for_responses() -> Self {
        Self::new(RESPONSE_SUBHEADER)
    }

    /// Parser for frames sent to the controller
    pub fn for_requests() -> Self {
        Self::new(REQUEST_SUBHEADER)
    }

    /// Reset the parser state
    pub fn reset(&mut self) {
        self.state = ParseState::ReadingHeader;
        self.header.clear();
        self.body.clear();
        self.body_len = 0;
    }

    /// Feed a single byte to the parser
    ///
    /// Returns `Ok(Some(frame))` when a complete frame is parsed,
    /// `Ok(None)` when more bytes are needed, or `Err` on parse error.
    pub fn feed(&mut self, byte: u8) -> Result<Option<Frame>, FrameError> {
        match self.state {
            ParseState::ReadingHeader => {
                // Cannot overflow: the header is consumed as soon as it is full
                let _ = self.header.push(byte);
                if self.header.len() == 2 && self.header[..2] != self.expected {
                    self.reset();
                    return Err(FrameError::InvalidSubheader);
                }
                if self.header.len() < HEADER_SIZE {
                    return Ok(None);
                }

                let len = u16::from_le_bytes([self.header[7], self.header[8]]) as usize;
                if len > MAX_BODY_SIZE {
                    self.reset();
                    return Err(FrameError::InvalidLength);
                }
                self.body_len = len;
                self.state = ParseState::ReadingBody;
                if len == 0 {
                    return Ok(Some(self.finish()));
                }
                Ok(None)
            }
            ParseState::ReadingBody => {
                let _ = self.body.push(byte);
                if self.body.len() == self.body_len {
                    return Ok(Some(self.finish()));
                }
                Ok(None)
            }
        }
    }

    /// Feed multiple bytes to the parser
    ///
    /// Returns the first complete frame found, if any.
    /// Remaining bytes after a complete frame are not consumed.
    pub fn feed_bytes(&mut self, bytes: &[u8]) -> Result<Option<Frame>, FrameError> {
        for &byte in bytes {
            if let Some(frame) = self.feed(byte)? {
                return Ok(Some(frame));
            }
        }
        Ok(None)
    }

    /// Bytes still needed to complete the current frame
    pub fn remaining(&self) -> usize {
        match self.state {
            ParseState::ReadingHeader => HEADER_SIZE - self.header.len(),
            ParseState::ReadingBody => self.body_len - self.body.len(),
        }
    }

    fn finish(&mut self) -> Frame {
        let h = &self.header;
        let frame = Frame {
            subheader: [h[0], h[1]],
            route: Route {
                network: h[2],
                pc: h[3],
                module_io: u16::from_le_bytes([h[4], h[5]]),
                station: h[6],
            },
            body: self.body.clone(),
        };
        self.reset();
        frame
    }
}
