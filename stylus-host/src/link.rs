//! TCP register link to the motion controller
//!
//! Every call is one request frame followed by one response frame. There is
//! no pipelining and no retry; a failed exchange leaves the link unusable for
//! the rest of the run.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};

use log::{debug, trace};
use stylus_hal::RegisterLink;
use stylus_protocol::{
    le_words, unpack_bits, words_to_dwords, Device, Frame, FrameParser, Request, Response, Route,
    DEFAULT_MONITORING_TIMER, MAX_FRAME_SIZE,
};

use crate::config::LinkConfig;
use crate::error::LinkError;

/// MC protocol client over any byte stream
pub struct McLink<S> {
    stream: S,
    route: Route,
    parser: FrameParser,
}

impl McLink<TcpStream> {
    /// Connect to the controller
    pub fn connect(config: &LinkConfig) -> Result<Self, LinkError> {
        let address = config.address();
        let timeout = config.timeout();
        debug!("Connecting to {}", address);

        let mut last_err = None;
        for addr in address.to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(timeout))?;
                    stream.set_write_timeout(Some(timeout))?;
                    stream.set_nodelay(true)?;
                    debug!("Connected to {}", addr);
                    return Ok(Self::new(stream));
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err
            .unwrap_or_else(|| std::io::Error::other(format!("{} did not resolve", address)))
            .into())
    }
}

impl<S: Read + Write> McLink<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            route: Route::default(),
            parser: FrameParser::for_responses(),
        }
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Send one request and wait for its response
    fn exchange(&mut self, request: &Request) -> Result<Response, LinkError> {
        let frame = Frame::request(self.route, DEFAULT_MONITORING_TIMER, request)?;
        let bytes = frame.encode_to_vec()?;
        trace!("-> {:02X?}", &bytes[..]);
        self.stream.write_all(&bytes)?;

        self.parser.reset();
        let mut buffer = [0u8; MAX_FRAME_SIZE];
        let response = loop {
            let want = self.parser.remaining();
            self.stream.read_exact(&mut buffer[..want])?;
            if let Some(frame) = self.parser.feed_bytes(&buffer[..want])? {
                break frame.into_response()?.check()?;
            }
        };
        trace!("<- end code 0x{:04X}, {} bytes", response.end_code, response.data.len());

        let expected = request.response_data_len();
        if response.data.len() < expected {
            return Err(LinkError::ShortResponse {
                expected,
                got: response.data.len(),
            });
        }
        Ok(response)
    }
}

fn parse_device(name: &str) -> Result<Device, LinkError> {
    Device::parse(name).map_err(|source| LinkError::Device {
        name: name.to_string(),
        source,
    })
}

impl<S: Read + Write> RegisterLink for McLink<S> {
    type Error = LinkError;

    fn read_bit(&mut self, device: &str) -> Result<bool, Self::Error> {
        let request = Request::read_bits(parse_device(device)?, 1)?;
        let response = self.exchange(&request)?;
        let bit = unpack_bits(&response.data, 1).next().unwrap_or(false);
        Ok(bit)
    }

    fn write_bit(&mut self, device: &str, value: bool) -> Result<(), Self::Error> {
        let request = Request::write_bits(parse_device(device)?, &[value])?;
        self.exchange(&request)?;
        Ok(())
    }

    fn read_registers(&mut self, device: &str, out: &mut [i64]) -> Result<(), Self::Error> {
        let request = Request::read_words(parse_device(device)?, 2 * out.len())?;
        let response = self.exchange(&request)?;
        let words: Vec<u16> = le_words(&response.data).collect();
        for (slot, value) in out.iter_mut().zip(words_to_dwords(&words)) {
            *slot = value as i64;
        }
        Ok(())
    }

    fn write_registers(&mut self, device: &str, values: &[i64]) -> Result<(), Self::Error> {
        let dwords = values
            .iter()
            .map(|&v| i32::try_from(v).map_err(|_| LinkError::ValueOutOfRange(v)))
            .collect::<Result<Vec<i32>, _>>()?;
        let request = Request::write_dwords(parse_device(device)?, &dwords)?;
        self.exchange(&request)?;
        Ok(())
    }
}
