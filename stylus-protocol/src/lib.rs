//! MC Protocol (3E frame, binary) codec
//!
//! This crate encodes batch read/write requests for the motion controller's
//! bit and word devices and parses its responses. It knows nothing about
//! sockets; the host crate moves the bytes.
//!
//! # Protocol Overview
//!
//! Request:
//! ```text
//! ┌───────────┬─────┬────┬────────┬─────────┬────────┬───────┬─────┬────────┬──────────────┬────────┬──────┐
//! │ SUBHEADER │ NET │ PC │ MOD IO │ STATION │ LENGTH │ TIMER │ CMD │ SUBCMD │ DEVICE NO    │ CODE   │ DATA │
//! │ 50 00     │ 1B  │ 1B │ 2B     │ 1B      │ 2B LE  │ 2B    │ 2B  │ 2B     │ 3B LE        │ 1B     │ ...  │
//! └───────────┴─────┴────┴────────┴─────────┴────────┴───────┴─────┴────────┴──────────────┴────────┴──────┘
//! ```
//!
//! Response:
//! ```text
//! ┌───────────┬─────┬────┬────────┬─────────┬────────┬──────────┬──────┐
//! │ SUBHEADER │ NET │ PC │ MOD IO │ STATION │ LENGTH │ END CODE │ DATA │
//! │ D0 00     │ 1B  │ 1B │ 2B     │ 1B      │ 2B LE  │ 2B LE    │ ...  │
//! └───────────┴─────┴────┴────────┴─────────┴────────┴──────────┴──────┘
//! ```
//!
//! `LENGTH` counts every byte after itself. All multi-byte fields are
//! little-endian.

#![no_std]
#![deny(unsafe_code)]

pub mod device;
pub mod frame;
pub mod messages;

pub use device::{Device, DeviceCode, DeviceError};
pub use frame::{
    encode_request, Frame, FrameError, FrameParser, Response, Route, DEFAULT_MONITORING_TIMER,
    MAX_FRAME_SIZE, REQUEST_SUBHEADER, RESPONSE_SUBHEADER,
};
pub use messages::{
    dwords_to_words, le_words, unpack_bits, words_to_dwords, Request, MAX_BIT_POINTS,
    MAX_WORD_POINTS,
};
