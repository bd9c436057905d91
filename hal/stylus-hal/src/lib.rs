//! Stylus Hardware Abstraction Layer
//!
//! This crate defines the capabilities the trajectory engine needs from the
//! outside world: a register/bit link to the motion controller and a
//! monotonic clock to pace the command stream. Concrete implementations live
//! in the host crate (TCP link, std clock) or in tests (scripted fakes).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  stylus-core (dispatcher)               │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  stylus-hal (this crate - traits)       │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │  McLink (TCP) │       │  StdClock     │
//! │  stylus-host  │       │  stylus-host  │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`link::RegisterLink`] - Named bits and registers on the controller
//! - [`time::Clock`] - Monotonic time plus blocking delays

#![no_std]
#![deny(unsafe_code)]

pub mod link;
pub mod time;

// Re-export key traits at crate root for convenience
pub use link::{device_name, DeviceName, RegisterLink, MAX_DEVICE_LEN};
pub use time::Clock;
