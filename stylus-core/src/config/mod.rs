//! Configuration types
//!
//! Board-agnostic configuration structures. The host fills these from TOML;
//! every component receives the values it needs explicitly.

pub mod hardware;
pub mod types;

pub use hardware::*;
pub use types::*;
