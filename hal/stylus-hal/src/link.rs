//! Controller register link abstraction
//!
//! The motion controller exposes named boolean devices (relays such as `M3`)
//! and named data registers (such as `D100`). The dispatcher only needs to
//! read and write those by name; how they travel over the wire is up to the
//! implementation.

use heapless::String;

/// Maximum length of a device name such as `D100` or `M4`
pub const MAX_DEVICE_LEN: usize = 8;

/// Fixed-capacity device name
pub type DeviceName = String<MAX_DEVICE_LEN>;

/// Build a [`DeviceName`] from a string slice
///
/// Returns `None` if the name does not fit in [`MAX_DEVICE_LEN`] bytes.
pub fn device_name(name: &str) -> Option<DeviceName> {
    let mut out = DeviceName::new();
    out.push_str(name).ok()?;
    Some(out)
}

/// Link to the motion controller's bits and registers
///
/// All calls are synchronous. Any error is treated by the caller as a
/// transport failure for the current run; implementations must not retry
/// silently.
pub trait RegisterLink {
    /// Error type for link operations
    type Error: core::fmt::Debug;

    /// Read a single bit device
    fn read_bit(&mut self, device: &str) -> Result<bool, Self::Error>;

    /// Write a single bit device
    fn write_bit(&mut self, device: &str, value: bool) -> Result<(), Self::Error>;

    /// Read `out.len()` consecutive values starting at `device`
    ///
    /// Each value is a signed 32-bit register pair on the controller,
    /// widened to `i64`.
    fn read_registers(&mut self, device: &str, out: &mut [i64]) -> Result<(), Self::Error>;

    /// Write consecutive values starting at `device` as one batch
    ///
    /// Each value occupies a signed 32-bit register pair on the controller.
    fn write_registers(&mut self, device: &str, values: &[i64]) -> Result<(), Self::Error>;
}

impl<T: RegisterLink + ?Sized> RegisterLink for &mut T {
    type Error = T::Error;

    fn read_bit(&mut self, device: &str) -> Result<bool, Self::Error> {
        (**self).read_bit(device)
    }

    fn write_bit(&mut self, device: &str, value: bool) -> Result<(), Self::Error> {
        (**self).write_bit(device, value)
    }

    fn read_registers(&mut self, device: &str, out: &mut [i64]) -> Result<(), Self::Error> {
        (**self).read_registers(device, out)
    }

    fn write_registers(&mut self, device: &str, values: &[i64]) -> Result<(), Self::Error> {
        (**self).write_registers(device, values)
    }
}
