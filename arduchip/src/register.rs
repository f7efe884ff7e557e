// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! The ArduChip register map.
//!
//! Every register on the ArduChip is eight bits wide and addressed with a seven bit address. The
//! top bit of the address byte selects between reading (clear) and writing (set).

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// OR'd into a register address to turn a transaction into a write.
pub const WRITE_BIT: u8 = 0x80;

/// Mask for the address bits of a command byte.
pub const ADDRESS_MASK: u8 = !WRITE_BIT;

/// Command byte that starts a burst read of the FIFO.
///
/// After this byte is sent, every following byte clocked out of the ArduChip (while chip-select
/// remains asserted) is the next byte from the FIFO.
pub const FIFO_BURST: u8 = 0x3C;

/// Command byte that reads a single byte from the FIFO.
pub const FIFO_SINGLE: u8 = 0x3D;

/// The value written to [`Register::Test`] by [`ArduChip::probe`][crate::ArduChip::probe].
pub const PROBE_PATTERN: u8 = 0x55;

/// The year [`Register::VersionYear`] counts from.
pub const VERSION_YEAR_BASE: u16 = 2000;

/// Addressable registers on the ArduChip.
#[derive(Clone, Copy, Debug, Eq, Hash, IntoPrimitive, Ord, PartialEq, PartialOrd, TryFromPrimitive)]
#[repr(u8)]
pub enum Register {
    /// Scratch register, freely readable and writable.
    Test = 0x00,

    /// FIFO control. Accepts [`FifoControl`] commands.
    FifoControl = 0x04,

    /// Image sensor control.
    SensorControl = 0x06,

    /// The version of the ArduChip.
    Version = 0x40,

    /// FIFO status flags. See [`FifoStatus`].
    FifoStatus = 0x41,

    /// Bits 0 through 7 of the number of bytes in the FIFO.
    FifoSizeLsb = 0x42,

    /// Bits 8 through 15 of the number of bytes in the FIFO.
    FifoSizeIsb = 0x43,

    /// Bits 16 through 23 of the number of bytes in the FIFO.
    FifoSizeMsb = 0x44,

    /// Year of manufacture, as an offset from 2000.
    VersionYear = 0x46,
}

impl Register {
    /// The address byte for reading this register.
    pub fn read_command(self) -> u8 {
        u8::from(self) & ADDRESS_MASK
    }

    /// The address byte for writing this register.
    pub fn write_command(self) -> u8 {
        u8::from(self) | WRITE_BIT
    }
}

/// Commands accepted by [`Register::FifoControl`].
#[derive(Clone, Copy, Debug, Eq, IntoPrimitive, PartialEq, TryFromPrimitive)]
#[repr(u8)]
pub enum FifoControl {
    /// Clear the FIFO and the capture-done flag.
    Clear = 0x01,

    /// Start capturing a frame into the FIFO.
    Start = 0x02,
}

/// Decoded view of [`Register::FifoStatus`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FifoStatus(u8);

impl FifoStatus {
    /// Set by the ArduChip once a captured frame is completely in the FIFO.
    pub const READY: u8 = 0x08;

    /// `true` when a capture has finished and the FIFO can be drained.
    pub fn ready(&self) -> bool {
        self.0 & Self::READY == Self::READY
    }

    /// The raw register value.
    pub fn bits(&self) -> u8 {
        self.0
    }
}

impl From<u8> for FifoStatus {
    fn from(raw: u8) -> Self {
        Self(raw)
    }
}

impl From<FifoStatus> for u8 {
    fn from(status: FifoStatus) -> Self {
        status.0
    }
}

/// Assemble the 24-bit FIFO length from the three size registers.
pub fn fifo_length_from_bytes(msb: u8, isb: u8, lsb: u8) -> u32 {
    (u32::from(msb) << 16) | (u32::from(isb) << 8) | u32::from(lsb)
}

#[cfg(test)]
mod test {
    use core::convert::TryFrom;

    use super::*;

    #[test]
    fn register_addresses() {
        assert_eq!(u8::from(Register::Test), 0x00);
        assert_eq!(u8::from(Register::FifoControl), 0x04);
        assert_eq!(u8::from(Register::SensorControl), 0x06);
        assert_eq!(u8::from(Register::Version), 0x40);
        assert_eq!(u8::from(Register::FifoStatus), 0x41);
        assert_eq!(u8::from(Register::FifoSizeLsb), 0x42);
        assert_eq!(u8::from(Register::FifoSizeIsb), 0x43);
        assert_eq!(u8::from(Register::FifoSizeMsb), 0x44);
        assert_eq!(u8::from(Register::VersionYear), 0x46);
        assert_eq!(FIFO_BURST, 0x3C);
        assert_eq!(FIFO_SINGLE, 0x3D);
    }

    #[test]
    fn commands() {
        assert_eq!(Register::FifoControl.write_command(), 0x84);
        assert_eq!(Register::FifoControl.read_command(), 0x04);
        assert_eq!(Register::Version.read_command(), 0x40);
        assert_eq!(u8::from(FifoControl::Clear), 0x01);
        assert_eq!(u8::from(FifoControl::Start), 0x02);
    }

    #[test]
    fn unknown_register_address() {
        assert!(Register::try_from(0x05).is_err());
        assert_eq!(Register::try_from(0x44).unwrap(), Register::FifoSizeMsb);
    }

    #[test]
    fn fifo_status_ready() {
        assert!(FifoStatus::from(0x08).ready());
        assert!(FifoStatus::from(0xFF).ready());
        assert!(!FifoStatus::from(0x00).ready());
        assert!(!FifoStatus::from(0xF7).ready());
    }

    #[test]
    fn fifo_length_assembly() {
        assert_eq!(fifo_length_from_bytes(0x01, 0x86, 0xA0), 100_000);
        assert_eq!(fifo_length_from_bytes(0x00, 0x00, 0x00), 0);
        assert_eq!(fifo_length_from_bytes(0xFF, 0xFF, 0xFF), 0x00FF_FFFF);
        assert_eq!(fifo_length_from_bytes(0x00, 0x08, 0x02), 2050);
    }
}
