// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Reading captured frames out of the ArduChip FIFO.

use core::convert::TryFrom;

use embedded_hal::blocking::spi;
use embedded_hal::digital::v2::OutputPin;
use log::{debug, warn};

use crate::bus::SpiInterface;
use crate::error::Error;
use crate::register::{fifo_length_from_bytes, Register};

/// Read the number of bytes the ArduChip has in its FIFO.
///
/// The length is 24 bits spread over three registers, read from the most significant down.
pub fn fifo_length<SPI, CS, E, PinE>(
    interface: &mut SpiInterface<SPI, CS>,
) -> Result<u32, Error<E, PinE>>
where
    SPI: spi::Transfer<u8, Error = E> + spi::Write<u8, Error = E>,
    CS: OutputPin<Error = PinE>,
{
    let msb = interface.read_register(Register::FifoSizeMsb)?;
    let isb = interface.read_register(Register::FifoSizeIsb)?;
    let lsb = interface.read_register(Register::FifoSizeLsb)?;
    Ok(fifo_length_from_bytes(msb, isb, lsb))
}

/// Drain the FIFO into `buffer`, returning the number of bytes copied.
///
/// If the FIFO holds more than `buffer.len()` bytes, only the first `buffer.len()` bytes are read
/// and the rest are left behind (and discarded when the capture is cleared). This is not treated
/// as an error. Bytes in `buffer` past the returned count are not modified.
pub fn read_fifo<SPI, CS, E, PinE>(
    interface: &mut SpiInterface<SPI, CS>,
    buffer: &mut [u8],
) -> Result<usize, Error<E, PinE>>
where
    SPI: spi::Transfer<u8, Error = E> + spi::Write<u8, Error = E>,
    CS: OutputPin<Error = PinE>,
{
    let reported = fifo_length(interface)?;
    let length = clamp_length(reported, buffer.len());
    if (length as u64) < u64::from(reported) {
        warn!(
            "FIFO holds {} bytes, truncating to {} byte buffer",
            reported,
            buffer.len()
        );
    }
    interface.burst_read(&mut buffer[..length])?;
    debug!("drained {} bytes from FIFO", length);
    Ok(length)
}

/// The number of bytes to read for a FIFO of `reported` bytes into a buffer of `capacity` bytes.
pub(crate) fn clamp_length(reported: u32, capacity: usize) -> usize {
    usize::try_from(reported).map_or(capacity, |reported| reported.min(capacity))
}
