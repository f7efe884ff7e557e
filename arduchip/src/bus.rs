// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Low-level access to the ArduChip over SPI.
//!
//! Every transaction with the ArduChip is framed by the chip-select line: it is pulled low before
//! the first byte and released after the last one. [`SpiInterface`] owns both the bus and the
//! chip-select pin so that framing can't be skipped, and releases chip-select even when the bus
//! reports an error partway through a transaction.

use embedded_hal::blocking::spi;
use embedded_hal::digital::v2::OutputPin;
use log::trace;

use crate::common::CHUNK_SIZE;
use crate::error::Error;
use crate::register::{Register, FIFO_BURST, FIFO_SINGLE};

/// The SPI bus and chip-select pin for one ArduChip.
#[derive(Clone, Debug)]
pub struct SpiInterface<SPI, CS> {
    /// The SPI bus the ArduChip is on.
    spi: SPI,

    /// The (active low) chip-select pin for the ArduChip.
    chip_select: CS,
}

impl<SPI, CS, E, PinE> SpiInterface<SPI, CS>
where
    SPI: spi::Transfer<u8, Error = E> + spi::Write<u8, Error = E>,
    CS: OutputPin<Error = PinE>,
{
    /// Take ownership of the bus and chip-select pin, making sure chip-select is released.
    pub fn new(spi: SPI, chip_select: CS) -> Result<Self, Error<E, PinE>> {
        let mut chip_select = chip_select;
        chip_select.set_high().map_err(Error::ChipSelect)?;
        Ok(Self { spi, chip_select })
    }

    /// Give back the bus and chip-select pin.
    pub fn release(self) -> (SPI, CS) {
        (self.spi, self.chip_select)
    }

    /// Run `f` with chip-select asserted.
    ///
    /// Chip-select is released before returning no matter how `f` finishes. If both the bus and
    /// the pin fail, the bus error is the one returned.
    pub fn transaction<T, F>(&mut self, f: F) -> Result<T, Error<E, PinE>>
    where
        F: FnOnce(&mut SPI) -> Result<T, E>,
    {
        if let Err(pin_error) = self.chip_select.set_low() {
            // The pin may have partially switched; the result of releasing it doesn't change
            // what gets reported.
            let _ = self.chip_select.set_high();
            return Err(Error::ChipSelect(pin_error));
        }
        let result = f(&mut self.spi);
        let released = self.chip_select.set_high();
        let value = result.map_err(Error::Spi)?;
        released.map_err(Error::ChipSelect)?;
        Ok(value)
    }

    /// Write a value to a register.
    pub fn write_register(&mut self, register: Register, value: u8) -> Result<(), Error<E, PinE>> {
        trace!("write {:?} = {:#04x}", register, value);
        self.transaction(|spi| {
            spi.write(&[register.write_command()])?;
            spi.write(&[value])
        })
    }

    /// Read the value of a register.
    ///
    /// The ArduChip needs one full byte to latch the register address before it can shift the
    /// value out, so a read is two exchanges inside one chip-select frame: the address (whatever
    /// comes back is stale) followed by a dummy byte, during which the value is returned.
    pub fn read_register(&mut self, register: Register) -> Result<u8, Error<E, PinE>> {
        let value = self.transaction(|spi| {
            let mut address = [register.read_command()];
            spi.transfer(&mut address)?;
            let mut value = [0x00];
            spi.transfer(&mut value)?;
            Ok(value[0])
        })?;
        trace!("read {:?} = {:#04x}", register, value);
        Ok(value)
    }

    /// Clock bytes out of the FIFO until `buffer` is full.
    ///
    /// The burst command is sent once, then the buffer is filled [`CHUNK_SIZE`] bytes at a time,
    /// all under a single chip-select assertion. The last chunk only asks for what is left.
    pub fn burst_read(&mut self, buffer: &mut [u8]) -> Result<(), Error<E, PinE>> {
        trace!("burst read of {} bytes", buffer.len());
        self.transaction(|spi| {
            spi.write(&[FIFO_BURST])?;
            for chunk in buffer.chunks_mut(CHUNK_SIZE) {
                chunk.fill(0x00);
                spi.transfer(chunk)?;
            }
            Ok(())
        })
    }

    /// Read the next byte out of the FIFO.
    pub fn single_read(&mut self) -> Result<u8, Error<E, PinE>> {
        self.transaction(|spi| {
            spi.write(&[FIFO_SINGLE])?;
            let mut value = [0x00];
            spi.transfer(&mut value)?;
            Ok(value[0])
        })
    }
}
