// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
#[cfg(feature = "std")]
extern crate std;

use core::fmt;

/// Errors from the ArduChip driver.
///
/// `SpiE` is the error type of the SPI implementation, and `PinE` the error type of the
/// chip-select pin.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Error<SpiE, PinE> {
    /// Errors originating from the SPI implementation.
    Spi(SpiE),

    /// Errors originating from the chip-select pin.
    ChipSelect(PinE),

    /// The FIFO did not report a finished capture within the allowed number of polls.
    NotReady {
        /// How many times the status register was read.
        polls: u32,
    },

    /// The test register did not read back the value written to it.
    ProbeMismatch { wrote: u8, read: u8 },
}

// Custom Debug implementation so the variants are printed with the enum name.
impl<SpiE, PinE> fmt::Debug for Error<SpiE, PinE>
where
    SpiE: fmt::Debug,
    PinE: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Spi(spi_error) => f.debug_tuple("Error::Spi").field(spi_error).finish(),
            Error::ChipSelect(pin_error) => {
                f.debug_tuple("Error::ChipSelect").field(pin_error).finish()
            }
            Error::NotReady { polls } => f
                .debug_struct("Error::NotReady")
                .field("polls", polls)
                .finish(),
            Error::ProbeMismatch { wrote, read } => f
                .debug_struct("Error::ProbeMismatch")
                .field("wrote", wrote)
                .field("read", read)
                .finish(),
        }
    }
}

impl<SpiE, PinE> fmt::Display for Error<SpiE, PinE>
where
    SpiE: fmt::Debug,
    PinE: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Spi(spi_error) => write!(f, "SPI Error: {:?}", spi_error),
            Error::ChipSelect(pin_error) => write!(f, "Chip-select Error: {:?}", pin_error),
            Error::NotReady { polls } => {
                write!(f, "FIFO not ready after {} status polls", polls)
            }
            Error::ProbeMismatch { wrote, read } => write!(
                f,
                "Test register mismatch: wrote {:#04x}, read {:#04x}",
                wrote, read
            ),
        }
    }
}

#[cfg(feature = "std")]
impl<SpiE, PinE> std::error::Error for Error<SpiE, PinE>
where
    SpiE: std::error::Error + 'static,
    PinE: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Spi(spi_error) => Some(spi_error),
            Error::ChipSelect(pin_error) => Some(pin_error),
            Error::NotReady { .. } | Error::ProbeMismatch { .. } => None,
        }
    }
}

impl<SpiE, PinE> Error<SpiE, PinE> {
    /// `true` if the error came from the SPI bus or the chip-select pin.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Spi(_) | Error::ChipSelect(_))
    }
}
