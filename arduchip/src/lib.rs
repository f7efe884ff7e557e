//! A pure-Rust library for capturing images from ArduChip-based camera modules (like the ArduCAM
//! Mini series) over SPI.
//!
//! The ArduChip is a small controller that sits between an image sensor and the SPI bus, storing
//! one encoded frame (usually JPEG) at a time in an onboard FIFO. This crate drives the ArduChip:
//! starting and clearing captures, waiting for a capture to finish, and draining the FIFO into a
//! buffer you provide. Configuring the image sensor itself (normally done over I²C) is not
//! handled here, and the image data is passed through untouched.
//!
//! This library uses the [`embedded-hal`][embedded-hal] SPI and digital output traits, meaning
//! you should be able to use this library on any platform with an `embedded-hal` implementation.
//! This library is also `no_std` compatible, and never allocates; the image buffer is always
//! provided by the caller.
//!
//! [embedded-hal]: https://docs.rs/embedded-hal/0.2/embedded_hal/blocking/spi/index.html
//!
//! # High-Level API
//! ```
//! use arduchip::ArduChip;
//! use arduchip_test_data::{example_frame, MockArduChip};
//!
//! // A simulated camera stands in for a real SPI bus and chip-select pin here.
//! let device = MockArduChip::with_frame(&example_frame(2050));
//! let mut camera = ArduChip::new(device.spi(), device.chip_select())?;
//! camera.probe()?;
//! // A buffer for the image. The ArduChip can hold up to 384 KiB, anything larger than the buffer
//! // is cut off.
//! let mut framebuffer = vec![0u8; 4096];
//! let length = camera.read_image(&mut framebuffer)?;
//! assert_eq!(length, 2050);
//! assert_eq!(framebuffer[..2], [0xFF, 0xD8]);
//! # Ok::<(), arduchip::Error<arduchip_test_data::MockError, arduchip_test_data::MockError>>(())
//! ```
//! [`ArduChip::read_image`] starts a capture (unless one was already started with
//! [`ArduChip::start_capture`]), waits for it to finish, copies it out, and clears the FIFO for
//! the next capture. Waiting is a busy loop with no timeout by default; use
//! [`ArduChip::read_image_with_delay`] with [`PollOptions`] to back off between polls and give up
//! after a number of attempts.
//!
//! # Low-Level API
//! The [`bus`] module exposes the individual register and FIFO transactions through
//! [`SpiInterface`], and the [`fifo`] module the FIFO length and drain logic built on top of it.
//! Register addresses and commands are in the [`register`] module.

#![no_std]

pub mod bus;
pub mod common;
#[doc(hidden)]
pub mod driver;
#[doc(hidden)]
pub mod error;
pub mod fifo;
pub mod register;

#[doc(inline)]
pub use bus::SpiInterface;
pub use common::{CaptureState, PollOptions, CHUNK_SIZE, MAX_FRAMEBUFFER_SIZE};
#[doc(inline)]
pub use driver::ArduChip;
#[doc(inline)]
pub use error::Error;
pub use register::{FifoControl, FifoStatus, Register};
