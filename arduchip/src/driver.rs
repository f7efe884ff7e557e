// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::blocking::spi;
use embedded_hal::digital::v2::OutputPin;
use log::{debug, trace};
use paste::paste;

use crate::bus::SpiInterface;
use crate::common::{CaptureState, PollOptions};
use crate::error::Error;
use crate::fifo;
use crate::register::{FifoControl, FifoStatus, Register, PROBE_PATTERN, VERSION_YEAR_BASE};

/// DRY macro for the getters in `ArduChip` that return a register value as-is.
macro_rules! register_getter {
    { $name:ident, $register:ident, $doc:literal } => {
        #[doc = $doc]
        pub fn $name(&mut self) -> Result<u8, Error<E, PinE>> {
            self.interface.read_register(Register::$register)
        }
    };
}

/// Like `register_getter`, but for registers that can also be written. Adds a `set_*` method.
macro_rules! register_field {
    { $name:ident, $register:ident, $doc:literal } => {
        register_getter! { $name, $register, $doc }

        paste! {
            #[doc = "Write a new value to the register read by [`" $name "`][ArduChip::" $name "]."]
            pub fn [< set_ $name >](&mut self, value: u8) -> Result<(), Error<E, PinE>> {
                self.interface.write_register(Register::$register, value)
            }
        }
    };
}

/// Driver for an ArduChip FIFO camera module.
///
/// The ArduChip sits between an image sensor and the SPI bus, buffering one encoded frame (usually
/// JPEG) at a time in its FIFO. Capturing is a cycle: the FIFO is cleared, a capture is started,
/// the status register is polled until the capture is done, then the FIFO is drained and cleared
/// again. [`read_image`][ArduChip::read_image] performs that whole cycle.
///
/// Every method takes `&mut self` and performs one or more blocking bus transactions. If other
/// devices share the SPI bus, the caller has to keep them off of it for a whole
/// `read_image` call, as the FIFO length and data are only valid between the ready flag being
/// observed and the capture being cleared.
#[derive(Clone, Debug)]
pub struct ArduChip<SPI, CS> {
    /// The bus and chip-select pin.
    interface: SpiInterface<SPI, CS>,

    /// Whether a capture has been started and not yet read.
    state: CaptureState,
}

impl<SPI, CS, E, PinE> ArduChip<SPI, CS>
where
    SPI: spi::Transfer<u8, Error = E> + spi::Write<u8, Error = E>,
    CS: OutputPin<Error = PinE>,
{
    /// Create a driver for the ArduChip on `spi`, selected by `chip_select`.
    ///
    /// The test register is read once as part of setup. The ArduChip's SPI interface will
    /// sometimes ignore the first transaction after power up, and this makes sure that isn't one
    /// that matters.
    pub fn new(spi: SPI, chip_select: CS) -> Result<Self, Error<E, PinE>> {
        Self::with_interface(SpiInterface::new(spi, chip_select)?)
    }

    /// Create a driver from an existing [`SpiInterface`].
    pub fn with_interface(interface: SpiInterface<SPI, CS>) -> Result<Self, Error<E, PinE>> {
        let mut interface = interface;
        interface.read_register(Register::Test)?;
        Ok(Self {
            interface,
            state: CaptureState::Idle,
        })
    }

    /// Release the SPI bus and chip-select pin.
    ///
    /// A capture that has been started is left running on the camera.
    pub fn release(self) -> (SPI, CS) {
        self.interface.release()
    }

    /// Access the low-level interface for transactions not covered by this driver.
    pub fn interface(&mut self) -> &mut SpiInterface<SPI, CS> {
        &mut self.interface
    }

    /// Whether a capture has been started and not yet read out.
    pub fn capture_state(&self) -> CaptureState {
        self.state
    }

    /// Check that the ArduChip is responding by writing to and reading back the test register.
    pub fn probe(&mut self) -> Result<(), Error<E, PinE>> {
        self.interface
            .write_register(Register::Test, PROBE_PATTERN)?;
        let read = self.interface.read_register(Register::Test)?;
        if read == PROBE_PATTERN {
            Ok(())
        } else {
            Err(Error::ProbeMismatch {
                wrote: PROBE_PATTERN,
                read,
            })
        }
    }

    register_getter! {
        version,
        Version,
        "Read the ArduChip version."
    }

    register_getter! {
        fifo_status,
        FifoStatus,
        "Read the raw FIFO status register. See [`FifoStatus`] for a decoded version."
    }

    register_getter! {
        version_year,
        VersionYear,
        "Read the year the ArduChip was made, as an offset from 2000."
    }

    register_field! {
        test_register,
        Test,
        "Read the scratch test register."
    }

    register_field! {
        sensor_control,
        SensorControl,
        "Read the image sensor control register."
    }

    /// The year the ArduChip was made.
    pub fn manufacture_year(&mut self) -> Result<u16, Error<E, PinE>> {
        Ok(VERSION_YEAR_BASE + u16::from(self.version_year()?))
    }

    /// Check if a finished capture is waiting in the FIFO.
    pub fn is_fifo_ready(&mut self) -> Result<bool, Error<E, PinE>> {
        Ok(FifoStatus::from(self.fifo_status()?).ready())
    }

    /// Read how many bytes are in the FIFO.
    ///
    /// This is only meaningful once [the FIFO is ready][ArduChip::is_fifo_ready].
    pub fn fifo_length(&mut self) -> Result<u32, Error<E, PinE>> {
        fifo::fifo_length(&mut self.interface)
    }

    /// Read the next byte out of the FIFO.
    pub fn read_fifo_byte(&mut self) -> Result<u8, Error<E, PinE>> {
        self.interface.single_read()
    }

    /// Clear the FIFO, abandoning any capture in progress.
    ///
    /// Clearing is always allowed, and clearing twice has the same effect as clearing once.
    pub fn clear_capture(&mut self) -> Result<(), Error<E, PinE>> {
        self.interface
            .write_register(Register::FifoControl, FifoControl::Clear.into())?;
        self.state = CaptureState::Idle;
        debug!("capture cleared");
        Ok(())
    }

    /// Clear the FIFO and start a new capture.
    ///
    /// Calling this ahead of [`read_image`][ArduChip::read_image] lets the camera work on the
    /// frame in the meantime.
    pub fn start_capture(&mut self) -> Result<(), Error<E, PinE>> {
        self.clear_capture()?;
        self.interface
            .write_register(Register::FifoControl, FifoControl::Start.into())?;
        self.state = CaptureState::Capturing;
        debug!("capture started");
        Ok(())
    }

    /// Capture an image into `buffer`, returning the number of bytes written.
    ///
    /// A capture is started if one isn't already in progress. The FIFO is then polled until it
    /// is ready, drained into `buffer`, and cleared. If the image is larger than `buffer` it is
    /// silently truncated to `buffer.len()` bytes. A return value of 0 means the camera produced
    /// no image data.
    ///
    /// **This method will wait forever** if the camera never finishes the capture (for example if
    /// the image sensor isn't connected). It also spins between polls without yielding. Use
    /// [`read_image_with_delay`][ArduChip::read_image_with_delay] for a bounded wait.
    pub fn read_image(&mut self, buffer: &mut [u8]) -> Result<usize, Error<E, PinE>> {
        self.ensure_capturing()?;
        self.poll_until_ready(None, core::hint::spin_loop)?;
        self.drain(buffer)
    }

    /// Capture an image into `buffer`, waiting on `delay` between status polls.
    ///
    /// Behaves like [`read_image`][ArduChip::read_image], except that polling follows `options`.
    /// If `options.max_polls` is reached first, [`Error::NotReady`] is returned and the capture is
    /// left running, so a later call picks up the same capture instead of starting over. Any error
    /// once the FIFO is being drained leaves the driver idle, and the next call starts a new
    /// capture.
    pub fn read_image_with_delay<D>(
        &mut self,
        buffer: &mut [u8],
        delay: &mut D,
        options: &PollOptions,
    ) -> Result<usize, Error<E, PinE>>
    where
        D: DelayUs<u32>,
    {
        self.ensure_capturing()?;
        self.wait_for_fifo_ready(delay, options)?;
        self.drain(buffer)
    }

    /// Poll the status register until the FIFO is ready, waiting on `delay` between polls.
    ///
    /// This does not start a capture.
    pub fn wait_for_fifo_ready<D>(
        &mut self,
        delay: &mut D,
        options: &PollOptions,
    ) -> Result<(), Error<E, PinE>>
    where
        D: DelayUs<u32>,
    {
        let interval = options.interval_us;
        self.poll_until_ready(options.max_polls, || delay.delay_us(interval))
    }

    fn ensure_capturing(&mut self) -> Result<(), Error<E, PinE>> {
        if self.state == CaptureState::Idle {
            self.start_capture()
        } else {
            trace!("reusing capture in progress");
            Ok(())
        }
    }

    fn poll_until_ready<F>(
        &mut self,
        max_polls: Option<u32>,
        mut backoff: F,
    ) -> Result<(), Error<E, PinE>>
    where
        F: FnMut(),
    {
        let mut polls: u32 = 0;
        loop {
            if let Some(max_polls) = max_polls {
                if polls >= max_polls {
                    debug!("FIFO still not ready after {} polls", polls);
                    return Err(Error::NotReady { polls });
                }
            }
            if polls > 0 {
                backoff();
            }
            let status = FifoStatus::from(self.fifo_status()?);
            polls = polls.saturating_add(1);
            if status.ready() {
                trace!("FIFO ready after {} polls", polls);
                return Ok(());
            }
        }
    }

    fn drain(&mut self, buffer: &mut [u8]) -> Result<usize, Error<E, PinE>> {
        // Reading moves the FIFO read pointer, so a failed drain can't be resumed.
        self.state = CaptureState::Idle;
        let length = fifo::read_fifo(&mut self.interface, buffer)?;
        self.clear_capture()?;
        Ok(length)
    }
}

#[cfg(test)]
mod test {
    extern crate std;

    use std::vec;
    use std::vec::Vec;

    use embedded_hal_mock::delay::MockNoop;
    use embedded_hal_mock::pin::{Mock as PinMock, State as PinState, Transaction as PinTransaction};
    use embedded_hal_mock::spi::{Mock as SpiMock, Transaction as SpiTransaction};

    use super::ArduChip;
    use crate::common::{CaptureState, PollOptions};
    use crate::error::Error;

    fn read(register: u8, value: u8) -> Vec<SpiTransaction> {
        vec![
            SpiTransaction::transfer(vec![register], vec![0x00]),
            SpiTransaction::transfer(vec![0x00], vec![value]),
        ]
    }

    fn write(register: u8, value: u8) -> Vec<SpiTransaction> {
        vec![
            SpiTransaction::write(vec![register | 0x80]),
            SpiTransaction::write(vec![value]),
        ]
    }

    /// Build a camera expecting the setup read, then the transactions in `frames`.
    fn create_camera(frames: Vec<Vec<SpiTransaction>>) -> ArduChip<SpiMock, PinMock> {
        let mut spi_expectations = read(0x00, 0x00);
        let mut pin_expectations = vec![
            PinTransaction::set(PinState::High),
            PinTransaction::set(PinState::Low),
            PinTransaction::set(PinState::High),
        ];
        for frame in frames {
            spi_expectations.extend(frame);
            pin_expectations.push(PinTransaction::set(PinState::Low));
            pin_expectations.push(PinTransaction::set(PinState::High));
        }
        ArduChip::new(
            SpiMock::new(&spi_expectations),
            PinMock::new(&pin_expectations),
        )
        .expect("An ArduChip should be created after the setup read")
    }

    fn finish(camera: ArduChip<SpiMock, PinMock>) {
        let (mut spi, mut pin) = camera.release();
        spi.done();
        pin.done();
    }

    #[test]
    fn smoke_test() {
        let camera = create_camera(vec![]);
        assert_eq!(camera.capture_state(), CaptureState::Idle);
        finish(camera);
    }

    #[test]
    fn getters_read_fixed_registers() {
        let mut camera = create_camera(vec![read(0x40, 0x73), read(0x41, 0x08), read(0x46, 0x15)]);
        assert_eq!(camera.version().unwrap(), 0x73);
        assert_eq!(camera.fifo_status().unwrap(), 0x08);
        assert_eq!(camera.version_year().unwrap(), 0x15);
        assert_eq!(camera.capture_state(), CaptureState::Idle);
        finish(camera);
    }

    #[test]
    fn manufacture_year() {
        let mut camera = create_camera(vec![read(0x46, 21)]);
        assert_eq!(camera.manufacture_year().unwrap(), 2021);
        finish(camera);
    }

    #[test]
    fn start_capture_clears_first() {
        let mut camera = create_camera(vec![write(0x04, 0x01), write(0x04, 0x02)]);
        camera.start_capture().unwrap();
        assert_eq!(camera.capture_state(), CaptureState::Capturing);
        finish(camera);
    }

    #[test]
    fn clear_capture_twice() {
        let mut camera = create_camera(vec![write(0x04, 0x01), write(0x04, 0x01)]);
        camera.clear_capture().unwrap();
        assert_eq!(camera.capture_state(), CaptureState::Idle);
        camera.clear_capture().unwrap();
        assert_eq!(camera.capture_state(), CaptureState::Idle);
        finish(camera);
    }

    #[test]
    fn read_image_from_idle() {
        let mut burst = vec![SpiTransaction::write(vec![0x3C])];
        burst.push(SpiTransaction::transfer(vec![0x00; 4], vec![0xFF, 0xD8, 0xFF, 0xD9]));
        let mut camera = create_camera(vec![
            write(0x04, 0x01),
            write(0x04, 0x02),
            read(0x41, 0x00),
            read(0x41, 0x08),
            read(0x44, 0x00),
            read(0x43, 0x00),
            read(0x42, 0x04),
            burst,
            write(0x04, 0x01),
        ]);
        let mut buffer = [0u8; 16];
        assert_eq!(camera.read_image(&mut buffer).unwrap(), 4);
        assert_eq!(buffer[..4], [0xFF, 0xD8, 0xFF, 0xD9]);
        assert_eq!(camera.capture_state(), CaptureState::Idle);
        finish(camera);
    }

    #[test]
    fn read_image_reuses_armed_capture() {
        let burst = vec![
            SpiTransaction::write(vec![0x3C]),
            SpiTransaction::transfer(vec![0x00; 2], vec![0xAB, 0xCD]),
        ];
        let mut camera = create_camera(vec![
            write(0x04, 0x01),
            write(0x04, 0x02),
            // No clear and start here, straight to polling
            read(0x41, 0x08),
            read(0x44, 0x00),
            read(0x43, 0x00),
            read(0x42, 0x02),
            burst,
            write(0x04, 0x01),
        ]);
        camera.start_capture().unwrap();
        let mut buffer = [0u8; 8];
        assert_eq!(camera.read_image(&mut buffer).unwrap(), 2);
        assert_eq!(camera.capture_state(), CaptureState::Idle);
        finish(camera);
    }

    #[test]
    fn bounded_poll_gives_up() {
        let mut camera = create_camera(vec![
            write(0x04, 0x01),
            write(0x04, 0x02),
            read(0x41, 0x00),
            read(0x41, 0x00),
            read(0x41, 0x00),
        ]);
        let mut buffer = [0u8; 8];
        let options = PollOptions::every(100).with_max_polls(3);
        let result = camera.read_image_with_delay(&mut buffer, &mut MockNoop::new(), &options);
        assert!(matches!(result, Err(Error::NotReady { polls: 3 })));
        // The capture is left running for the next attempt.
        assert_eq!(camera.capture_state(), CaptureState::Capturing);
        finish(camera);
    }

    #[test]
    fn zero_max_polls_never_reads_status() {
        let mut camera = create_camera(vec![]);
        let options = PollOptions::every(100).with_max_polls(0);
        let result = camera.wait_for_fifo_ready(&mut MockNoop::new(), &options);
        assert!(matches!(result, Err(Error::NotReady { polls: 0 })));
        finish(camera);
    }

    #[test]
    fn probe_round_trip() {
        let mut camera = create_camera(vec![write(0x00, 0x55), read(0x00, 0x55)]);
        camera.probe().unwrap();
        finish(camera);
    }

    #[test]
    fn probe_mismatch() {
        let mut camera = create_camera(vec![write(0x00, 0x55), read(0x00, 0xFF)]);
        assert!(matches!(
            camera.probe(),
            Err(Error::ProbeMismatch {
                wrote: 0x55,
                read: 0xFF
            })
        ));
        finish(camera);
    }

    #[test]
    fn sensor_control_setter() {
        let mut camera = create_camera(vec![write(0x06, 0x05), read(0x06, 0x05)]);
        camera.set_sensor_control(0x05).unwrap();
        assert_eq!(camera.sensor_control().unwrap(), 0x05);
        finish(camera);
    }
}
