// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use arduchip::register::{
    FifoControl, FifoStatus, Register, ADDRESS_MASK, FIFO_BURST, FIFO_SINGLE, WRITE_BIT,
};
use embedded_hal::blocking::spi;
use embedded_hal::digital::v2::OutputPin;

/// Number of addressable registers on the ArduChip.
const REGISTER_COUNT: usize = 0x80;

/// The version reported by the simulated ArduChip.
pub const MOCK_VERSION: u8 = 0x73;

/// The manufacture year (offset from 2000) reported by the simulated ArduChip.
pub const MOCK_VERSION_YEAR: u8 = 21;

/// The byte shifted out while the ArduChip is latching a register address.
///
/// Deliberately not zero so that skipping the second exchange of a read shows up in tests.
pub const LATCH_BYTE: u8 = 0xA5;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MockError {
    /// Bytes were sent while chip-select was released.
    NotSelected,

    /// Chip-select was asserted while already asserted.
    AlreadySelected,

    /// More bytes were sent in a transaction than the command allows.
    UnexpectedByte(u8),

    /// A simulated failure of the SPI bus.
    BusFault,

    /// A simulated failure of the chip-select pin.
    PinFault,
}

impl fmt::Display for MockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for MockError {}

/// One complete chip-select frame, as seen by the simulated ArduChip.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transaction {
    /// A register write.
    Write { register: u8, value: u8 },

    /// A register read (address and dummy byte).
    Read { register: u8 },

    /// A burst read, with the length of each chunk requested.
    Burst { chunks: Vec<usize> },

    /// A single byte FIFO read.
    Single,

    /// A frame that ended before the command was complete. `None` if no bytes were sent.
    Incomplete { command: Option<u8> },
}

impl Transaction {
    /// Total number of FIFO bytes requested by a burst read, 0 for everything else.
    pub fn burst_length(&self) -> usize {
        match self {
            Transaction::Burst { chunks } => chunks.iter().sum(),
            _ => 0,
        }
    }
}

/// Where a chip-select frame is in the ArduChip protocol.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Phase {
    Command,
    WriteValue(u8),
    ReadValue(u8),
    Burst(Vec<usize>),
    Single,
    Finished(Transaction),
}

#[derive(Clone, Debug)]
struct DeviceState {
    registers: [u8; REGISTER_COUNT],
    /// `None` when chip-select is released.
    phase: Option<Phase>,
    frame: Vec<u8>,
    fifo_position: usize,
    /// Overrides the FIFO length reported by the size registers.
    reported_length: Option<u32>,
    /// Status polls after a start before the capture is reported done. `None` never finishes.
    polls_until_ready: Option<u32>,
    /// Status polls remaining for the current capture.
    remaining_polls: Option<u32>,
    capturing: bool,
    capture_done: bool,
    transactions: Vec<Transaction>,
    chip_select_assertions: usize,
    status_reads: usize,
    /// Successful SPI calls allowed before every call fails.
    spi_calls_before_fault: Option<usize>,
    pin_fault: bool,
}

impl DeviceState {
    fn read_value(&mut self, register: u8) -> u8 {
        match Register::try_from(register) {
            Ok(Register::FifoStatus) => {
                self.status_reads += 1;
                if self.capturing && !self.capture_done {
                    match self.remaining_polls {
                        Some(0) => self.capture_done = true,
                        Some(remaining) => self.remaining_polls = Some(remaining - 1),
                        None => (),
                    }
                }
                if self.capture_done {
                    FifoStatus::READY
                } else {
                    0x00
                }
            }
            Ok(Register::FifoSizeLsb) => self.fifo_length().to_be_bytes()[3],
            Ok(Register::FifoSizeIsb) => self.fifo_length().to_be_bytes()[2],
            Ok(Register::FifoSizeMsb) => self.fifo_length().to_be_bytes()[1],
            Ok(Register::FifoControl) => 0x00,
            _ => self.registers[register as usize],
        }
    }

    fn write_value(&mut self, register: u8, value: u8) {
        match Register::try_from(register) {
            Ok(Register::FifoControl) => {
                if value & u8::from(FifoControl::Clear) != 0 {
                    self.capturing = false;
                    self.capture_done = false;
                    self.fifo_position = 0;
                }
                if value & u8::from(FifoControl::Start) != 0 {
                    self.capturing = true;
                    self.capture_done = false;
                    self.remaining_polls = self.polls_until_ready;
                }
            }
            // Read-only registers ignore writes.
            Ok(Register::Version)
            | Ok(Register::FifoStatus)
            | Ok(Register::FifoSizeLsb)
            | Ok(Register::FifoSizeIsb)
            | Ok(Register::FifoSizeMsb)
            | Ok(Register::VersionYear) => (),
            _ => self.registers[register as usize] = value,
        }
    }

    fn fifo_length(&self) -> u32 {
        self.reported_length
            .unwrap_or_else(|| u32::try_from(self.frame.len()).unwrap_or(u32::MAX))
    }

    fn next_fifo_byte(&mut self) -> u8 {
        let byte = self.frame.get(self.fifo_position).copied().unwrap_or(0x00);
        self.fifo_position += 1;
        byte
    }

    /// Exchange one byte, returning what the ArduChip shifts out.
    fn exchange(&mut self, byte: u8) -> Result<u8, MockError> {
        let phase = self.phase.take().ok_or(MockError::NotSelected)?;
        let (response, next) = match phase {
            Phase::Command if byte == FIFO_BURST => (0x00, Phase::Burst(Vec::new())),
            Phase::Command if byte == FIFO_SINGLE => (0x00, Phase::Single),
            Phase::Command if byte & WRITE_BIT != 0 => {
                (LATCH_BYTE, Phase::WriteValue(byte & ADDRESS_MASK))
            }
            Phase::Command => (LATCH_BYTE, Phase::ReadValue(byte)),
            Phase::WriteValue(register) => {
                self.write_value(register, byte);
                (0x00, Phase::Finished(Transaction::Write { register, value: byte }))
            }
            Phase::ReadValue(register) => {
                let value = self.read_value(register);
                (value, Phase::Finished(Transaction::Read { register }))
            }
            Phase::Burst(chunks) => (self.next_fifo_byte(), Phase::Burst(chunks)),
            Phase::Single => (self.next_fifo_byte(), Phase::Finished(Transaction::Single)),
            Phase::Finished(transaction) => {
                self.phase = Some(Phase::Finished(transaction));
                return Err(MockError::UnexpectedByte(byte));
            }
        };
        self.phase = Some(next);
        Ok(response)
    }

    fn check_spi_fault(&mut self) -> Result<(), MockError> {
        match self.spi_calls_before_fault {
            Some(0) => Err(MockError::BusFault),
            Some(remaining) => {
                self.spi_calls_before_fault = Some(remaining - 1);
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn select(&mut self) -> Result<(), MockError> {
        if self.pin_fault {
            return Err(MockError::PinFault);
        }
        if self.phase.is_some() {
            return Err(MockError::AlreadySelected);
        }
        self.chip_select_assertions += 1;
        self.phase = Some(Phase::Command);
        Ok(())
    }

    fn deselect(&mut self) -> Result<(), MockError> {
        // Releasing the pin always works, even with a simulated fault, so the device is never
        // left selected.
        let transaction = match self.phase.take() {
            None => None,
            Some(Phase::Command) => Some(Transaction::Incomplete { command: None }),
            Some(Phase::WriteValue(register)) => Some(Transaction::Incomplete {
                command: Some(register | WRITE_BIT),
            }),
            Some(Phase::ReadValue(register)) => Some(Transaction::Incomplete {
                command: Some(register),
            }),
            Some(Phase::Burst(chunks)) => Some(Transaction::Burst { chunks }),
            Some(Phase::Single) => Some(Transaction::Incomplete {
                command: Some(FIFO_SINGLE),
            }),
            Some(Phase::Finished(transaction)) => Some(transaction),
        };
        if let Some(transaction) = transaction {
            self.transactions.push(transaction);
        }
        if self.pin_fault {
            Err(MockError::PinFault)
        } else {
            Ok(())
        }
    }
}

/// A simulated ArduChip.
///
/// Clones share the same device, so a test can keep a `MockArduChip` around to inspect and
/// change the device while the driver owns the [`MockSpi`] and [`MockChipSelect`] handed out by
/// it.
#[derive(Clone, Debug)]
pub struct MockArduChip {
    state: Rc<RefCell<DeviceState>>,
}

impl Default for MockArduChip {
    fn default() -> Self {
        Self::new()
    }
}

impl MockArduChip {
    /// A simulated ArduChip with an empty FIFO that finishes captures on the first status poll.
    pub fn new() -> Self {
        let mut registers = [0u8; REGISTER_COUNT];
        registers[u8::from(Register::Version) as usize] = MOCK_VERSION;
        registers[u8::from(Register::VersionYear) as usize] = MOCK_VERSION_YEAR;
        Self {
            state: Rc::new(RefCell::new(DeviceState {
                registers,
                phase: None,
                frame: Vec::new(),
                fifo_position: 0,
                reported_length: None,
                polls_until_ready: Some(0),
                remaining_polls: None,
                capturing: false,
                capture_done: false,
                transactions: Vec::new(),
                chip_select_assertions: 0,
                status_reads: 0,
                spi_calls_before_fault: None,
                pin_fault: false,
            })),
        }
    }

    /// A simulated ArduChip that captures `frame`.
    pub fn with_frame(frame: &[u8]) -> Self {
        let mock = Self::new();
        mock.load_frame(frame);
        mock
    }

    /// The SPI bus for this device.
    pub fn spi(&self) -> MockSpi {
        MockSpi {
            state: Rc::clone(&self.state),
        }
    }

    /// The chip-select pin for this device.
    pub fn chip_select(&self) -> MockChipSelect {
        MockChipSelect {
            state: Rc::clone(&self.state),
        }
    }

    /// Replace the image data captured into the FIFO.
    pub fn load_frame(&self, frame: &[u8]) {
        let mut state = self.state.borrow_mut();
        state.frame = frame.to_vec();
        state.fifo_position = 0;
    }

    /// Make the size registers report `length` instead of the length of the loaded frame.
    pub fn set_reported_length(&self, length: Option<u32>) {
        self.state.borrow_mut().reported_length = length;
    }

    /// Set how many status polls return "not ready" after a capture is started. `None` means a
    /// capture never finishes.
    ///
    /// A capture that is already running switches to the new count.
    pub fn set_polls_until_ready(&self, polls: Option<u32>) {
        let mut state = self.state.borrow_mut();
        state.polls_until_ready = polls;
        state.remaining_polls = polls;
    }

    /// Set a register directly, bypassing read-only protection.
    pub fn set_register(&self, register: Register, value: u8) {
        self.state.borrow_mut().registers[u8::from(register) as usize] = value;
    }

    /// Read a register directly, without any side effects.
    pub fn register(&self, register: Register) -> u8 {
        self.state.borrow().registers[u8::from(register) as usize]
    }

    /// Allow `calls` more SPI calls to succeed, then fail all of them. `None` removes the fault.
    pub fn fail_spi_after(&self, calls: Option<usize>) {
        self.state.borrow_mut().spi_calls_before_fault = calls;
    }

    /// Make chip-select fail (asserting fails, releasing still releases but reports an error).
    pub fn set_pin_fault(&self, fault: bool) {
        self.state.borrow_mut().pin_fault = fault;
    }

    /// Whether a capture has been started and not cleared.
    pub fn capturing(&self) -> bool {
        self.state.borrow().capturing
    }

    /// Whether chip-select is currently asserted.
    pub fn selected(&self) -> bool {
        self.state.borrow().phase.is_some()
    }

    /// How many times chip-select has been asserted.
    pub fn chip_select_assertions(&self) -> usize {
        self.state.borrow().chip_select_assertions
    }

    /// How many times the status register has been read.
    pub fn status_reads(&self) -> usize {
        self.state.borrow().status_reads
    }

    /// Every completed chip-select frame, oldest first.
    pub fn transactions(&self) -> Ref<'_, Vec<Transaction>> {
        Ref::map(self.state.borrow(), |state| &state.transactions)
    }

    /// Forget recorded transactions and counters.
    pub fn clear_transactions(&self) {
        let mut state = self.state.borrow_mut();
        state.transactions.clear();
        state.chip_select_assertions = 0;
        state.status_reads = 0;
    }
}

/// SPI bus half of a [`MockArduChip`].
#[derive(Clone, Debug)]
pub struct MockSpi {
    state: Rc<RefCell<DeviceState>>,
}

impl spi::Transfer<u8> for MockSpi {
    type Error = MockError;

    fn transfer<'w>(&mut self, words: &'w mut [u8]) -> Result<&'w [u8], Self::Error> {
        let mut state = self.state.borrow_mut();
        state.check_spi_fault()?;
        if let Some(Phase::Burst(chunks)) = state.phase.as_mut() {
            chunks.push(words.len());
        }
        for word in words.iter_mut() {
            *word = state.exchange(*word)?;
        }
        Ok(words)
    }
}

impl spi::Write<u8> for MockSpi {
    type Error = MockError;

    fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        let mut state = self.state.borrow_mut();
        state.check_spi_fault()?;
        for word in words {
            state.exchange(*word)?;
        }
        Ok(())
    }
}

/// Chip-select half of a [`MockArduChip`]. Active low.
#[derive(Clone, Debug)]
pub struct MockChipSelect {
    state: Rc<RefCell<DeviceState>>,
}

impl OutputPin for MockChipSelect {
    type Error = MockError;

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.state.borrow_mut().select()
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.state.borrow_mut().deselect()
    }
}

#[cfg(test)]
mod test {
    use embedded_hal::blocking::spi::{Transfer, Write};
    use embedded_hal::digital::v2::OutputPin;

    use super::*;

    #[test]
    fn bytes_require_chip_select() {
        let mock = MockArduChip::new();
        let mut spi = mock.spi();
        assert_eq!(spi.write(&[0x40]), Err(MockError::NotSelected));
    }

    #[test]
    fn single_exchange_read_returns_latch_byte() {
        let mock = MockArduChip::new();
        let mut spi = mock.spi();
        let mut cs = mock.chip_select();
        cs.set_low().unwrap();
        let mut buf = [0x40];
        spi.transfer(&mut buf).unwrap();
        cs.set_high().unwrap();
        assert_eq!(buf[0], LATCH_BYTE);
        assert_eq!(
            mock.transactions()[0],
            Transaction::Incomplete {
                command: Some(0x40)
            }
        );
    }

    #[test]
    fn two_exchange_read() {
        let mock = MockArduChip::new();
        let mut spi = mock.spi();
        let mut cs = mock.chip_select();
        cs.set_low().unwrap();
        let mut buf = [0x40];
        spi.transfer(&mut buf).unwrap();
        let mut buf = [0x00];
        spi.transfer(&mut buf).unwrap();
        cs.set_high().unwrap();
        assert_eq!(buf[0], MOCK_VERSION);
        assert_eq!(mock.transactions()[0], Transaction::Read { register: 0x40 });
    }

    #[test]
    fn extra_bytes_are_rejected() {
        let mock = MockArduChip::new();
        let mut spi = mock.spi();
        let mut cs = mock.chip_select();
        cs.set_low().unwrap();
        assert_eq!(
            spi.write(&[0x80, 0x12, 0x34]),
            Err(MockError::UnexpectedByte(0x34))
        );
        cs.set_high().unwrap();
        assert_eq!(mock.register(Register::Test), 0x12);
    }

    #[test]
    fn read_only_registers_ignore_writes() {
        let mock = MockArduChip::new();
        let mut spi = mock.spi();
        let mut cs = mock.chip_select();
        cs.set_low().unwrap();
        spi.write(&[0xC0, 0x00]).unwrap();
        cs.set_high().unwrap();
        assert_eq!(mock.register(Register::Version), MOCK_VERSION);
    }
}
