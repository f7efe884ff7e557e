// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Types and constants shared across the driver.

/// The number of bytes requested from the SPI bus at a time while draining the FIFO.
pub const CHUNK_SIZE: usize = 1024;

/// The largest framebuffer normally used with these modules, 384 KiB.
///
/// Nothing in the driver requires a buffer this large; the FIFO is truncated to whatever buffer
/// is given.
pub const MAX_FRAMEBUFFER_SIZE: usize = 384 * 1024;

/// Whether the driver has armed a capture.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum CaptureState {
    /// No capture is in progress. The next
    /// [`read_image`][crate::ArduChip::read_image] will start one.
    #[default]
    Idle,

    /// A capture was started and has not been read out yet.
    Capturing,
}

/// Controls how the driver waits for the FIFO-ready flag.
///
/// The default waits forever without delaying between polls, which is the same behavior as
/// [`ArduChip::read_image`][crate::ArduChip::read_image].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PollOptions {
    /// Microseconds to wait between reads of the status register.
    pub interval_us: u32,

    /// The maximum number of status register reads before giving up with
    /// [`Error::NotReady`][crate::Error::NotReady]. `None` polls forever, and `Some(0)` gives up
    /// without reading it at all.
    pub max_polls: Option<u32>,
}

impl PollOptions {
    /// Poll forever, waiting `interval_us` between each poll.
    pub fn every(interval_us: u32) -> Self {
        Self {
            interval_us,
            max_polls: None,
        }
    }

    /// Stop polling after `max_polls` reads of the status register.
    pub fn with_max_polls(self, max_polls: u32) -> Self {
        Self {
            max_polls: Some(max_polls),
            ..self
        }
    }

    /// An upper bound on how long polling can take, ignoring bus time. `None` if unbounded.
    pub fn max_wait_us(&self) -> Option<u64> {
        self.max_polls
            .map(|polls| u64::from(polls) * u64::from(self.interval_us))
    }
}
