// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
mod frame_data;
mod spi_mock;

pub use frame_data::{example_frame, END_OF_IMAGE, START_OF_IMAGE};
pub use spi_mock::{
    MockArduChip, MockChipSelect, MockError, MockSpi, Transaction, LATCH_BYTE, MOCK_VERSION,
    MOCK_VERSION_YEAR,
};
