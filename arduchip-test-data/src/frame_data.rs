// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross

/// JPEG start of image marker.
pub const START_OF_IMAGE: [u8; 2] = [0xFF, 0xD8];

/// JPEG end of image marker.
pub const END_OF_IMAGE: [u8; 2] = [0xFF, 0xD9];

/// Build a fake encoded frame of exactly `length` bytes.
///
/// The frame starts with a JPEG start of image marker and ends with an end of image marker (when
/// there is room for them), and the bytes in between count up so that misplaced chunks are easy
/// to spot.
pub fn example_frame(length: usize) -> Vec<u8> {
    let mut frame: Vec<u8> = (0..length).map(|index| (index % 251) as u8).collect();
    if length >= START_OF_IMAGE.len() {
        frame[..2].copy_from_slice(&START_OF_IMAGE);
    }
    if length >= START_OF_IMAGE.len() + END_OF_IMAGE.len() {
        frame[(length - 2)..].copy_from_slice(&END_OF_IMAGE);
    }
    frame
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn markers() {
        let frame = example_frame(2050);
        assert_eq!(frame.len(), 2050);
        assert_eq!(frame[..2], START_OF_IMAGE);
        assert_eq!(frame[2048..], END_OF_IMAGE);
    }

    #[test]
    fn short_frames() {
        assert!(example_frame(0).is_empty());
        assert_eq!(example_frame(1), [0x00]);
        assert_eq!(example_frame(3), [0xFF, 0xD8, 0x02]);
    }
}
