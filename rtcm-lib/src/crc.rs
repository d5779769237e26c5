//! CRC-24Q frame integrity.
//!
//! RTCM3 frames carry a 24-bit CRC over the preamble, length and payload bytes using
//! the Qualcomm polynomial 0x1864CFB, zero initial value and no reflection. Running the
//! CRC over a complete frame, including the trailer, yields 0 for a valid frame.
use ::crc::{Crc, CRC_24_LTE_A};

const CRC24Q: Crc<u32> = Crc::<u32>::new(&CRC_24_LTE_A);

/// Size of the CRC trailer in bytes.
pub const CRC_LEN: usize = 3;

/// Compute the CRC-24Q of `dat`.
///
/// For a full frame this returns 0 if the frame is valid. For a frame without its
/// trailer this returns the expected trailer value.
#[must_use]
pub fn crc24q(dat: &[u8]) -> u32 {
    CRC24Q.checksum(dat)
}

/// Big-endian 3-byte trailer encoding of `value`.
#[must_use]
pub fn to_trailer_bytes(value: u32) -> [u8; CRC_LEN] {
    let [_, a, b, c] = value.to_be_bytes();
    [a, b, c]
}

/// CRC-24Q trailer bytes for a frame that does not yet include its trailer.
#[must_use]
pub fn crc_to_bytes(dat: &[u8]) -> [u8; CRC_LEN] {
    to_trailer_bytes(crc24q(dat))
}
