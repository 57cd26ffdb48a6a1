//! CRC-32 over configuration frames.
//!
//! Same parameters as IEEE 802.3 (reflected, polynomial 0x04c11db7,
//! init and xorout 0xffffffff).

use crc::{CRC_32_ISO_HDLC, Crc};

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Checksum of the first `length` bytes of `buffer`.
///
/// Panics if `length` exceeds the buffer.
#[inline]
#[must_use]
pub fn compute(buffer: &[u8], length: usize) -> u32 {
    CRC32.checksum(&buffer[..length])
}

#[inline]
#[must_use]
pub fn verify(buffer: &[u8], length: usize, expected: u32) -> bool {
    compute(buffer, length) == expected
}
