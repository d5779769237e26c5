//! Bit-addressed cursors over byte buffers.
//!
//! RTCM3 payload fields are packed MSB first with no alignment, so all field access
//! goes through a [BitReader] while decoding and a [BitWriter] while encoding.
use crate::{Error, Result};

/// Maximum number of bits returned by a single read.
pub const MAX_READ_BITS: usize = 64;

/// Read-only cursor over a byte buffer addressed by bit offset.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> BitReader<'a> {
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        BitReader { data, offset: 0 }
    }

    /// Current offset in bits from the start of the buffer.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bits left in the buffer.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() * 8 - self.offset
    }

    /// Read the next `n` bits, most-significant bit first, as an unsigned integer and
    /// advance the cursor.
    ///
    /// # Errors
    /// [Error::OutOfRange] if `n` exceeds 64 or fewer than `n` bits remain. The cursor is
    /// not moved on error.
    pub fn read(&mut self, n: usize) -> Result<u64> {
        if n > MAX_READ_BITS || n > self.remaining() {
            return Err(Error::OutOfRange {
                wanted: n,
                remaining: self.remaining(),
            });
        }
        let mut value: u64 = 0;
        let mut left = n;
        while left > 0 {
            let byte = self.data[self.offset / 8];
            let avail = 8 - self.offset % 8;
            let take = avail.min(left);
            let bits = (u64::from(byte) >> (avail - take)) & ((1u64 << take) - 1);
            value = (value << take) | bits;
            self.offset += take;
            left -= take;
        }
        Ok(value)
    }
}

/// Append-only bit buffer. Values are written MSB first and the final byte is padded
/// with zero bits.
#[derive(Debug, Clone, Default)]
pub struct BitWriter {
    data: Vec<u8>,
    len: usize,
}

impl BitWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bits written.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Write the low `width` bits of `value`.
    ///
    /// # Errors
    /// [Error::OutOfRange] if `width` exceeds 64.
    pub fn write(&mut self, value: u64, width: usize) -> Result<()> {
        if width > MAX_READ_BITS {
            return Err(Error::OutOfRange {
                wanted: width,
                remaining: MAX_READ_BITS,
            });
        }
        for i in (0..width).rev() {
            self.push_bit((value >> i) & 1 == 1);
        }
        Ok(())
    }

    fn push_bit(&mut self, bit: bool) {
        if self.len % 8 == 0 {
            self.data.push(0);
        }
        if bit {
            let idx = self.len / 8;
            self.data[idx] |= 0x80 >> (self.len % 8);
        }
        self.len += 1;
    }

    /// Consume the writer returning the zero-padded bytes.
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.data
    }
}
