//! Bit cursor writer and reader
//!
//! Values are packed least-significant bit first with no alignment. Every
//! access touches a 16-bit window over the current and the next byte, so a
//! single value may be at most 8 bits wide.

/// Packs values into a byte buffer
#[derive(Debug, Clone, Default)]
pub struct BitWriter {
    buffer: Vec<u8>,
    pos: usize,
    bit_pos: u8,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(bytes + 1),
            pos: 0,
            bit_pos: 0,
        }
    }

    /// Append the low `bits` bits of `value`
    pub fn write_bits(&mut self, value: u8, bits: u8) {
        if bits == 0 {
            return;
        }
        debug_assert!(bits <= 8);
        if self.buffer.len() < self.pos + 2 {
            self.buffer.resize(self.pos + 2, 0);
        }

        let masked = value as u16 & ((1u16 << bits) - 1);
        let window = masked << self.bit_pos;
        self.buffer[self.pos] |= (window & 0xFF) as u8;
        self.buffer[self.pos + 1] |= (window >> 8) as u8;

        self.bit_pos += bits;
        if self.bit_pos >= 8 {
            self.bit_pos -= 8;
            self.pos += 1;
        }
    }

    /// Bits written so far
    pub fn bit_len(&self) -> usize {
        self.pos * 8 + self.bit_pos as usize
    }

    /// Packed bytes, trimmed to the last byte holding data
    pub fn finish(mut self) -> Vec<u8> {
        self.buffer.truncate(self.bit_len().div_ceil(8));
        self.buffer
    }
}

/// Reads values back in the order they were written
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    bit_pos: u8,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            bit_pos: 0,
        }
    }

    /// Read `bits` bits. The result is not masked: higher bits of the
    /// window are left for the caller to discard.
    pub fn read_bits(&mut self, bits: u8) -> u16 {
        let lo = self.data.get(self.pos).copied().unwrap_or(0) as u16;
        let hi = self.data.get(self.pos + 1).copied().unwrap_or(0) as u16;
        let value = (lo | (hi << 8)) >> self.bit_pos;

        self.bit_pos += bits;
        if self.bit_pos >= 8 {
            self.bit_pos -= 8;
            self.pos += 1;
        }
        value
    }

    /// Read `bits` bits, masked
    pub fn read_masked(&mut self, bits: u8) -> u8 {
        let raw = self.read_bits(bits);
        (raw & ((1u16 << bits) - 1)) as u8
    }

    /// Cursor as (byte offset, bit offset)
    pub fn position(&self) -> (usize, u8) {
        (self.pos, self.bit_pos)
    }

    /// Whether the cursor sits on (or past) the last data byte
    pub fn at_last_byte(&self) -> bool {
        self.pos + 1 >= self.data.len()
    }

    /// Whether no data is left at all
    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.data.len()
    }
}
