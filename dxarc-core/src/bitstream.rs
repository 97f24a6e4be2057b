//! Bit-level I/O used by the DX archive codecs.
//!
//! Two bit orders appear in the format:
//!
//! - [`BitStream`] packs values **most significant bit first**, filling each
//!   byte from bit 7 down to bit 0. The Huffman header (sizes and the delta
//!   coded weight table) is written this way.
//! - [`BitWriter`] and [`BitReader`] pack bits **least significant bit
//!   first**, the order used for the Huffman code payload.
//!
//! All three work on in-memory buffers; archive members are small enough to
//! be staged whole.
//!
//! # Example
//!
//! ```
//! use dxarc_core::bitstream::{BitReader, BitStream, BitWriter};
//!
//! let mut header = BitStream::new();
//! header.write(6, 11);
//! header.write(12, 0xABC);
//! let bytes = header.into_bytes();
//!
//! let mut stream = BitStream::from_slice(&bytes);
//! assert_eq!(stream.read(6).unwrap(), 11);
//! assert_eq!(stream.read(12).unwrap(), 0xABC);
//!
//! let mut writer = BitWriter::new();
//! writer.write_bits(0b101, 3);
//! let payload = writer.finish();
//! let mut reader = BitReader::new(&payload);
//! assert_eq!(reader.read_bits(3).unwrap(), 0b101);
//! ```

use crate::error::{DxArcError, Result};
use std::borrow::Cow;

/// Number of bits needed to represent `value`, never less than one.
///
/// This is the smallest `i >= 1` with `value < 2^i`.
#[inline]
pub fn bit_width(value: u64) -> u8 {
    if value == 0 {
        1
    } else {
        (64 - value.leading_zeros()) as u8
    }
}

/// MSB-first bit stream over a byte buffer.
///
/// A stream created with [`BitStream::new`] is used for writing; one created
/// with [`BitStream::from_slice`] borrows its input for reading. Both share
/// the same cursor, so [`BitStream::byte_len`] reports the bytes touched in
/// either mode.
#[derive(Debug, Clone)]
pub struct BitStream<'a> {
    buffer: Cow<'a, [u8]>,
    /// Index of the byte holding the next bit.
    bytes: usize,
    /// Bits already used in `buffer[bytes]`, 0-7.
    bits: u8,
}

impl BitStream<'static> {
    /// Create an empty stream for writing.
    pub fn new() -> Self {
        Self {
            buffer: Cow::Owned(Vec::new()),
            bytes: 0,
            bits: 0,
        }
    }
}

impl<'a> BitStream<'a> {
    /// Create a stream reading from `data`.
    pub fn from_slice(data: &'a [u8]) -> Self {
        Self {
            buffer: Cow::Borrowed(data),
            bytes: 0,
            bits: 0,
        }
    }

    /// Append the low `num_bits` of `value`, most significant bit first.
    pub fn write(&mut self, num_bits: u8, value: u64) {
        debug_assert!(num_bits <= 64, "Cannot write more than 64 bits at once");

        for i in (0..num_bits).rev() {
            let buffer = self.buffer.to_mut();
            if self.bytes == buffer.len() {
                buffer.push(0);
            }
            let bit = ((value >> i) & 1) as u8;
            buffer[self.bytes] |= bit << (7 - self.bits);
            self.advance();
        }
    }

    /// Read `num_bits` bits, most significant bit first.
    pub fn read(&mut self, num_bits: u8) -> Result<u64> {
        debug_assert!(num_bits <= 64, "Cannot read more than 64 bits at once");

        let mut value = 0u64;
        for _ in 0..num_bits {
            let byte = *self
                .buffer
                .get(self.bytes)
                .ok_or_else(|| DxArcError::unexpected_eof(1))?;
            let bit = (byte >> (7 - self.bits)) & 1;
            value = (value << 1) | bit as u64;
            self.advance();
        }
        Ok(value)
    }

    #[inline]
    fn advance(&mut self) {
        self.bits += 1;
        if self.bits == 8 {
            self.bits = 0;
            self.bytes += 1;
        }
    }

    /// Bytes touched so far; a partially used byte counts as a whole one.
    pub fn byte_len(&self) -> usize {
        self.bytes + usize::from(self.bits != 0)
    }

    /// Consume the stream and return the written bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        let len = self.byte_len();
        let mut bytes = self.buffer.into_owned();
        bytes.truncate(len);
        bytes
    }
}

impl Default for BitStream<'static> {
    fn default() -> Self {
        BitStream::new()
    }
}

/// LSB-first bit writer collecting output in a `Vec<u8>`.
///
/// The first bit written lands in bit 0 of the first byte.
#[derive(Debug, Default)]
pub struct BitWriter {
    output: Vec<u8>,
    /// Bit buffer (LSB-first).
    buffer: u64,
    /// Number of bits in buffer.
    bits_in_buffer: u8,
    /// Total bits written.
    total_bits_written: u64,
}

impl BitWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty writer with room for `bytes` output bytes.
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            output: Vec::with_capacity(bytes),
            ..Self::default()
        }
    }

    /// Get the total number of bits written so far.
    pub fn bits_written(&self) -> u64 {
        self.total_bits_written
    }

    /// Write up to 32 bits, least significant bit first.
    #[inline]
    pub fn write_bits(&mut self, value: u32, count: u8) {
        debug_assert!(count <= 32, "Cannot write more than 32 bits at once");

        if count == 0 {
            return;
        }

        let mask = if count == 32 {
            u32::MAX
        } else {
            (1u32 << count).wrapping_sub(1)
        };

        self.buffer |= ((value & mask) as u64) << self.bits_in_buffer;
        self.bits_in_buffer += count;
        self.total_bits_written += count as u64;

        while self.bits_in_buffer >= 8 {
            self.output.push((self.buffer & 0xFF) as u8);
            self.buffer >>= 8;
            self.bits_in_buffer -= 8;
        }
    }

    /// Write a single bit.
    #[inline(always)]
    pub fn write_bit(&mut self, bit: bool) {
        self.write_bits(bit as u32, 1);
    }

    /// Pad the last byte with zeros and return the output.
    pub fn finish(mut self) -> Vec<u8> {
        if self.bits_in_buffer > 0 {
            self.output.push((self.buffer & 0xFF) as u8);
        }
        self.output
    }
}

/// LSB-first bit reader over a byte slice.
///
/// [`peek_bits`](Self::peek_bits) pads past the end of the input with zero
/// bits so table lookups near the end never fail; [`consume`](Self::consume)
/// and [`read_bit`](Self::read_bit) reject reads beyond the input.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    /// Absolute bit position.
    position: u64,
}

impl<'a> BitReader<'a> {
    /// Create a reader over `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Get the current bit position.
    pub fn bit_position(&self) -> u64 {
        self.position
    }

    fn total_bits(&self) -> u64 {
        self.data.len() as u64 * 8
    }

    /// Peek at up to 32 bits without consuming them.
    #[inline]
    pub fn peek_bits(&self, count: u8) -> u32 {
        debug_assert!(count <= 32, "Cannot peek more than 32 bits at once");

        let byte = (self.position / 8) as usize;
        let shift = (self.position % 8) as u32;

        let mut window = 0u64;
        for (i, b) in self.data.iter().skip(byte).take(5).enumerate() {
            window |= (*b as u64) << (8 * i);
        }

        let mask = (1u64 << count).wrapping_sub(1);
        ((window >> shift) & mask) as u32
    }

    /// Advance by `count` bits.
    #[inline]
    pub fn consume(&mut self, count: u8) -> Result<()> {
        let next = self.position + count as u64;
        if next > self.total_bits() {
            return Err(DxArcError::unexpected_eof(
                (next - self.total_bits()).div_ceil(8) as usize,
            ));
        }
        self.position = next;
        Ok(())
    }

    /// Read up to 32 bits.
    pub fn read_bits(&mut self, count: u8) -> Result<u32> {
        let value = self.peek_bits(count);
        self.consume(count)?;
        Ok(value)
    }

    /// Read a single bit.
    #[inline]
    pub fn read_bit(&mut self) -> Result<bool> {
        if self.position >= self.total_bits() {
            return Err(DxArcError::unexpected_eof(1));
        }
        let byte = self.data[(self.position / 8) as usize];
        let bit = (byte >> (self.position % 8)) & 1;
        self.position += 1;
        Ok(bit != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_width() {
        assert_eq!(bit_width(0), 1);
        assert_eq!(bit_width(1), 1);
        assert_eq!(bit_width(2), 2);
        assert_eq!(bit_width(255), 8);
        assert_eq!(bit_width(256), 9);
        assert_eq!(bit_width(u64::MAX), 64);
    }

    #[test]
    fn test_bitstream_msb_first() {
        let mut stream = BitStream::new();
        stream.write(3, 0b101);
        stream.write(5, 0b00011);
        stream.write(4, 0b1111);
        assert_eq!(stream.byte_len(), 2);
        assert_eq!(stream.into_bytes(), vec![0b1010_0011, 0b1111_0000]);
    }

    #[test]
    fn test_bitstream_read_back() {
        let bytes = [0b1010_0011, 0b1111_0000];
        let mut stream = BitStream::from_slice(&bytes);
        assert_eq!(stream.read(3).unwrap(), 0b101);
        assert_eq!(stream.read(5).unwrap(), 0b00011);
        assert_eq!(stream.read(4).unwrap(), 0b1111);
        assert_eq!(stream.byte_len(), 2);
    }

    #[test]
    fn test_bitstream_wide_values() {
        let mut stream = BitStream::new();
        stream.write(64, 0x0123_4567_89AB_CDEF);
        stream.write(1, 1);
        let bytes = stream.into_bytes();
        assert_eq!(bytes.len(), 9);
        let mut stream = BitStream::from_slice(&bytes);
        assert_eq!(stream.read(64).unwrap(), 0x0123_4567_89AB_CDEF);
        assert_eq!(stream.read(1).unwrap(), 1);
    }

    #[test]
    fn test_bitstream_read_past_end() {
        let bytes = [0xFF];
        let mut stream = BitStream::from_slice(&bytes);
        assert!(stream.read(8).is_ok());
        assert!(matches!(
            stream.read(1),
            Err(DxArcError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_bitwriter_lsb_first() {
        let mut writer = BitWriter::new();
        writer.write_bit(true);
        writer.write_bit(false);
        writer.write_bits(0b11, 2);
        writer.write_bits(0x1FF, 9);
        assert_eq!(writer.bits_written(), 13);
        assert_eq!(writer.finish(), vec![0b1111_1101, 0b0001_1111]);
    }

    #[test]
    fn test_bitreader_peek_and_consume() {
        let data = [0xAB, 0xCD];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.peek_bits(4), 0xB);
        assert_eq!(reader.peek_bits(4), 0xB);
        reader.consume(4).unwrap();
        assert_eq!(reader.peek_bits(8), 0xDA);
        assert_eq!(reader.read_bits(12).unwrap(), 0xCDA);
        assert_eq!(reader.bit_position(), 16);
    }

    #[test]
    fn test_bitreader_zero_padding_and_eof() {
        let data = [0x01];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.peek_bits(9), 0x001);
        assert!(reader.consume(9).is_err());
        for _ in 0..8 {
            reader.read_bit().unwrap();
        }
        assert!(reader.read_bit().is_err());
    }
}
